use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{
    amount::Amount,
    domain::{AccountAddress, AddressError, InvariantViolation, JobId, PaymentId, PaymentRecord, WorkItem},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionIdError {
    #[error("function id {0:?} must look like <address>::<module>::<function>")]
    Shape(String),
    #[error("invalid module address: {0}")]
    Address(#[from] AddressError),
}

/// Fully-qualified Move function, `<address>::<module>::<function>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryFunctionId {
    pub module_address: AccountAddress,
    pub module_name: String,
    pub function_name: String,
}

impl EntryFunctionId {
    pub fn new(
        module_address: AccountAddress,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            module_address,
            module_name: module_name.into(),
            function_name: function_name.into(),
        }
    }
}

impl fmt::Display for EntryFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}",
            self.module_address, self.module_name, self.function_name
        )
    }
}

impl FromStr for EntryFunctionId {
    type Err = FunctionIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split("::");
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(address), Some(module), Some(function), None)
                if !module.is_empty() && !function.is_empty() =>
            {
                Ok(Self::new(address.parse()?, module, function))
            }
            _ => Err(FunctionIdError::Shape(raw.to_string())),
        }
    }
}

impl Serialize for EntryFunctionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A positional entry/view function argument in its JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveValue {
    U64(u64),
    Address(AccountAddress),
    String(String),
    Bool(bool),
}

impl Serialize for MoveValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // u64 travels as a decimal string so JSON number precision never bites.
            Self::U64(value) => serializer.collect_str(value),
            Self::Address(address) => serializer.serialize_str(address.as_str()),
            Self::String(value) => serializer.serialize_str(value),
            Self::Bool(value) => serializer.serialize_bool(*value),
        }
    }
}

impl fmt::Display for MoveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U64(value) => write!(f, "{value}"),
            Self::Address(address) => write!(f, "{address}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub payload_type: &'static str,
    pub function: EntryFunctionId,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<MoveValue>,
}

impl EntryFunctionPayload {
    pub fn new(function: EntryFunctionId, arguments: Vec<MoveValue>) -> Self {
        Self {
            payload_type: "entry_function_payload",
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRequest {
    pub function: EntryFunctionId,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<MoveValue>,
}

impl ViewRequest {
    pub fn new(function: EntryFunctionId, arguments: Vec<MoveValue>) -> Self {
        Self {
            function,
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignAndSubmitRequest {
    pub sender: AccountAddress,
    pub payload: EntryFunctionPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub String);

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TransactionHash,
}

/// Subset of `GET /transactions/by_hash/{hash}` needed to decide finality.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingTransaction {
        hash: TransactionHash,
    },
    UserTransaction {
        hash: TransactionHash,
        #[serde(deserialize_with = "u64_lenient")]
        version: u64,
        success: bool,
        vm_status: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedTransaction {
    pub hash: TransactionHash,
    pub version: u64,
    pub success: bool,
    pub vm_status: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Repr {
    Number(u64),
    Text(String),
}

/// Accepts a `u64` encoded either as a JSON number or as a decimal string,
/// which is how the fullnode renders Move `u64`.
pub fn u64_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match U64Repr::deserialize(deserializer)? {
        U64Repr::Number(value) => Ok(value),
        U64Repr::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MoveOptionRepr<T> {
    Wrapped { vec: Vec<T> },
    Bare(T),
}

/// Decodes a Move `Option<T>` (`{"vec": []}` / `{"vec": [x]}`), a bare value
/// or `null`.
pub fn move_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let repr = Option::<MoveOptionRepr<T>>::deserialize(deserializer)?;
    Ok(match repr {
        None => None,
        Some(MoveOptionRepr::Bare(value)) => Some(value),
        Some(MoveOptionRepr::Wrapped { mut vec }) => {
            if vec.len() > 1 {
                return Err(serde::de::Error::custom(format!(
                    "Move option holds {} values",
                    vec.len()
                )));
            }
            vec.pop()
        }
    })
}

/// `Job` struct as rendered by the marketplace module's view functions.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResource {
    #[serde(deserialize_with = "u64_lenient")]
    pub job_id: u64,
    pub client: AccountAddress,
    #[serde(default, deserialize_with = "move_option")]
    pub freelancer: Option<AccountAddress>,
    pub description: String,
    #[serde(deserialize_with = "u64_lenient")]
    pub payment_amount: u64,
    #[serde(deserialize_with = "u64_lenient")]
    pub job_deadline: u64,
    pub is_accepted: bool,
    pub is_completed: bool,
    pub is_paid: bool,
    #[serde(default)]
    pub is_freelancer_assigned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
    #[error("job {0} is marked assigned but carries no freelancer address")]
    MissingFreelancer(JobId),
}

impl TryFrom<JobResource> for WorkItem {
    type Error = ResourceError;

    fn try_from(resource: JobResource) -> Result<Self, Self::Error> {
        let job_id = JobId(resource.job_id);
        // The contract keeps a placeholder address until someone is assigned.
        let freelancer = if resource.is_freelancer_assigned {
            Some(
                resource
                    .freelancer
                    .ok_or(ResourceError::MissingFreelancer(job_id))?,
            )
        } else {
            None
        };
        let item = WorkItem {
            job_id,
            client: resource.client,
            freelancer,
            description: resource.description,
            payment_amount: Amount::from_raw(resource.payment_amount),
            deadline: resource.job_deadline,
            is_accepted: resource.is_accepted,
            is_completed: resource.is_completed,
            is_paid: resource.is_paid,
        };
        item.check_invariants()?;
        Ok(item)
    }
}

/// `Payment` struct as rendered by the payments module's view functions.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResource {
    #[serde(deserialize_with = "u64_lenient")]
    pub payment_id: u64,
    pub payer: AccountAddress,
    pub payee: AccountAddress,
    #[serde(deserialize_with = "u64_lenient")]
    pub amount: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_refunded: bool,
}

impl From<PaymentResource> for PaymentRecord {
    fn from(resource: PaymentResource) -> Self {
        Self {
            payment_id: PaymentId(resource.payment_id),
            payer: resource.payer,
            payee: resource.payee,
            amount: Amount::from_raw(resource.amount),
            message: resource.message,
            is_refunded: resource.is_refunded,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
