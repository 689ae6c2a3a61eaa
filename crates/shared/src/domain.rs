use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Amount;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(JobId);
id_newtype!(PaymentId);

const ADDRESS_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("account address is empty")]
    Empty,
    #[error("account address has {0} hex digits, at most 64 are allowed")]
    TooLong(usize),
    #[error("account address contains non-hex character {0:?}")]
    InvalidCharacter(char),
}

/// Ledger account address, stored in the 64-digit lowercase long form so
/// `0x1` and `0x0000…0001` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress(String);

impl AccountAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x` followed by the first eight hex digits, for compact listings.
    pub fn short(&self) -> &str {
        &self.0[..10]
    }
}

impl FromStr for AccountAddress {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        if digits.is_empty() {
            return Err(AddressError::Empty);
        }
        if digits.len() > ADDRESS_HEX_LEN {
            return Err(AddressError::TooLong(digits.len()));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacter(bad));
        }
        Ok(Self(format!(
            "0x{:0>width$}",
            digits.to_ascii_lowercase(),
            width = ADDRESS_HEX_LEN
        )))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(value: AccountAddress) -> Self {
        value.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("job {0} is marked paid but not completed")]
    PaidBeforeCompleted(JobId),
    #[error("job {0} has an assigned freelancer but is not accepted")]
    AssignedBeforeAccepted(JobId),
}

/// A job as mirrored from the marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: JobId,
    pub client: AccountAddress,
    pub freelancer: Option<AccountAddress>,
    pub description: String,
    pub payment_amount: Amount,
    /// Epoch seconds.
    pub deadline: u64,
    pub is_accepted: bool,
    pub is_completed: bool,
    pub is_paid: bool,
}

impl WorkItem {
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_paid && !self.is_completed {
            return Err(InvariantViolation::PaidBeforeCompleted(self.job_id));
        }
        if self.freelancer.is_some() && !self.is_accepted {
            return Err(InvariantViolation::AssignedBeforeAccepted(self.job_id));
        }
        Ok(())
    }

    pub fn is_freelancer_assigned(&self) -> bool {
        self.freelancer.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub payer: AccountAddress,
    pub payee: AccountAddress,
    pub amount: Amount,
    pub message: String,
    pub is_refunded: bool,
}
