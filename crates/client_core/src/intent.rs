use std::fmt;

use ledger_client::{decode, DecodeError};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{AccountAddress, JobId, PaymentId},
    protocol::{EntryFunctionId, MoveValue, ViewRequest},
};

use crate::cache::Snapshot;

pub const DEFAULT_JOBS_MODULE: &str = "FreelanceMarketplace";
pub const DEFAULT_PAYMENTS_MODULE: &str = "GlobalPayments";

/// Where the marketplace and payment modules are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractModules {
    pub address: AccountAddress,
    pub jobs_module: String,
    pub payments_module: String,
}

impl ContractModules {
    pub fn new(address: AccountAddress) -> Self {
        Self {
            address,
            jobs_module: DEFAULT_JOBS_MODULE.to_string(),
            payments_module: DEFAULT_PAYMENTS_MODULE.to_string(),
        }
    }

    pub fn function(&self, family: EntityFamily, name: &str) -> EntryFunctionId {
        let module = match family {
            EntityFamily::Jobs => &self.jobs_module,
            EntityFamily::Payments => &self.payments_module,
        };
        EntryFunctionId::new(self.address.clone(), module.clone(), name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFamily {
    Jobs,
    Payments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewShape {
    JobList,
    Job,
    PaymentList,
    Payment,
}

impl ViewShape {
    pub fn decode(self, results: Vec<Value>) -> Result<Snapshot, DecodeError> {
        Ok(match self {
            Self::JobList => Snapshot::Jobs(decode::jobs(results)?),
            Self::Job => Snapshot::Job(decode::job(results)?),
            Self::PaymentList => Snapshot::Payments(decode::payments(results)?),
            Self::Payment => Snapshot::Payment(decode::payment(results)?),
        })
    }

    /// What a degraded read shows: an empty collection or no entity.
    pub fn empty(self) -> Snapshot {
        match self {
            Self::JobList => Snapshot::Jobs(Vec::new()),
            Self::Job => Snapshot::Job(None),
            Self::PaymentList => Snapshot::Payments(Vec::new()),
            Self::Payment => Snapshot::Payment(None),
        }
    }
}

/// A named, parameterised read-only query. Doubles as the cache key, so two
/// intents with different parameters never share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", content = "arg", rename_all = "snake_case")]
pub enum ViewIntent {
    AllJobs,
    JobsByClient(AccountAddress),
    JobsByFreelancer(AccountAddress),
    JobById(JobId),
    AllPayments,
    PaymentsByPayer(AccountAddress),
    PaymentsByPayee(AccountAddress),
    PaymentById(PaymentId),
}

impl ViewIntent {
    pub fn family(&self) -> EntityFamily {
        match self {
            Self::AllJobs | Self::JobsByClient(_) | Self::JobsByFreelancer(_) | Self::JobById(_) => {
                EntityFamily::Jobs
            }
            Self::AllPayments
            | Self::PaymentsByPayer(_)
            | Self::PaymentsByPayee(_)
            | Self::PaymentById(_) => EntityFamily::Payments,
        }
    }

    pub fn shape(&self) -> ViewShape {
        match self {
            Self::AllJobs | Self::JobsByClient(_) | Self::JobsByFreelancer(_) => ViewShape::JobList,
            Self::JobById(_) => ViewShape::Job,
            Self::AllPayments | Self::PaymentsByPayer(_) | Self::PaymentsByPayee(_) => {
                ViewShape::PaymentList
            }
            Self::PaymentById(_) => ViewShape::Payment,
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            Self::AllJobs => "view_all_jobs",
            Self::JobsByClient(_) => "view_jobs_by_client",
            Self::JobsByFreelancer(_) => "view_jobs_by_freelancer",
            Self::JobById(_) => "view_job_by_id",
            Self::AllPayments => "view_all_payments",
            Self::PaymentsByPayer(_) => "view_payments_by_payer",
            Self::PaymentsByPayee(_) => "view_payments_by_payee",
            Self::PaymentById(_) => "view_payment_by_id",
        }
    }

    fn arguments(&self) -> Vec<MoveValue> {
        match self {
            Self::AllJobs | Self::AllPayments => Vec::new(),
            Self::JobsByClient(address)
            | Self::JobsByFreelancer(address)
            | Self::PaymentsByPayer(address)
            | Self::PaymentsByPayee(address) => vec![MoveValue::Address(address.clone())],
            Self::JobById(id) => vec![MoveValue::U64(id.0)],
            Self::PaymentById(id) => vec![MoveValue::U64(id.0)],
        }
    }

    pub fn request(&self, modules: &ContractModules) -> ViewRequest {
        ViewRequest::new(
            modules.function(self.family(), self.function_name()),
            self.arguments(),
        )
    }

    /// Views loaded when a screen opens or the connected account changes.
    pub fn mount_intents(identity: Option<&AccountAddress>) -> Vec<ViewIntent> {
        match identity {
            Some(address) => vec![
                Self::AllJobs,
                Self::JobsByClient(address.clone()),
                Self::JobsByFreelancer(address.clone()),
                Self::AllPayments,
                Self::PaymentsByPayer(address.clone()),
                Self::PaymentsByPayee(address.clone()),
            ],
            None => vec![Self::AllJobs, Self::AllPayments],
        }
    }
}

impl fmt::Display for ViewIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllJobs => f.write_str("all_jobs"),
            Self::JobsByClient(address) => write!(f, "jobs_by_client({})", address.short()),
            Self::JobsByFreelancer(address) => {
                write!(f, "jobs_by_freelancer({})", address.short())
            }
            Self::JobById(id) => write!(f, "job_by_id({id})"),
            Self::AllPayments => f.write_str("all_payments"),
            Self::PaymentsByPayer(address) => write!(f, "payments_by_payer({})", address.short()),
            Self::PaymentsByPayee(address) => write!(f, "payments_by_payee({})", address.short()),
            Self::PaymentById(id) => write!(f, "payment_by_id({id})"),
        }
    }
}
