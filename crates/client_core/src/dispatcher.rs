use std::{sync::Arc, time::Duration};

use ledger_client::{FinalityError, Ledger, SignerError, TransactionSigner};
use shared::{
    domain::AccountAddress,
    protocol::{EntryFunctionId, EntryFunctionPayload, MoveValue, TransactionHash},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::events::ClientEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    pub operation: EntryFunctionId,
    pub arguments: Vec<MoveValue>,
    pub signer: Option<AccountAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    pub operation: EntryFunctionId,
    pub hash: TransactionHash,
    pub version: u64,
}

/// How a failed mutation is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing was sent: no wallet connected or the input was invalid.
    Precondition,
    UserDeclined,
    ExecutionFailed,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no wallet connected for {operation}")]
    MissingSigner { operation: String },
    #[error("transaction rejected by user: {0}")]
    UserDeclined(String),
    #[error("transaction failed: {0}")]
    ExecutionFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("transaction {hash} not final after {waited:?}")]
    Timeout {
        hash: TransactionHash,
        waited: Duration,
    },
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingSigner { .. } => FailureKind::Precondition,
            Self::UserDeclined(_) => FailureKind::UserDeclined,
            Self::ExecutionFailed(_) | Self::Network(_) | Self::Timeout { .. } => {
                FailureKind::ExecutionFailed
            }
        }
    }

    /// User-facing notice text.
    pub fn notice(&self) -> String {
        match self {
            Self::MissingSigner { .. } => "Please connect your wallet.".to_string(),
            Self::UserDeclined(_) => "Transaction rejected by user.".to_string(),
            other => format!("Transaction failed: {other}"),
        }
    }
}

impl From<SignerError> for DispatchError {
    fn from(value: SignerError) -> Self {
        match value {
            SignerError::Rejected(message) => Self::UserDeclined(message),
            SignerError::Failed(message) => Self::ExecutionFailed(message),
            SignerError::Transport(message) => Self::Network(message),
        }
    }
}

impl From<FinalityError> for DispatchError {
    fn from(value: FinalityError) -> Self {
        match value {
            FinalityError::Timeout { hash, waited } => Self::Timeout { hash, waited },
            FinalityError::Reverted { vm_status, .. } => Self::ExecutionFailed(vm_status),
            FinalityError::Transport(message) | FinalityError::Decode(message) => {
                Self::Network(message)
            }
        }
    }
}

/// Submits one mutation and waits for it to become final. Exactly one
/// submission per call.
pub struct MutationDispatcher {
    signer: Arc<dyn TransactionSigner>,
    ledger: Arc<dyn Ledger>,
    max_wait: Duration,
    events: broadcast::Sender<ClientEvent>,
}

impl MutationDispatcher {
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        ledger: Arc<dyn Ledger>,
        max_wait: Duration,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            signer,
            ledger,
            max_wait,
            events,
        }
    }

    pub async fn dispatch(&self, request: MutationRequest) -> Result<MutationReceipt, DispatchError> {
        let operation = request.operation.function_name.clone();
        let Some(sender) = request.signer else {
            return Err(self.report_failure(&operation, DispatchError::MissingSigner {
                operation: operation.clone(),
            }));
        };

        let payload = EntryFunctionPayload::new(request.operation.clone(), request.arguments);
        let pending = match self.signer.sign_and_submit(&sender, &payload).await {
            Ok(pending) => pending,
            Err(err) => return Err(self.report_failure(&operation, err.into())),
        };

        let committed = match self.ledger.await_finality(&pending.hash, self.max_wait).await {
            Ok(committed) => committed,
            Err(err) => return Err(self.report_failure(&operation, err.into())),
        };

        info!(
            operation = %operation,
            hash = %committed.hash,
            version = committed.version,
            "mutation committed"
        );
        let _ = self.events.send(ClientEvent::MutationSucceeded {
            operation,
            hash: committed.hash.clone(),
        });

        Ok(MutationReceipt {
            operation: request.operation,
            hash: committed.hash,
            version: committed.version,
        })
    }

    /// Logs and announces a failure, handing the error back to the caller.
    pub fn report_failure(&self, operation: &str, err: DispatchError) -> DispatchError {
        warn!(operation, kind = ?err.kind(), error = %err, "mutation failed");
        let _ = self.events.send(ClientEvent::MutationFailed {
            operation: operation.to_string(),
            kind: err.kind(),
            notice: err.notice(),
        });
        err
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
