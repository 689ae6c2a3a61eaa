//! Boundary to the external ledger: the traits the client core is written
//! against, their HTTP implementations, and the validated decode step for
//! view payloads.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::AccountAddress,
    error::ErrorCode,
    protocol::{CommittedTransaction, EntryFunctionPayload, PendingTransaction, TransactionHash, ViewRequest},
};
use thiserror::Error;

pub mod decode;
mod http;
mod wallet;

pub use decode::DecodeError;
pub use http::HttpLedger;
pub use wallet::HttpWalletBridge;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("request rejected by user: {0}")]
    Rejected(String),
    #[error("wallet failed to submit transaction: {0}")]
    Failed(String),
    #[error("wallet bridge unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum FinalityError {
    #[error("transaction {hash} not final after {waited:?}")]
    Timeout {
        hash: TransactionHash,
        waited: Duration,
    },
    #[error("transaction {hash} reverted: {vm_status}")]
    Reverted {
        hash: TransactionHash,
        vm_status: String,
    },
    #[error("failed to query transaction status: {0}")]
    Transport(String),
    #[error("unexpected transaction status payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view call rejected ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("view call failed: {0}")]
    Transport(String),
    #[error("view call did not answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Signs and submits state-changing calls on behalf of a wallet identity.
///
/// Key material never reaches this crate; implementations hand the payload to
/// a wallet that prompts the user.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_and_submit(
        &self,
        sender: &AccountAddress,
        payload: &EntryFunctionPayload,
    ) -> Result<PendingTransaction, SignerError>;
}

/// Read side of the ledger plus the finality wait for submitted transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn await_finality(
        &self,
        hash: &TransactionHash,
        max_wait: Duration,
    ) -> Result<CommittedTransaction, FinalityError>;

    /// Runs a side-effect-free view function. The zeroth element of the
    /// returned vector is the payload.
    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, ViewError>;
}
