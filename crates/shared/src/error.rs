use serde::{Deserialize, Serialize};

/// Provider code reported by wallets when the user dismisses the approval
/// prompt (EIP-1193 style, also used by Aptos wallet adapters).
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    VmError,
    TransactionNotFound,
    AccountNotFound,
    RateLimited,
    Internal,
    #[serde(other)]
    Unknown,
}

/// Error body returned by the fullnode REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_error_code: Option<u64>,
}

/// Error body returned by the wallet signing bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletError {
    pub code: i64,
    pub message: String,
}

impl WalletError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True when the wallet reports that the user declined to sign, either by
    /// the well-known provider code or by a rejection message.
    pub fn is_user_rejection(&self) -> bool {
        if self.code == USER_REJECTED_CODE {
            return true;
        }
        let lower = self.message.to_ascii_lowercase();
        lower.contains("rejected") || lower.contains("declined")
    }
}
