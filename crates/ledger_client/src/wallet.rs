use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::AccountAddress,
    error::WalletError,
    protocol::{EntryFunctionPayload, PendingTransaction, SignAndSubmitRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::{http::base_url, SignerError, TransactionSigner};

/// [`TransactionSigner`] that forwards payloads to a local wallet bridge,
/// which prompts the user, signs and submits.
pub struct HttpWalletBridge {
    http: Client,
    endpoint: Url,
}

impl HttpWalletBridge {
    pub fn new(wallet_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: Client::new(),
            endpoint: base_url(wallet_url)?.join("sign_and_submit")?,
        })
    }
}

#[async_trait]
impl TransactionSigner for HttpWalletBridge {
    async fn sign_and_submit(
        &self,
        sender: &AccountAddress,
        payload: &EntryFunctionPayload,
    ) -> Result<PendingTransaction, SignerError> {
        debug!(%sender, function = %payload.function, "forwarding transaction to wallet");
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&SignAndSubmitRequest {
                sender: sender.clone(),
                payload: payload.clone(),
            })
            .send()
            .await
            .map_err(|err| SignerError::Transport(err.to_string()))?;

        if res.status().is_success() {
            return res
                .json::<PendingTransaction>()
                .await
                .map_err(|err| SignerError::Failed(format!("invalid wallet response: {err}")));
        }

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        match serde_json::from_str::<WalletError>(&body) {
            Ok(err) if err.is_user_rejection() => Err(SignerError::Rejected(err.message)),
            Ok(err) => Err(SignerError::Failed(err.message)),
            Err(_) => {
                warn!(%status, "wallet bridge returned an unrecognised error body");
                Err(SignerError::Failed(format!("status {status}: {body}")))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/wallet_tests.rs"]
mod tests;
