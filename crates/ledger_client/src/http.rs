use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::{
    error::ApiError,
    protocol::{CommittedTransaction, TransactionHash, TransactionStatus, ViewRequest},
};
use tracing::debug;
use url::Url;

use crate::{FinalityError, Ledger, ViewError};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`Ledger`] backed by a fullnode REST API (`.../v1`).
pub struct HttpLedger {
    http: Client,
    node_url: Url,
    poll_interval: Duration,
}

impl HttpLedger {
    pub fn new(node_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: Client::new(),
            node_url: base_url(node_url)?,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn node_url(&self) -> &Url {
        &self.node_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.node_url.join(path)
    }

    async fn transaction_status(
        &self,
        hash: &TransactionHash,
    ) -> Result<Option<TransactionStatus>, FinalityError> {
        let url = self
            .endpoint(&format!("transactions/by_hash/{hash}"))
            .map_err(|err| FinalityError::Transport(err.to_string()))?;
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FinalityError::Transport(err.to_string()))?;

        // The node answers 404 until the transaction reaches its mempool.
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FinalityError::Transport(format!(
                "status {status}: {}",
                api_message(&body)
            )));
        }

        res.json::<TransactionStatus>()
            .await
            .map(Some)
            .map_err(|err| FinalityError::Decode(err.to_string()))
    }

    async fn poll_until_committed(
        &self,
        hash: &TransactionHash,
    ) -> Result<CommittedTransaction, FinalityError> {
        loop {
            match self.transaction_status(hash).await? {
                Some(TransactionStatus::UserTransaction {
                    hash,
                    version,
                    success,
                    vm_status,
                }) => {
                    if !success {
                        return Err(FinalityError::Reverted { hash, vm_status });
                    }
                    return Ok(CommittedTransaction {
                        hash,
                        version,
                        success,
                        vm_status,
                    });
                }
                Some(TransactionStatus::PendingTransaction { .. }) | None => {
                    debug!(%hash, "transaction not final yet");
                }
                Some(TransactionStatus::Other) => {
                    return Err(FinalityError::Decode(format!(
                        "transaction {hash} is not a user transaction"
                    )));
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Makes sure relative joins extend the configured path instead of
/// replacing its last segment.
pub(crate) fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn await_finality(
        &self,
        hash: &TransactionHash,
        max_wait: Duration,
    ) -> Result<CommittedTransaction, FinalityError> {
        let started = Instant::now();
        match tokio::time::timeout(max_wait, self.poll_until_committed(hash)).await {
            Ok(result) => result,
            Err(_) => Err(FinalityError::Timeout {
                hash: hash.clone(),
                waited: started.elapsed(),
            }),
        }
    }

    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, ViewError> {
        let url = self
            .endpoint("view")
            .map_err(|err| ViewError::Transport(err.to_string()))?;
        debug!(function = %request.function, "ledger view");
        let res = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ViewError::Transport(err.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiError>(&body) {
                Ok(api) => ViewError::Rejected {
                    code: api.error_code,
                    message: api.message,
                },
                Err(_) => ViewError::Transport(format!("status {status}: {body}")),
            });
        }

        res.json::<Vec<Value>>()
            .await
            .map_err(|err| ViewError::Transport(format!("invalid view response: {err}")))
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
