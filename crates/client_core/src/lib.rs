//! Client core for the freelance marketplace: submits state-changing contract
//! calls, waits for them to become final, and keeps an aggregation cache of
//! read-only views consistent with confirmed ledger state.

use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use ledger_client::{Ledger, TransactionSigner};
use shared::{
    amount::Amount,
    domain::{AccountAddress, JobId, PaymentId},
};
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

pub mod cache;
pub mod dispatcher;
pub mod events;
pub mod identity;
pub mod intent;
pub mod mutation;
pub mod refresher;

pub use cache::{AggregationCache, Snapshot, ViewState};
pub use dispatcher::{DispatchError, FailureKind, MutationDispatcher, MutationReceipt, MutationRequest};
pub use events::ClientEvent;
pub use identity::{IdentityProvider, WatchIdentity};
pub use intent::{ContractModules, EntityFamily, ViewIntent};
pub use mutation::Mutation;
pub use refresher::{RefreshReport, ViewRefresher};

/// Lowest id handed out when the marketplace has no jobs yet.
pub const FIRST_JOB_ID: u64 = 1000;

const DEFAULT_FINALITY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_VIEW_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub modules: ContractModules,
    pub finality_timeout: Duration,
    pub view_timeout: Duration,
}

impl ClientConfig {
    pub fn new(modules: ContractModules) -> Self {
        Self {
            modules,
            finality_timeout: DEFAULT_FINALITY_TIMEOUT,
            view_timeout: DEFAULT_VIEW_TIMEOUT,
        }
    }
}

/// A job as entered by the user, before it is turned into contract arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    /// Allocated from the current job list when absent.
    pub job_id: Option<JobId>,
    pub description: String,
    pub payment_amount: Amount,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("cannot allocate a job id: {0}")]
    JobIdUnavailable(String),
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Dispatch(err) => err.kind(),
            Self::InvalidInput(_) => FailureKind::Precondition,
            Self::JobIdUnavailable(_) => FailureKind::ExecutionFailed,
        }
    }

    /// Text to show the user.
    pub fn notice(&self) -> String {
        match self {
            Self::Dispatch(err) => err.notice(),
            other => other.to_string(),
        }
    }
}

/// Facade the presentation layer talks to. Owns the single aggregation
/// cache; views are only reachable through the read and refresh operations
/// below.
pub struct MarketplaceClient {
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<AggregationCache>,
    dispatcher: MutationDispatcher,
    refresher: ViewRefresher,
    modules: ContractModules,
    events: broadcast::Sender<ClientEvent>,
    identity_task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketplaceClient {
    pub fn new(
        config: ClientConfig,
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn TransactionSigner>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let cache = Arc::new(AggregationCache::new());
        let dispatcher = MutationDispatcher::new(
            signer,
            Arc::clone(&ledger),
            config.finality_timeout,
            events.clone(),
        );
        let refresher = ViewRefresher::new(
            ledger,
            Arc::clone(&cache),
            config.modules.clone(),
            config.view_timeout,
            events.clone(),
        );
        Arc::new(Self {
            identity,
            cache,
            dispatcher,
            refresher,
            modules: config.modules,
            events,
            identity_task: Mutex::new(None),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &AggregationCache {
        &self.cache
    }

    pub fn identity(&self) -> Option<AccountAddress> {
        self.identity.current()
    }

    pub fn modules(&self) -> &ContractModules {
        &self.modules
    }

    /// Loads every view a freshly opened screen shows for the current
    /// identity.
    pub async fn mount(&self) -> RefreshReport {
        let identity = self.identity.current();
        self.refresher
            .refresh(ViewIntent::mount_intents(identity.as_ref()))
            .await
    }

    /// Starts following identity changes. Each change clears the cache and
    /// remounts for the new account. Calling this again replaces the watcher.
    pub fn watch_identity(self: &Arc<Self>) {
        let mut rx = self.identity.subscribe();
        rx.borrow_and_update();
        let client: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                let Some(client) = client.upgrade() else {
                    break;
                };
                client.handle_identity_change(next).await;
            }
            debug!("identity watcher stopped");
        });

        if let Ok(mut slot) = self.identity_task.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }

    pub async fn handle_identity_change(&self, next: Option<AccountAddress>) -> RefreshReport {
        info!(
            account = next.as_ref().map(AccountAddress::short).unwrap_or("none"),
            "identity changed; invalidating views"
        );
        self.cache.invalidate_all().await;
        let _ = self.events.send(ClientEvent::IdentityChanged(next.clone()));
        self.refresher
            .refresh(ViewIntent::mount_intents(next.as_ref()))
            .await
    }

    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.identity_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    pub async fn refresh<I>(&self, intents: I) -> RefreshReport
    where
        I: IntoIterator<Item = ViewIntent>,
    {
        self.refresher.refresh(intents).await
    }

    pub async fn view(&self, intent: &ViewIntent) -> ViewState {
        self.cache.get(intent).await
    }

    /// Selects a job and loads it. Returns the state of the selection, which
    /// may already point elsewhere if another selection raced this one.
    pub async fn fetch_job(&self, job_id: JobId) -> ViewState {
        self.cache.select_job(job_id).await;
        self.refresher.refresh([ViewIntent::JobById(job_id)]).await;
        self.cache.selected_job().await
    }

    pub async fn fetch_payment(&self, payment_id: PaymentId) -> ViewState {
        self.cache.select_payment(payment_id).await;
        self.refresher
            .refresh([ViewIntent::PaymentById(payment_id)])
            .await;
        self.cache.selected_payment().await
    }

    /// One past the highest known job id, never below [`FIRST_JOB_ID`].
    /// Reads a fresh job list; fails if that read fails.
    pub async fn next_job_id(&self) -> Result<JobId, ClientError> {
        self.refresher.refresh([ViewIntent::AllJobs]).await;
        match self.cache.get(&ViewIntent::AllJobs).await {
            ViewState::Loaded { snapshot, .. } => {
                let highest = snapshot
                    .as_jobs()
                    .and_then(|jobs| jobs.iter().map(|job| job.job_id.0).max());
                let next = highest
                    .map(|id| id.saturating_add(1))
                    .unwrap_or(FIRST_JOB_ID)
                    .max(FIRST_JOB_ID);
                Ok(JobId(next))
            }
            ViewState::Errored { reason, .. } => Err(ClientError::JobIdUnavailable(reason)),
            ViewState::Unloaded => Err(ClientError::JobIdUnavailable(
                "job list was not loaded".to_string(),
            )),
        }
    }

    pub async fn post_job(&self, draft: JobDraft) -> Result<(JobId, MutationReceipt), ClientError> {
        const OPERATION: &str = "post_job";

        let description = draft.description.trim();
        if description.is_empty() {
            return Err(self.reject_input(OPERATION, "description must not be empty"));
        }
        if draft.payment_amount.is_zero() {
            return Err(self.reject_input(OPERATION, "payment amount must be greater than zero"));
        }
        if draft.deadline <= Utc::now() {
            return Err(self.reject_input(OPERATION, "deadline must be in the future"));
        }
        let Ok(deadline) = u64::try_from(draft.deadline.timestamp()) else {
            return Err(self.reject_input(OPERATION, "deadline is out of range"));
        };

        // Checked before id allocation so a missing wallet costs no round trip.
        let Some(signer) = self.identity.current() else {
            return Err(self.missing_signer(OPERATION));
        };

        let job_id = match draft.job_id {
            Some(job_id) => job_id,
            None => self.next_job_id().await?,
        };

        let mutation = Mutation::PostJob {
            job_id,
            description: description.to_string(),
            payment_amount: draft.payment_amount,
            deadline,
        };
        let receipt = self.submit(mutation, Some(signer)).await?;
        Ok((job_id, receipt))
    }

    pub async fn accept_job(&self, job_id: JobId) -> Result<MutationReceipt, ClientError> {
        self.submit(Mutation::AcceptJob(job_id), self.identity.current())
            .await
    }

    pub async fn complete_job(&self, job_id: JobId) -> Result<MutationReceipt, ClientError> {
        self.submit(Mutation::CompleteJob(job_id), self.identity.current())
            .await
    }

    pub async fn pay_freelancer(&self, job_id: JobId) -> Result<MutationReceipt, ClientError> {
        self.submit(Mutation::PayFreelancer(job_id), self.identity.current())
            .await
    }

    pub async fn register_freelancer(&self) -> Result<MutationReceipt, ClientError> {
        self.submit(Mutation::RegisterFreelancer, self.identity.current())
            .await
    }

    pub async fn make_payment(
        &self,
        payee: AccountAddress,
        amount: Amount,
        message: impl Into<String>,
    ) -> Result<MutationReceipt, ClientError> {
        if amount.is_zero() {
            return Err(self.reject_input("make_payment", "amount must be greater than zero"));
        }
        let mutation = Mutation::MakePayment {
            payee,
            amount,
            message: message.into(),
        };
        self.submit(mutation, self.identity.current()).await
    }

    pub async fn refund_payment(&self, payment_id: PaymentId) -> Result<MutationReceipt, ClientError> {
        self.submit(Mutation::RefundPayment(payment_id), self.identity.current())
            .await
    }

    /// Dispatches once, then refreshes what the call may have changed. The
    /// refresh runs only after the dispatcher reported finality.
    async fn submit(
        &self,
        mutation: Mutation,
        signer: Option<AccountAddress>,
    ) -> Result<MutationReceipt, ClientError> {
        let request = mutation.to_request(&self.modules, signer.clone());
        // Views of a signer that is no longer connected must not re-enter
        // the cache once finality arrives.
        let generation = self.cache.generation().await;
        let receipt = self.dispatcher.dispatch(request).await?;

        let mut intents = signer
            .as_ref()
            .map(|signer| mutation.affected_views(signer))
            .unwrap_or_default();
        let family = mutation.family();
        intents.extend(
            self.cache
                .tracked()
                .await
                .into_iter()
                .filter(|intent| intent.family() == family),
        );
        let report = self.refresher.refresh_within(intents, generation).await;
        debug!(
            operation = mutation.function_name(),
            applied = report.applied,
            failed = report.failed,
            stale = report.stale,
            "post-mutation refresh finished"
        );
        Ok(receipt)
    }

    fn missing_signer(&self, operation: &str) -> ClientError {
        self.dispatcher
            .report_failure(
                operation,
                DispatchError::MissingSigner {
                    operation: operation.to_string(),
                },
            )
            .into()
    }

    fn reject_input(&self, operation: &str, reason: &str) -> ClientError {
        let err = ClientError::InvalidInput(reason.to_string());
        warn!(operation, %reason, "mutation input rejected");
        let _ = self.events.send(ClientEvent::MutationFailed {
            operation: operation.to_string(),
            kind: FailureKind::Precondition,
            notice: err.to_string(),
        });
        err
    }
}

impl Drop for MarketplaceClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
