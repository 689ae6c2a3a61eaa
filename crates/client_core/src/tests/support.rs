//! In-memory ledger and wallet used by the client core tests. Submitted
//! transactions only change chain state once their finality is awaited, so
//! a view issued too early observes the old state.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ledger_client::{FinalityError, Ledger, SignerError, TransactionSigner, ViewError};
use serde_json::{json, Value};
use shared::{
    domain::{AccountAddress, JobId, PaymentId, PaymentRecord, WorkItem},
    protocol::{
        CommittedTransaction, EntryFunctionPayload, MoveValue, PendingTransaction,
        TransactionHash, ViewRequest,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit(String),
    Finality(TransactionHash),
    View(String),
}

#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    Accept,
    Decline,
    Fail(String),
    Unreachable,
}

struct Pending {
    sender: AccountAddress,
    payload: EntryFunctionPayload,
}

struct ChainState {
    jobs: Vec<WorkItem>,
    payments: Vec<PaymentRecord>,
    pending: HashMap<TransactionHash, Pending>,
    calls: Vec<Call>,
    submit: SubmitBehavior,
    revert_with: Option<String>,
    failing_views: HashSet<String>,
    slow_views: HashMap<String, Duration>,
    finality_delay: Option<Duration>,
    next_hash: u64,
    version: u64,
}

pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                jobs: Vec::new(),
                payments: Vec::new(),
                pending: HashMap::new(),
                calls: Vec::new(),
                submit: SubmitBehavior::Accept,
                revert_with: None,
                failing_views: HashSet::new(),
                slow_views: HashMap::new(),
                finality_delay: None,
                next_hash: 0,
                version: 100,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("chain state lock")
    }

    pub fn with_jobs(self: Arc<Self>, jobs: Vec<WorkItem>) -> Arc<Self> {
        self.lock().jobs = jobs;
        self
    }

    pub fn with_payments(self: Arc<Self>, payments: Vec<PaymentRecord>) -> Arc<Self> {
        self.lock().payments = payments;
        self
    }

    pub fn set_submit(&self, behavior: SubmitBehavior) {
        self.lock().submit = behavior;
    }

    pub fn revert_with(&self, vm_status: &str) {
        self.lock().revert_with = Some(vm_status.to_string());
    }

    pub fn fail_view(&self, function_name: &str) {
        self.lock().failing_views.insert(function_name.to_string());
    }

    pub fn heal_view(&self, function_name: &str) {
        self.lock().failing_views.remove(function_name);
    }

    pub fn slow_view(&self, function_name: &str, delay: Duration) {
        self.lock()
            .slow_views
            .insert(function_name.to_string(), delay);
    }

    pub fn slow_finality(&self, delay: Duration) {
        self.lock().finality_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn submissions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Submit(_)))
            .count()
    }

    pub fn jobs(&self) -> Vec<WorkItem> {
        self.lock().jobs.clone()
    }

    fn apply(state: &mut ChainState, pending: Pending) {
        let function = pending.payload.function.function_name.as_str();
        let args = &pending.payload.arguments;
        let sender = pending.sender;
        match (function, args.as_slice()) {
            (
                "post_job",
                [MoveValue::U64(id), MoveValue::String(description), MoveValue::U64(amount), MoveValue::U64(deadline)],
            ) => state.jobs.push(WorkItem {
                job_id: JobId(*id),
                client: sender,
                freelancer: None,
                description: description.clone(),
                payment_amount: shared::amount::Amount::from_raw(*amount),
                deadline: *deadline,
                is_accepted: false,
                is_completed: false,
                is_paid: false,
            }),
            ("accept_job", [MoveValue::U64(id)]) => {
                if let Some(job) = state.jobs.iter_mut().find(|job| job.job_id.0 == *id) {
                    job.is_accepted = true;
                    job.freelancer = Some(sender);
                }
            }
            ("complete_job", [MoveValue::U64(id)]) => {
                if let Some(job) = state.jobs.iter_mut().find(|job| job.job_id.0 == *id) {
                    job.is_completed = true;
                }
            }
            ("pay_freelancer", [MoveValue::U64(id)]) => {
                if let Some(job) = state.jobs.iter_mut().find(|job| job.job_id.0 == *id) {
                    job.is_paid = true;
                }
            }
            (
                "make_payment",
                [MoveValue::Address(payee), MoveValue::U64(amount), MoveValue::String(message)],
            ) => {
                let payment_id = PaymentId(state.payments.len() as u64 + 1);
                state.payments.push(PaymentRecord {
                    payment_id,
                    payer: sender,
                    payee: payee.clone(),
                    amount: shared::amount::Amount::from_raw(*amount),
                    message: message.clone(),
                    is_refunded: false,
                });
            }
            ("refund_payment", [MoveValue::U64(id)]) => {
                if let Some(payment) = state
                    .payments
                    .iter_mut()
                    .find(|payment| payment.payment_id.0 == *id)
                {
                    payment.is_refunded = true;
                }
            }
            _ => {}
        }
    }

    fn answer(state: &ChainState, request: &ViewRequest) -> Value {
        let address = |index: usize| match request.arguments.get(index) {
            Some(MoveValue::Address(address)) => Some(address.clone()),
            _ => None,
        };
        let id = |index: usize| match request.arguments.get(index) {
            Some(MoveValue::U64(id)) => Some(*id),
            _ => None,
        };
        let jobs = |filter: &dyn Fn(&WorkItem) -> bool| {
            Value::Array(state.jobs.iter().filter(|job| filter(job)).map(job_json).collect())
        };
        let payments = |filter: &dyn Fn(&PaymentRecord) -> bool| {
            Value::Array(
                state
                    .payments
                    .iter()
                    .filter(|payment| filter(payment))
                    .map(payment_json)
                    .collect(),
            )
        };

        match request.function.function_name.as_str() {
            "view_all_jobs" => jobs(&|_| true),
            "view_jobs_by_client" => {
                let client = address(0);
                jobs(&|job| Some(&job.client) == client.as_ref())
            }
            "view_jobs_by_freelancer" => {
                let freelancer = address(0);
                jobs(&|job| job.freelancer.is_some() && job.freelancer == freelancer)
            }
            "view_job_by_id" => {
                let wanted = id(0);
                let found: Vec<Value> = state
                    .jobs
                    .iter()
                    .filter(|job| Some(job.job_id.0) == wanted)
                    .map(job_json)
                    .collect();
                json!({ "vec": found })
            }
            "view_all_payments" => payments(&|_| true),
            "view_payments_by_payer" => {
                let payer = address(0);
                payments(&|payment| Some(&payment.payer) == payer.as_ref())
            }
            "view_payments_by_payee" => {
                let payee = address(0);
                payments(&|payment| Some(&payment.payee) == payee.as_ref())
            }
            "view_payment_by_id" => {
                let wanted = id(0);
                state
                    .payments
                    .iter()
                    .find(|payment| Some(payment.payment_id.0) == wanted)
                    .map(payment_json)
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }
}

pub fn job_json(job: &WorkItem) -> Value {
    let freelancer: Vec<&str> = job.freelancer.iter().map(AccountAddress::as_str).collect();
    json!({
        "job_id": job.job_id.0.to_string(),
        "client": job.client.as_str(),
        "freelancer": { "vec": freelancer },
        "description": job.description,
        "payment_amount": job.payment_amount.raw().to_string(),
        "job_deadline": job.deadline.to_string(),
        "is_accepted": job.is_accepted,
        "is_completed": job.is_completed,
        "is_paid": job.is_paid,
        "is_freelancer_assigned": job.freelancer.is_some(),
    })
}

pub fn payment_json(payment: &PaymentRecord) -> Value {
    json!({
        "payment_id": payment.payment_id.0.to_string(),
        "payer": payment.payer.as_str(),
        "payee": payment.payee.as_str(),
        "amount": payment.amount.raw().to_string(),
        "message": payment.message,
        "is_refunded": payment.is_refunded,
    })
}

#[async_trait]
impl TransactionSigner for FakeChain {
    async fn sign_and_submit(
        &self,
        sender: &AccountAddress,
        payload: &EntryFunctionPayload,
    ) -> Result<PendingTransaction, SignerError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::Submit(payload.function.function_name.clone()));
        match state.submit.clone() {
            SubmitBehavior::Accept => {}
            SubmitBehavior::Decline => {
                return Err(SignerError::Rejected("User rejected the request.".to_string()))
            }
            SubmitBehavior::Fail(message) => return Err(SignerError::Failed(message)),
            SubmitBehavior::Unreachable => {
                return Err(SignerError::Transport("connection refused".to_string()))
            }
        }
        state.next_hash += 1;
        let hash = TransactionHash(format!("0x{:064x}", state.next_hash));
        state.pending.insert(
            hash.clone(),
            Pending {
                sender: sender.clone(),
                payload: payload.clone(),
            },
        );
        Ok(PendingTransaction { hash })
    }
}

#[async_trait]
impl Ledger for FakeChain {
    async fn await_finality(
        &self,
        hash: &TransactionHash,
        max_wait: Duration,
    ) -> Result<CommittedTransaction, FinalityError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::Finality(hash.clone()));
            state.finality_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        let Some(pending) = state.pending.remove(hash) else {
            return Err(FinalityError::Timeout {
                hash: hash.clone(),
                waited: max_wait,
            });
        };
        state.version += 1;
        let version = state.version;
        if let Some(vm_status) = state.revert_with.clone() {
            return Err(FinalityError::Reverted {
                hash: hash.clone(),
                vm_status,
            });
        }
        Self::apply(&mut state, pending);
        Ok(CommittedTransaction {
            hash: hash.clone(),
            version,
            success: true,
            vm_status: "Executed successfully".to_string(),
        })
    }

    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, ViewError> {
        let function = request.function.function_name.clone();
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::View(function.clone()));
            state.slow_views.get(&function).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        if state.failing_views.contains(&function) {
            return Err(ViewError::Transport(format!("{function} unavailable")));
        }
        Ok(vec![Self::answer(&state, request)])
    }
}

pub fn address(raw: &str) -> AccountAddress {
    raw.parse().expect("address")
}

pub fn open_job(id: u64, client: &AccountAddress, description: &str) -> WorkItem {
    WorkItem {
        job_id: JobId(id),
        client: client.clone(),
        freelancer: None,
        description: description.to_string(),
        payment_amount: shared::amount::Amount::from_raw(100_000_000),
        deadline: 1_900_000_000,
        is_accepted: false,
        is_completed: false,
        is_paid: false,
    }
}
