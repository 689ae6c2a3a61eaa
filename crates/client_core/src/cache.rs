//! Aggregation cache: the latest snapshot of every view intent.
//!
//! Writes replace whole snapshots. Each refresh is issued a [`RefreshTicket`]
//! with a monotonic sequence number; a completion is applied only when it is
//! newer than what the key already holds and was issued under the current
//! generation. Invalidating the cache bumps the generation, which discards
//! every completion still in flight.

use std::collections::HashMap;

use serde::Serialize;
use shared::domain::{JobId, PaymentId, PaymentRecord, WorkItem};
use tokio::sync::RwLock;

use crate::intent::ViewIntent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    Jobs(Vec<WorkItem>),
    Job(Option<WorkItem>),
    Payments(Vec<PaymentRecord>),
    Payment(Option<PaymentRecord>),
}

impl Snapshot {
    pub fn as_jobs(&self) -> Option<&[WorkItem]> {
        match self {
            Self::Jobs(jobs) => Some(jobs),
            _ => None,
        }
    }

    pub fn as_job(&self) -> Option<&WorkItem> {
        match self {
            Self::Job(job) => job.as_ref(),
            _ => None,
        }
    }

    pub fn as_payments(&self) -> Option<&[PaymentRecord]> {
        match self {
            Self::Payments(payments) => Some(payments),
            _ => None,
        }
    }

    pub fn as_payment(&self) -> Option<&PaymentRecord> {
        match self {
            Self::Payment(payment) => payment.as_ref(),
            _ => None,
        }
    }
}

/// Load state of one view. "Not fetched yet", "fetched and empty" and
/// "failed to fetch" are all distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    Unloaded,
    Loaded {
        snapshot: Snapshot,
        seq: u64,
    },
    Errored {
        reason: String,
        seq: u64,
        fallback: Snapshot,
    },
}

impl ViewState {
    /// What the presentation layer renders: the loaded snapshot, or the
    /// empty fallback of a failed read. `None` while unloaded.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Unloaded => None,
            Self::Loaded { snapshot, .. } => Some(snapshot),
            Self::Errored { fallback, .. } => Some(fallback),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }

    fn applied_seq(&self) -> Option<u64> {
        match self {
            Self::Unloaded => None,
            Self::Loaded { seq, .. } | Self::Errored { seq, .. } => Some(*seq),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    intent: ViewIntent,
    seq: u64,
    generation: u64,
}

impl RefreshTicket {
    pub fn intent(&self) -> &ViewIntent {
        &self.intent
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer completion already landed, or the cache was invalidated
    /// after the ticket was issued.
    Stale,
}

/// Outcome of a single view query, as handed to [`AggregationCache::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Fetched(Snapshot),
    Failed { reason: String, fallback: Snapshot },
}

#[derive(Default)]
struct CacheInner {
    next_seq: u64,
    generation: u64,
    entries: HashMap<ViewIntent, ViewState>,
    selected_job: Option<JobId>,
    selected_payment: Option<PaymentId>,
}

#[derive(Default)]
pub struct AggregationCache {
    inner: RwLock<CacheInner>,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket for a query about to be sent. Tickets are numbered in
    /// issue order across all keys.
    pub async fn begin(&self, intent: ViewIntent) -> RefreshTicket {
        let mut guard = self.inner.write().await;
        guard.next_seq += 1;
        let seq = guard.next_seq;
        let generation = guard.generation;
        guard
            .entries
            .entry(intent.clone())
            .or_insert(ViewState::Unloaded);
        RefreshTicket {
            intent,
            seq,
            generation,
        }
    }

    /// Like [`begin`](Self::begin), but only while the cache is still at
    /// `generation`. Returns `None` and leaves no slot behind otherwise.
    pub async fn begin_within(&self, intent: ViewIntent, generation: u64) -> Option<RefreshTicket> {
        let mut guard = self.inner.write().await;
        if guard.generation != generation {
            return None;
        }
        guard.next_seq += 1;
        let seq = guard.next_seq;
        guard
            .entries
            .entry(intent.clone())
            .or_insert(ViewState::Unloaded);
        Some(RefreshTicket {
            intent,
            seq,
            generation,
        })
    }

    pub async fn complete(&self, ticket: &RefreshTicket, completion: Completion) -> ApplyOutcome {
        let mut guard = self.inner.write().await;
        if ticket.generation != guard.generation {
            return ApplyOutcome::Stale;
        }
        let state = guard
            .entries
            .entry(ticket.intent.clone())
            .or_insert(ViewState::Unloaded);
        if state.applied_seq().is_some_and(|applied| applied >= ticket.seq) {
            return ApplyOutcome::Stale;
        }
        *state = match completion {
            Completion::Fetched(snapshot) => ViewState::Loaded {
                snapshot,
                seq: ticket.seq,
            },
            Completion::Failed { reason, fallback } => ViewState::Errored {
                reason,
                seq: ticket.seq,
                fallback,
            },
        };
        ApplyOutcome::Applied
    }

    pub async fn get(&self, intent: &ViewIntent) -> ViewState {
        self.inner
            .read()
            .await
            .entries
            .get(intent)
            .cloned()
            .unwrap_or(ViewState::Unloaded)
    }

    pub async fn jobs(&self, intent: &ViewIntent) -> Option<Vec<WorkItem>> {
        self.get(intent)
            .await
            .snapshot()
            .and_then(Snapshot::as_jobs)
            .map(<[WorkItem]>::to_vec)
    }

    pub async fn payments(&self, intent: &ViewIntent) -> Option<Vec<PaymentRecord>> {
        self.get(intent)
            .await
            .snapshot()
            .and_then(Snapshot::as_payments)
            .map(<[PaymentRecord]>::to_vec)
    }

    /// Every intent the cache currently holds a slot for.
    pub async fn tracked(&self) -> Vec<ViewIntent> {
        self.inner.read().await.entries.keys().cloned().collect()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Drops every snapshot and selection, and orphans in-flight tickets.
    pub async fn invalidate_all(&self) {
        let mut guard = self.inner.write().await;
        guard.generation += 1;
        guard.entries.clear();
        guard.selected_job = None;
        guard.selected_payment = None;
    }

    pub async fn select_job(&self, job_id: JobId) {
        self.inner.write().await.selected_job = Some(job_id);
    }

    /// State of the job the presentation last asked for. Reads through to
    /// that job's own key, so a late answer for an earlier selection can
    /// never show up here.
    pub async fn selected_job(&self) -> ViewState {
        let guard = self.inner.read().await;
        guard
            .selected_job
            .and_then(|job_id| guard.entries.get(&ViewIntent::JobById(job_id)).cloned())
            .unwrap_or(ViewState::Unloaded)
    }

    pub async fn select_payment(&self, payment_id: PaymentId) {
        self.inner.write().await.selected_payment = Some(payment_id);
    }

    pub async fn selected_payment(&self) -> ViewState {
        let guard = self.inner.read().await;
        guard
            .selected_payment
            .and_then(|payment_id| {
                guard
                    .entries
                    .get(&ViewIntent::PaymentById(payment_id))
                    .cloned()
            })
            .unwrap_or(ViewState::Unloaded)
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
