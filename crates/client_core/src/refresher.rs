use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use ledger_client::{Ledger, ViewError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    cache::{AggregationCache, ApplyOutcome, Completion, RefreshTicket, Snapshot},
    events::ClientEvent,
    intent::{ContractModules, ViewIntent},
};

/// Tally of one refresh round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub applied: usize,
    pub failed: usize,
    pub stale: usize,
}

impl RefreshReport {
    fn record(&mut self, outcome: ApplyOutcome, failed: bool) {
        match (outcome, failed) {
            (ApplyOutcome::Stale, _) => self.stale += 1,
            (ApplyOutcome::Applied, true) => self.failed += 1,
            (ApplyOutcome::Applied, false) => self.applied += 1,
        }
    }
}

/// Re-issues view queries and feeds their results into the cache. Query
/// failures never reach the caller; they become errored cache entries.
pub struct ViewRefresher {
    ledger: Arc<dyn Ledger>,
    cache: Arc<AggregationCache>,
    modules: ContractModules,
    view_timeout: Duration,
    events: broadcast::Sender<ClientEvent>,
}

impl ViewRefresher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        cache: Arc<AggregationCache>,
        modules: ContractModules,
        view_timeout: Duration,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            ledger,
            cache,
            modules,
            view_timeout,
            events,
        }
    }

    /// Queries every intent once, concurrently. Tickets are taken up front
    /// so sequence numbers follow the order the intents were given in.
    pub async fn refresh<I>(&self, intents: I) -> RefreshReport
    where
        I: IntoIterator<Item = ViewIntent>,
    {
        self.run(intents, None).await
    }

    /// Refreshes only while the cache is still at `generation`. Intents that
    /// could not get a ticket are counted as stale and never queried.
    pub async fn refresh_within<I>(&self, intents: I, generation: u64) -> RefreshReport
    where
        I: IntoIterator<Item = ViewIntent>,
    {
        self.run(intents, Some(generation)).await
    }

    async fn run<I>(&self, intents: I, generation: Option<u64>) -> RefreshReport
    where
        I: IntoIterator<Item = ViewIntent>,
    {
        let mut unique: Vec<ViewIntent> = Vec::new();
        for intent in intents {
            if !unique.contains(&intent) {
                unique.push(intent);
            }
        }

        let mut report = RefreshReport::default();
        let mut tickets = Vec::with_capacity(unique.len());
        for intent in unique {
            let ticket = match generation {
                None => Some(self.cache.begin(intent).await),
                Some(generation) => self.cache.begin_within(intent, generation).await,
            };
            match ticket {
                Some(ticket) => tickets.push(ticket),
                None => report.stale += 1,
            }
        }
        if generation.is_some() && report.stale > 0 {
            debug!(skipped = report.stale, "cache generation moved on; skipping refresh");
        }

        let outcomes = join_all(tickets.iter().map(|ticket| self.refresh_one(ticket))).await;

        for (outcome, failed) in outcomes {
            report.record(outcome, failed);
        }
        report
    }

    async fn refresh_one(&self, ticket: &RefreshTicket) -> (ApplyOutcome, bool) {
        let intent = ticket.intent();
        let (completion, failure) = match self.fetch(intent).await {
            Ok(snapshot) => (Completion::Fetched(snapshot), None),
            Err(err) => {
                let reason = err.to_string();
                (
                    Completion::Failed {
                        reason: reason.clone(),
                        fallback: intent.shape().empty(),
                    },
                    Some(reason),
                )
            }
        };

        let outcome = self.cache.complete(ticket, completion).await;
        match (outcome, failure) {
            (ApplyOutcome::Stale, _) => {
                debug!(%intent, seq = ticket.seq(), "discarded stale view completion");
                (outcome, false)
            }
            (ApplyOutcome::Applied, Some(reason)) => {
                warn!(%intent, %reason, "view query failed; showing empty result");
                let _ = self.events.send(ClientEvent::ViewFailed {
                    intent: intent.clone(),
                    reason,
                });
                (outcome, true)
            }
            (ApplyOutcome::Applied, None) => {
                let _ = self.events.send(ClientEvent::ViewUpdated(intent.clone()));
                (outcome, false)
            }
        }
    }

    async fn fetch(&self, intent: &ViewIntent) -> Result<Snapshot, ViewError> {
        let request = intent.request(&self.modules);
        let results = tokio::time::timeout(self.view_timeout, self.ledger.view(&request))
            .await
            .map_err(|_| ViewError::Timeout(self.view_timeout))??;
        Ok(intent.shape().decode(results)?)
    }
}

#[cfg(test)]
#[path = "tests/refresher_tests.rs"]
mod tests;
