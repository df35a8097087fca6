// src/poller/fleet.rs
use crate::probe::{HeightProbe, ProbeOutcome};
use crate::registry::BackendRecord;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Outcome of polling one backend, paired with the state it had when the
/// cycle started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub url: String,
    pub previous_height: Option<u64>,
    pub height: Option<u64>,
    pub latency_ms: u64,
    pub is_leader: bool,
    pub was_healthy: bool,
}

impl PollResult {
    pub fn from_probe(record: &BackendRecord, outcome: ProbeOutcome) -> Self {
        Self {
            url: record.url.clone(),
            previous_height: record.height,
            height: outcome.height,
            latency_ms: outcome.latency_ms,
            is_leader: record.is_leader,
            was_healthy: record.is_healthy,
        }
    }
}

pub struct FleetPoller {
    probe: Arc<dyn HeightProbe>,
    max_concurrency: usize,
}

impl FleetPoller {
    pub fn new(probe: Arc<dyn HeightProbe>) -> Self {
        Self {
            probe,
            max_concurrency: 0,
        }
    }

    /// Cap the number of probes in flight. 0 runs every probe at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Probe every record concurrently. Returns one result per record, in the
    /// order the records were given.
    pub async fn poll_all(&self, records: &[BackendRecord]) -> Vec<PollResult> {
        let permits = match self.max_concurrency {
            0 => records.len().max(1),
            n => n,
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = Vec::with_capacity(records.len());

        for record in records {
            let probe = self.probe.clone();
            let semaphore = semaphore.clone();
            let url = record.url.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                probe.probe(&url).await
            }));
        }

        // join_all keeps task order, so results line up with `records`.
        let outcomes = futures::future::join_all(tasks).await;

        let results: Vec<PollResult> = records
            .iter()
            .zip(outcomes)
            .map(|(record, outcome)| {
                let outcome = outcome.unwrap_or_else(|e| {
                    error!("Probe task for {} failed: {}", record.url, e);
                    ProbeOutcome {
                        height: None,
                        latency_ms: 0,
                    }
                });
                PollResult::from_probe(record, outcome)
            })
            .collect();

        let responded = results.iter().filter(|r| r.height.is_some()).count();
        info!(
            "Poll complete: {} responded, {} failed",
            responded,
            results.len() - responded
        );
        for result in &results {
            debug!(
                url = %result.url,
                height = ?result.height,
                previous_height = ?result.previous_height,
                latency_ms = result.latency_ms,
                "Polled backend"
            );
        }

        results
    }
}
