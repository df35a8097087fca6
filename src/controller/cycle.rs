// src/controller/cycle.rs
use crate::deploy::{DeploymentTrigger, ReconfigureRequest};
use crate::health::HealthEvaluator;
use crate::metrics::{project_points, MetricsSink};
use crate::nginx;
use crate::poller::FleetPoller;
use crate::registry::{BackendRecord, BackendRegistry, RegistryError};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub reference_height: Option<u64>,
    pub total: usize,
    pub healthy: usize,
    pub needs_reconfiguration: bool,
    /// Records whose updated state could not be written back.
    pub write_failures: usize,
    /// Id of the reconfiguration request dispatched by this cycle.
    pub reconfiguration: Option<Uuid>,
}

/// Drives poll cycles against a registry: probe, classify, persist, then
/// hand off metrics and (on a transition) reconfiguration.
pub struct FleetController {
    registry: Arc<dyn BackendRegistry>,
    poller: FleetPoller,
    evaluator: HealthEvaluator,
    sink: Option<Arc<dyn MetricsSink>>,
    trigger: Arc<dyn DeploymentTrigger>,
    stack_name: String,
    interval: Duration,
    side_effects: Mutex<JoinSet<()>>,
    /// Feeds the single task that delivers reconfigurations in cycle order.
    deliveries: Mutex<Option<mpsc::UnboundedSender<ReconfigureRequest>>>,
}

impl FleetController {
    pub fn new(
        registry: Arc<dyn BackendRegistry>,
        poller: FleetPoller,
        evaluator: HealthEvaluator,
        trigger: Arc<dyn DeploymentTrigger>,
    ) -> Self {
        Self {
            registry,
            poller,
            evaluator,
            sink: None,
            trigger,
            stack_name: "jsonrpc-proxy".to_string(),
            interval: Duration::from_secs(15),
            side_effects: Mutex::new(JoinSet::new()),
            deliveries: Mutex::new(None),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_stack_name(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = stack_name.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one poll cycle. Only a failure to read the registry is an error;
    /// everything past that point is logged and reported.
    pub async fn run_cycle(&self) -> Result<CycleReport, RegistryError> {
        let records = self.registry.get_all().await?;
        let results = self.poller.poll_all(&records).await;
        let evaluation = self.evaluator.evaluate(&results);

        let mut snapshot: Vec<BackendRecord> = Vec::with_capacity(records.len());
        let mut write_failures = 0;
        for (record, node) in records.iter().zip(&evaluation.nodes) {
            match self
                .registry
                .update_health(record, node.height, node.is_healthy)
                .await
            {
                Ok(Some(updated)) => snapshot.push(updated),
                Ok(None) => {
                    debug!(url = %record.url, "Backend removed or re-registered during poll, not updated");
                }
                Err(e) => {
                    error!(url = %record.url, error = %e, "Failed to persist backend state");
                    write_failures += 1;
                    snapshot.push(record.with_health(node.height, node.is_healthy));
                }
            }
        }

        if let Some(sink) = &self.sink {
            let points = project_points(&evaluation, &self.stack_name, Utc::now());
            let sink = sink.clone();
            self.spawn_side_effect(async move {
                if let Err(e) = sink.emit(points).await {
                    error!("Failed to emit metrics: {}", e);
                }
            })
            .await;
        }

        let reconfiguration = if evaluation.needs_reconfiguration {
            let config = nginx::generate(&snapshot);
            let request = ReconfigureRequest::new(config, evaluation.healthy_count());
            let id = request.id;
            info!(request_id = %id, "Healthy set changed, triggering reconfiguration");
            self.dispatch_reconfiguration(request).await;
            Some(id)
        } else {
            debug!("No health transitions, proxy config unchanged");
            None
        };

        Ok(CycleReport {
            reference_height: evaluation.reference_height(),
            total: evaluation.nodes.len(),
            healthy: evaluation.healthy_count(),
            needs_reconfiguration: evaluation.needs_reconfiguration,
            write_failures,
            reconfiguration,
        })
    }

    /// Wait for every outstanding metrics batch and reconfiguration.
    pub async fn settle(&self) {
        // Dropping the sender lets the delivery task drain its queue and exit.
        self.deliveries.lock().await.take();

        let mut tasks = self.side_effects.lock().await;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Side effect task failed: {}", e);
            }
        }
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped).
    /// Missed ticks are skipped, so a slow cycle never queues a burst.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Starting fleet controller with interval: {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) => info!(
                            reference_height = ?report.reference_height,
                            healthy = report.healthy,
                            total = report.total,
                            write_failures = report.write_failures,
                            reconfiguration = ?report.reconfiguration,
                            "Poll cycle complete"
                        ),
                        Err(e) => warn!("Poll cycle aborted: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Fleet controller shutting down");
                        break;
                    }
                }
            }
        }

        self.settle().await;
    }

    async fn dispatch_reconfiguration(&self, request: ReconfigureRequest) {
        let mut sender = self.deliveries.lock().await;
        if sender.as_ref().map_or(true, |tx| tx.is_closed()) {
            let (tx, rx) = mpsc::unbounded_channel();
            self.spawn_side_effect(deliver_in_order(self.trigger.clone(), rx))
                .await;
            *sender = Some(tx);
        }
        if let Some(tx) = sender.as_ref() {
            if let Err(rejected) = tx.send(request) {
                error!(request_id = %rejected.0.id, "Reconfiguration dropped, delivery task is gone");
            }
        }
    }

    async fn spawn_side_effect<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.side_effects.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!("Side effect task failed: {}", e);
            }
        }
        tasks.spawn(task);
    }
}

/// Delivers requests one at a time, in the order they were queued.
async fn deliver_in_order(
    trigger: Arc<dyn DeploymentTrigger>,
    mut requests: mpsc::UnboundedReceiver<ReconfigureRequest>,
) {
    while let Some(request) = requests.recv().await {
        let id = request.id;
        if let Err(e) = trigger.reconfigure(request).await {
            error!(request_id = %id, "Reconfiguration failed: {}", e);
        }
    }
}
