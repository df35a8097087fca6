// src/main.rs
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use rpc_fleet_controller::{
    config::{self, SinkKind},
    controller::FleetController,
    deploy::{DeployPipeline, FilePublisher, WebhookTrigger},
    health::HealthEvaluator,
    metrics::{LogSink, PrometheusSink},
    poller::FleetPoller,
    probe::NodeProber,
    registry::MemoryRegistry,
    server::{AdminHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rpc_fleet_controller=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    let registry = Arc::new(MemoryRegistry::from_seeds(&config.backends));

    let prober = NodeProber::new(config.poll.probe_timeout())
        .context("Failed to create probe HTTP client")?;
    let poller = FleetPoller::new(Arc::new(prober))
        .with_max_concurrency(config.poll.max_concurrent_probes);
    let evaluator = HealthEvaluator::new(config.poll.tolerance);

    // Write the config to disk first, then hand off to the webhook if any.
    let mut pipeline =
        DeployPipeline::new().with_stage(Arc::new(FilePublisher::new(&config.deploy.output_path)));
    if let Some(url) = &config.deploy.webhook_url {
        let webhook = WebhookTrigger::new(url.clone(), config.deploy.webhook_timeout())
            .context("Failed to create webhook HTTP client")?;
        pipeline = pipeline.with_stage(Arc::new(webhook));
    }

    let mut admin = AdminHandler::new(registry.clone(), &config.admin.metrics_path);
    let mut controller = FleetController::new(registry.clone(), poller, evaluator, Arc::new(pipeline))
        .with_stack_name(config.metrics.stack_name.clone())
        .with_interval(config.poll.interval());

    if config.metrics.enabled {
        match config.metrics.sink {
            SinkKind::Prometheus => {
                let sink = Arc::new(
                    PrometheusSink::new().context("Failed to register prometheus metrics")?,
                );
                admin = admin.with_metrics(sink.clone());
                controller = controller.with_sink(sink);
            }
            SinkKind::Log => {
                controller = controller.with_sink(Arc::new(LogSink::default()));
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr: SocketAddr = config
        .admin
        .bind_address
        .parse()
        .with_context(|| format!("Invalid admin.bind_address {}", config.admin.bind_address))?;
    let server = ServerBuilder::new(addr).with_handler(admin).bind().await?;
    let server_task = tokio::spawn(server.serve(shutdown_rx.clone()));

    let controller = Arc::new(controller);
    let controller_task = {
        let controller = controller.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { controller.run(shutdown_rx).await })
    };

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    controller_task.await?;
    if let Err(e) = server_task.await? {
        error!("Admin API error: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
