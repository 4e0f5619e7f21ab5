//! Campaign Express: personalized email campaign dispatch and delivery analytics.
//!
//! Main entry point that wires the configured backends together and starts the
//! worker pool, the metrics exporter and the HTTP server.

use campaign_agents::{DeliveryWorker, DispatchScheduler, InProcessQueue, RedisJobQueue, WorkerPool};
use campaign_analytics::{ClickHouseEventStore, InMemoryEventStore, MetricsAggregator};
use campaign_api::{ApiServer, AppState};
use campaign_channels::{EventIngestor, LogTransport, SendGridTransport};
use campaign_core::config::{AppConfig, QueueBackend, StoreBackend};
use campaign_core::{DeliveryTransport, EventStore, JobQueue, TextGenerator};
use campaign_personalization::{EchoGenerator, OpenAiGenerator};
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-express")]
#[command(about = "Personalized email campaign dispatch and delivery analytics")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__NODE_ID")]
    node_id: Option<String>,

    /// Number of delivery workers (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__WORKERS__COUNT")]
    workers: Option<usize>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Log messages instead of sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

/// Log filter used when `RUST_LOG` is unset: every workspace crate at info.
const DEFAULT_LOG_FILTER: &str = "info,campaign_express=info,campaign_api=info,\
campaign_agents=info,campaign_channels=info,campaign_analytics=info,\
campaign_personalization=info,campaign_integrations=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Express starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(workers) = cli.workers {
        config.workers.count = workers;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.dry_run {
        config.delivery.dry_run = true;
    }
    config.validate()?;

    info!(
        node_id = %config.node_id,
        workers = config.workers.count,
        http_port = config.api.http_port,
        dry_run = config.delivery.dry_run,
        "Configuration loaded"
    );

    let store = build_store(&config).await?;
    let queue = build_queue(&config).await?;
    let generator = build_generator(&config);
    let transport = build_transport(&config);

    info!(
        store = store.name(),
        queue = queue.name(),
        generator = generator.name(),
        transport = transport.name(),
        "Backends selected"
    );

    let mut pool = WorkerPool::new(
        config.node_id.clone(),
        queue.clone(),
        DeliveryWorker::new(generator, transport),
    )
    .with_shutdown_grace(config.workers.shutdown_grace());
    pool.start(config.workers.count);

    let state = AppState {
        scheduler: Arc::new(DispatchScheduler::new(queue, config.dispatch.clone())),
        ingestor: Arc::new(EventIngestor::new(store.clone())),
        aggregator: Arc::new(MetricsAggregator::new(store)),
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
    };
    let api_server = ApiServer::new(config.clone(), state);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Campaign Express is ready to serve traffic");

    // Serve until Ctrl-C
    api_server.start_http(shutdown_signal()).await?;

    // Finish in-flight deliveries before exiting.
    pool.shutdown().await;
    info!("Campaign Express stopped");
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    Ok(match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryEventStore::new()),
        StoreBackend::ClickHouse => Arc::new(ClickHouseEventStore::new(&config.clickhouse).await?),
    })
}

async fn build_queue(config: &AppConfig) -> anyhow::Result<Arc<dyn JobQueue>> {
    Ok(match config.workers.queue_backend {
        QueueBackend::Memory => Arc::new(InProcessQueue::new()),
        QueueBackend::Redis => Arc::new(RedisJobQueue::new(&config.redis).await?),
    })
}

fn build_generator(config: &AppConfig) -> Arc<dyn TextGenerator> {
    if config.generation.api_key.is_empty() {
        warn!("No generation API key configured, templates are sent as rendered");
        Arc::new(EchoGenerator)
    } else {
        Arc::new(OpenAiGenerator::new(&config.generation))
    }
}

fn build_transport(config: &AppConfig) -> Arc<dyn DeliveryTransport> {
    if config.delivery.dry_run {
        Arc::new(LogTransport)
    } else if config.delivery.api_key.is_empty() {
        warn!("No delivery API key configured, falling back to dry-run transport");
        Arc::new(LogTransport)
    } else {
        Arc::new(SendGridTransport::new(&config.delivery))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
