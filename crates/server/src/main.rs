//! gridscope-server — HTTP API over the power-quality telemetry pipeline.

mod api;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use gridscope_compute::QualityMethod;
use gridscope_core::config::load_dotenv;
use gridscope_core::{Config, QualityThresholds, ThresholdSet};
use gridscope_ingest::{
    AnomalyClassifier, HttpClassifier, HttpReadingSource, LocalClassifier, MemoryCache,
    Orchestrator, PipelineSettings, ReadingCache, ReadingSource,
};

use crate::state::{AppState, DashboardState};

// ── CLI ─────────────────────────────────────────────────────────────

/// Power-quality telemetry dashboard server.
#[derive(Parser, Debug)]
#[command(name = "gridscope-server", version, about)]
struct Cli {
    /// Port to listen on (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Telemetry store base URL (overrides SOURCE_URL).
    #[arg(long)]
    source_url: Option<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    load_dotenv();
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(source_url) = cli.source_url {
        config.source.base_url = source_url;
    }
    config.log_summary();

    let thresholds = ThresholdSet::from_name(&config.pipeline.threshold_preset)?;
    let quality = QualityThresholds::from_name(&config.pipeline.quality_preset)?;
    let quality_method: QualityMethod = config.pipeline.quality_method.parse()?;

    let source: Arc<dyn ReadingSource> = Arc::new(HttpReadingSource::new(&config.source)?);
    let classifier: Arc<dyn AnomalyClassifier> = match &config.classifier.base_url {
        Some(url) => {
            info!(url = %url, "using remote anomaly classifier");
            Arc::new(HttpClassifier::new(url, config.classifier.timeout_secs)?)
        }
        None => {
            info!("using local threshold classifier");
            Arc::new(LocalClassifier)
        }
    };
    let cache: Arc<dyn ReadingCache> = Arc::new(MemoryCache::unbounded());

    let orchestrator = Arc::new(Orchestrator::new(
        source.clone(),
        classifier,
        cache.clone(),
        thresholds.clone(),
        quality,
        quality_method,
        PipelineSettings::from_config(&config.pipeline),
    ));

    let (updates, updates_rx) = mpsc::unbounded_channel();
    let dashboard = Arc::new(RwLock::new(DashboardState::default()));
    // Runs for the life of the process; the handle is not awaited.
    let _drain = state::spawn_snapshot_drain(dashboard.clone(), orchestrator.clone(), updates_rx);

    let app_state = Arc::new(AppState {
        orchestrator,
        source,
        cache,
        thresholds,
        updates,
        dashboard,
    });

    let app = router::build_router(app_state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
