use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use gridscope_core::ThresholdSet;
use gridscope_ingest::{
    Emission, LoadRequest, Orchestrator, ReadingCache, ReadingSource, Snapshot,
};

pub type SharedDashboard = Arc<RwLock<DashboardState>>;

/// The latest pipeline output plus the request that produced it. One
/// dashboard per process, matching the single-orchestrator pipeline.
#[derive(Default)]
pub struct DashboardState {
    pub request: Option<LoadRequest>,
    pub warning: Option<&'static str>,
    pub snapshot: Option<Snapshot>,
}

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub source: Arc<dyn ReadingSource>,
    pub cache: Arc<dyn ReadingCache>,
    pub thresholds: ThresholdSet,
    /// Cloned into every load; the drain task owns the receiving end.
    pub updates: mpsc::UnboundedSender<Emission>,
    pub dashboard: SharedDashboard,
}

/// Move pipeline emissions into the shared dashboard state as they
/// arrive. Each current-generation snapshot replaces the previous one
/// wholesale; emissions tagged with a superseded generation are dropped,
/// so a background chunk that was already in flight when a new load
/// started can never overwrite the newer request's state. Runs until the
/// last sender is gone.
pub fn spawn_snapshot_drain(
    dashboard: SharedDashboard,
    orchestrator: Arc<Orchestrator>,
    mut updates: mpsc::UnboundedReceiver<Emission>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(emission) = updates.recv().await {
            if emission.generation != orchestrator.current_generation() {
                debug!(
                    generation = emission.generation,
                    node = %emission.snapshot.node,
                    "dropping stale emission"
                );
                continue;
            }
            let mut state = dashboard.write().await;
            state.snapshot = Some(emission.snapshot);
        }
    })
}
