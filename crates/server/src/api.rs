use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gridscope_compute::{
    annotate, decimate_for_display, range_warning, Interruption, InterruptionStats, QualityMethod,
    QualityVerdict, SamplePlan,
};
use gridscope_core::{GridscopeError, Reading};
use gridscope_ingest::{
    CacheStats, LoadRequest, NodeDateRange, PipelineError, Snapshot, SourceError,
};

use crate::state::AppState;

// ── Error envelope ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl ToString) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn upstream_error(error: SourceError) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn conflict(error: PipelineError) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn no_dataset() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "no dataset loaded".to_string(),
        }),
    )
}

// ── Health ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub dataset_loaded: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dashboard = state.dashboard.read().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        dataset_loaded: dashboard.snapshot.is_some(),
    })
}

// ── Nodes ─────────────────────────────────────────────────────────

pub async fn nodes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let nodes = state.source.nodes().await.map_err(upstream_error)?;
    Ok(Json(nodes))
}

pub async fn node_range(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
) -> Result<Json<NodeDateRange>, ApiError> {
    let range = state
        .source
        .date_range(&node)
        .await
        .map_err(upstream_error)?;
    match range {
        Some(range) => Ok(Json(range)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no data for node {node}"),
            }),
        )),
    }
}

#[derive(Deserialize)]
pub struct LatestParams {
    pub since: Option<DateTime<Utc>>,
}

/// Incremental fetch for live views: readings strictly newer than
/// `since`, flagged against the configured thresholds. Without `since`
/// the window is the last five minutes.
pub async fn node_latest(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
    Query(params): Query<LatestParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let since = params
        .since
        .unwrap_or_else(|| Utc::now() - chrono::Duration::minutes(5));
    let mut readings = state
        .source
        .fetch_since(&node, since.date_naive(), since)
        .await
        .map_err(upstream_error)?;
    annotate(&mut readings, &state.thresholds);
    Ok(Json(readings))
}

// ── Dashboard ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DashboardRequest {
    pub node: String,
    pub start: String,
    pub end: String,
}

#[derive(Serialize)]
pub struct LoadResponse {
    pub warning: Option<&'static str>,
    pub snapshot: Snapshot,
}

/// Start a load. Any in-flight pipeline work for a previous request is
/// superseded first. Returns once the fetch phase is done; background
/// classification keeps refining the shared state afterwards.
pub async fn dashboard_load(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DashboardRequest>,
) -> Result<Json<LoadResponse>, ApiError> {
    let start: NaiveDate = body
        .start
        .parse()
        .map_err(|e: chrono::ParseError| bad_request(GridscopeError::from(e)))?;
    let end: NaiveDate = body
        .end
        .parse()
        .map_err(|e: chrono::ParseError| bad_request(GridscopeError::from(e)))?;
    if start > end {
        return Err(bad_request(GridscopeError::InvalidRange(format!(
            "start {start} is after end {end}"
        ))));
    }

    let request = LoadRequest {
        node: body.node,
        start,
        end,
    };
    let warning = range_warning(start, end);

    state.orchestrator.cancel();
    {
        let mut dashboard = state.dashboard.write().await;
        dashboard.request = Some(request.clone());
        dashboard.warning = warning;
        dashboard.snapshot = None;
    }

    // The terminal phase-1 snapshot already reached the drain through the
    // update channel; writing it here as well could regress a refined
    // phase-2 snapshot that was drained first.
    let snapshot = state
        .orchestrator
        .clone()
        .load(request, state.updates.clone())
        .await
        .map_err(conflict)?;

    Ok(Json(LoadResponse { warning, snapshot }))
}

#[derive(Serialize)]
pub struct DashboardStatus {
    pub request: Option<LoadRequest>,
    pub warning: Option<&'static str>,
    pub fetch_progress: u8,
    pub classify_progress: u8,
    pub total_raw: usize,
    pub anomaly_count: usize,
    pub latest: Option<Reading>,
    pub plan: Option<SamplePlan>,
    pub interruption_stats: Option<InterruptionStats>,
    pub verdict: Option<QualityVerdict>,
}

pub async fn dashboard_get(State(state): State<Arc<AppState>>) -> Json<DashboardStatus> {
    let dashboard = state.dashboard.read().await;
    let snapshot = dashboard.snapshot.as_ref();
    Json(DashboardStatus {
        request: dashboard.request.clone(),
        warning: dashboard.warning,
        fetch_progress: snapshot.map_or(0, |s| s.fetch_progress),
        classify_progress: snapshot.map_or(0, |s| s.classify_progress),
        total_raw: snapshot.map_or(0, |s| s.total_raw),
        anomaly_count: snapshot.map_or(0, |s| s.anomaly_count),
        latest: snapshot.and_then(|s| s.latest.clone()),
        plan: snapshot.map(|s| s.plan),
        interruption_stats: snapshot.map(|s| s.interruption_stats.clone()),
        verdict: snapshot.map(|s| s.verdict.clone()),
    })
}

#[derive(Deserialize)]
pub struct ReadingsParams {
    #[serde(default)]
    pub display: bool,
}

/// The sampled series behind the current snapshot. `display=true` thins
/// it further for charting.
pub async fn dashboard_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let dashboard = state.dashboard.read().await;
    let Some(snapshot) = dashboard.snapshot.as_ref() else {
        return Err(no_dataset());
    };
    let readings = if params.display {
        decimate_for_display(&snapshot.readings)
    } else {
        snapshot.readings.clone()
    };
    Ok(Json(readings))
}

#[derive(Serialize)]
pub struct InterruptionsResponse {
    pub interruptions: Vec<Interruption>,
    pub stats: InterruptionStats,
}

pub async fn dashboard_interruptions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InterruptionsResponse>, ApiError> {
    let dashboard = state.dashboard.read().await;
    let Some(snapshot) = dashboard.snapshot.as_ref() else {
        return Err(no_dataset());
    };
    Ok(Json(InterruptionsResponse {
        interruptions: snapshot.interruptions.clone(),
        stats: snapshot.interruption_stats.clone(),
    }))
}

#[derive(Deserialize)]
pub struct QualityParams {
    pub method: Option<String>,
}

/// The verdict for the current dataset. The grading method is fixed per
/// process; a `method` parameter naming a different one is rejected
/// rather than silently answered with the wrong grading.
pub async fn dashboard_quality(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QualityParams>,
) -> Result<Json<QualityVerdict>, ApiError> {
    let dashboard = state.dashboard.read().await;
    let Some(snapshot) = dashboard.snapshot.as_ref() else {
        return Err(no_dataset());
    };

    if let Some(name) = &params.method {
        let requested: QualityMethod = name.parse().map_err(bad_request)?;
        if requested != snapshot.verdict.method {
            return Err(bad_request(format!(
                "quality method is {} for the loaded dataset",
                snapshot.verdict.method.as_str()
            )));
        }
    }

    Ok(Json(snapshot.verdict.clone()))
}

// ── Cache ─────────────────────────────────────────────────────────

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

#[derive(Deserialize)]
pub struct CacheClearParams {
    pub node: String,
}

#[derive(Serialize)]
pub struct CacheClearResponse {
    pub node: String,
    pub removed: usize,
}

pub async fn cache_clear(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CacheClearParams>,
) -> Json<CacheClearResponse> {
    let removed = state.cache.clear_node(&params.node);
    Json(CacheClearResponse {
        node: params.node,
        removed,
    })
}
