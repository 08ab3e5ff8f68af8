//! Two-phase load pipeline.
//!
//! Phase one fetches day batches (cache first), flags them locally against
//! the configured thresholds, and streams interim snapshots so consumers
//! can render while the fetch runs. Phase two re-classifies the full set
//! in fixed-size chunks through the injected classifier and merges results
//! back by reading id. A generation counter cancels both phases when a
//! newer load starts or [`Orchestrator::cancel`] is called.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gridscope_compute::{
    annotate, classify, detect_interruptions, interruption_stats, plan_for_range, sample,
    Interruption, InterruptionStats, QualityMethod, QualityVerdict, SamplePlan,
    DEFAULT_MIN_DURATION_SECS, DEFAULT_VOLTAGE_THRESHOLD,
};
use gridscope_core::config::PipelineConfig;
use gridscope_core::{QualityThresholds, Reading, ThresholdSet};

use crate::cache::{DayKey, ReadingCache};
use crate::classifier::AnomalyClassifier;
use crate::merge::{merge_flags, patch_from};
use crate::source::{ReadingSource, SourceError};

/// One node over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub node: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Full pipeline state at one point in time. Every emission carries the
/// complete picture, so consumers can always replace what they hold:
/// `readings` is the sampled series, while the counts, interruptions, and
/// verdict are computed over the raw set behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub node: String,
    pub readings: Vec<Reading>,
    pub latest: Option<Reading>,
    pub total_raw: usize,
    pub anomaly_count: usize,
    pub fetch_progress: u8,
    pub classify_progress: u8,
    pub plan: SamplePlan,
    pub interruptions: Vec<Interruption>,
    pub interruption_stats: InterruptionStats,
    pub verdict: QualityVerdict,
}

/// A snapshot tagged with the generation of the load that produced it.
///
/// Consumers compare the tag against [`Orchestrator::current_generation`]
/// and drop emissions from superseded loads. The staleness checks inside
/// the pipeline stop work early but are not atomic with the send, so the
/// tag is what actually keeps a slow background chunk from overwriting a
/// newer load's state.
#[derive(Debug, Clone)]
pub struct Emission {
    pub generation: u64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("a load is already in progress")]
    LoadInProgress,
    #[error("load superseded by a newer request")]
    Cancelled,
}

/// Tuning knobs for the two phases.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub fetch_batch_days: usize,
    pub classify_chunk_size: usize,
    pub classify_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_batch_days: 3,
            classify_chunk_size: 20_000,
            classify_delay: Duration::from_millis(500),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            fetch_batch_days: config.fetch_batch_days,
            classify_chunk_size: config.classify_chunk_size,
            classify_delay: Duration::from_millis(config.classify_delay_ms),
        }
    }
}

/// Drives loads end to end: fetch, local flagging, background
/// re-classification. One orchestrator serves one dashboard; concurrent
/// fetch phases are rejected and a newer load cancels the older one's
/// background work.
pub struct Orchestrator {
    source: Arc<dyn ReadingSource>,
    classifier: Arc<dyn AnomalyClassifier>,
    cache: Arc<dyn ReadingCache>,
    thresholds: ThresholdSet,
    quality: QualityThresholds,
    quality_method: QualityMethod,
    settings: PipelineSettings,
    generation: AtomicU64,
    fetching: AtomicBool,
}

/// Clears the fetch flag even when the fetch phase errors out.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ReadingSource>,
        classifier: Arc<dyn AnomalyClassifier>,
        cache: Arc<dyn ReadingCache>,
        thresholds: ThresholdSet,
        quality: QualityThresholds,
        quality_method: QualityMethod,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            classifier,
            cache,
            thresholds,
            quality,
            quality_method,
            settings,
            generation: AtomicU64::new(0),
            fetching: AtomicBool::new(false),
        }
    }

    /// Run the fetch phase for a request, spawning the classification
    /// phase before returning.
    ///
    /// Interim snapshots stream through `updates` after every day batch;
    /// the returned snapshot has the complete raw set with local flags.
    /// Background chunk results keep arriving on `updates` until
    /// `classify_progress` reaches 100. Every emission is tagged with this
    /// load's generation; consumers drop tags older than
    /// [`current_generation`](Self::current_generation). Days that fail to
    /// fetch are logged and skipped; an empty result is not an error.
    pub async fn load(
        self: Arc<Self>,
        request: LoadRequest,
        updates: mpsc::UnboundedSender<Emission>,
    ) -> Result<Snapshot, PipelineError> {
        if self
            .fetching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::LoadInProgress);
        }
        let _guard = FetchGuard(&self.fetching);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = plan_for_range(request.start, request.end);
        let days = enumerate_days(request.start, request.end);

        info!(
            node = %request.node,
            start = %request.start,
            end = %request.end,
            days = days.len(),
            rate = plan.rate,
            resolution = plan.resolution.as_str(),
            "starting load"
        );

        let mut raw: Vec<Reading> = Vec::new();
        let mut fetched_days = 0usize;

        for batch in days.chunks(self.settings.fetch_batch_days.max(1)) {
            if self.is_stale(generation) {
                return Err(PipelineError::Cancelled);
            }

            let fetches = batch
                .iter()
                .map(|date| self.fetch_day_cached(&request.node, *date));
            for (date, result) in batch.iter().zip(join_all(fetches).await) {
                fetched_days += 1;
                match result {
                    Ok(mut readings) => {
                        annotate(&mut readings, &self.thresholds);
                        raw.extend(readings);
                    }
                    Err(error) => {
                        warn!(
                            node = %request.node,
                            date = %date,
                            error = %error,
                            "day fetch failed, skipping"
                        );
                    }
                }
            }

            if fetched_days < days.len() {
                let interim = self.snapshot(
                    &request,
                    &raw,
                    plan,
                    progress_pct(fetched_days, days.len()),
                    0,
                );
                let _ = updates.send(Emission {
                    generation,
                    snapshot: interim,
                });
            }
        }

        if self.is_stale(generation) {
            return Err(PipelineError::Cancelled);
        }

        let classify_progress = if raw.is_empty() { 100 } else { 0 };
        let snapshot = self.snapshot(&request, &raw, plan, 100, classify_progress);
        let _ = updates.send(Emission {
            generation,
            snapshot: snapshot.clone(),
        });

        info!(
            node = %request.node,
            readings = raw.len(),
            sampled = snapshot.readings.len(),
            anomalies = snapshot.anomaly_count,
            "fetch phase complete"
        );

        if !raw.is_empty() {
            tokio::spawn(self.clone().classify_in_background(
                request,
                raw,
                plan,
                generation,
                updates,
            ));
        }

        Ok(snapshot)
    }

    /// Invalidate in-flight work. The current fetch phase stops at its
    /// next batch boundary and any background classification stops before
    /// its next merge; emissions already built or queued keep their old
    /// generation tag and are dropped by consumers.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// The generation of the newest load. Emissions tagged with anything
    /// older come from a superseded load.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn fetch_day_cached(
        &self,
        node: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reading>, SourceError> {
        let key = DayKey::new(node, date);
        if let Some(readings) = self.cache.get(&key) {
            debug!(key = %key, count = readings.len(), "cache hit");
            return Ok(readings);
        }

        let readings = self.source.fetch_day(node, date).await?;
        self.cache.put(key, readings.clone());
        Ok(readings)
    }

    async fn classify_in_background(
        self: Arc<Self>,
        request: LoadRequest,
        mut raw: Vec<Reading>,
        plan: SamplePlan,
        generation: u64,
        updates: mpsc::UnboundedSender<Emission>,
    ) {
        tokio::time::sleep(self.settings.classify_delay).await;
        if self.is_stale(generation) {
            return;
        }

        let chunk_size = self.settings.classify_chunk_size.max(1);
        let chunk_count = raw.len().div_ceil(chunk_size);
        info!(
            node = %request.node,
            readings = raw.len(),
            chunks = chunk_count,
            "starting background classification"
        );

        let mut failed_chunks = 0usize;
        for index in 0..chunk_count {
            if self.is_stale(generation) {
                return;
            }

            let start = index * chunk_size;
            let end = (start + chunk_size).min(raw.len());
            match self
                .classifier
                .classify(&raw[start..end], &self.thresholds)
                .await
            {
                Ok(batch) => {
                    let updated = merge_flags(&mut raw, &patch_from(&batch));
                    debug!(chunk = index, updated, "chunk merged");
                }
                Err(error) => {
                    failed_chunks += 1;
                    warn!(
                        chunk = index,
                        error = %error,
                        "chunk classification failed, keeping previous flags"
                    );
                }
            }

            if self.is_stale(generation) {
                return;
            }
            let snapshot =
                self.snapshot(&request, &raw, plan, 100, progress_pct(index + 1, chunk_count));
            let _ = updates.send(Emission {
                generation,
                snapshot,
            });
        }

        info!(
            node = %request.node,
            anomalies = raw.iter().filter(|r| r.is_anomaly).count(),
            failed_chunks,
            "background classification complete"
        );
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn snapshot(
        &self,
        request: &LoadRequest,
        raw: &[Reading],
        plan: SamplePlan,
        fetch_progress: u8,
        classify_progress: u8,
    ) -> Snapshot {
        let interruptions =
            detect_interruptions(raw, DEFAULT_VOLTAGE_THRESHOLD, DEFAULT_MIN_DURATION_SECS);

        Snapshot {
            node: request.node.clone(),
            latest: raw.iter().max_by_key(|r| r.timestamp).cloned(),
            total_raw: raw.len(),
            anomaly_count: raw.iter().filter(|r| r.is_anomaly).count(),
            fetch_progress,
            classify_progress,
            plan,
            interruption_stats: interruption_stats(&interruptions),
            interruptions,
            verdict: classify(raw, &self.quality, self.quality_method),
            readings: sample(raw.to_vec(), plan.rate),
        }
    }
}

fn enumerate_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

fn progress_pct(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_enumerate_inclusively_across_month_ends() {
        let days = enumerate_days(date(2024, 2, 28), date(2024, 3, 2));
        assert_eq!(
            days,
            vec![
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1),
                date(2024, 3, 2),
            ]
        );
    }

    #[test]
    fn reversed_range_has_no_days() {
        assert!(enumerate_days(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }

    #[test]
    fn progress_rounds_and_saturates() {
        assert_eq!(progress_pct(0, 3), 0);
        assert_eq!(progress_pct(1, 3), 33);
        assert_eq!(progress_pct(2, 3), 67);
        assert_eq!(progress_pct(3, 3), 100);
        assert_eq!(progress_pct(0, 0), 100);
    }

    #[test]
    fn fetch_guard_resets_on_drop() {
        let flag = AtomicBool::new(true);
        {
            let _guard = FetchGuard(&flag);
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
