//! Adaptive sampling.
//!
//! Nodes capture roughly one reading per second, so a month of data for a
//! single node runs into the millions of rows. The sampling stage picks a
//! rate from the requested date range before anything is fetched, then
//! thins the fetched set while keeping every anomalous reading. A second,
//! purely positional pass thins chart payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use gridscope_core::Reading;

/// Nominal capture rate per node.
pub const READINGS_PER_DAY: u64 = 86_400;

/// Estimated-count tiers and the target sizes their rates aim for.
const DAY_TIER: u64 = 500_000;
const DAY_TARGET: u64 = 5_000;
const HOUR_TIER: u64 = 100_000;
const HOUR_TARGET: u64 = 10_000;
const MINUTE_TIER: u64 = 20_000;
const MINUTE_TARGET: u64 = 15_000;

/// Chart payload limits: very dense series thin to ~500 points, dense
/// ones to ~1000.
const DISPLAY_DENSE_LIMIT: usize = 10_000;
const DISPLAY_DENSE_TARGET: usize = 500;
const DISPLAY_LIMIT: usize = 1_000;
const DISPLAY_TARGET: usize = 1_000;

/// Effective time resolution of a sampled series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Raw,
    Minute,
    Hour,
    Day,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Raw => "raw",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
        }
    }
}

/// Sampling decision for one request: keep every `rate`-th non-anomalous
/// reading, labelled with the coarsest resolution the rate implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePlan {
    pub rate: usize,
    pub resolution: Resolution,
    pub estimated_count: u64,
}

impl SamplePlan {
    /// Plan for an unsampled series.
    pub fn raw() -> Self {
        Self {
            rate: 1,
            resolution: Resolution::Raw,
            estimated_count: 0,
        }
    }
}

/// Pick a sampling rate for a date range before any data is fetched.
/// The estimate assumes the nominal capture rate over the inclusive day
/// span; the actual fetched count never changes the plan.
pub fn plan_for_range(start: NaiveDate, end: NaiveDate) -> SamplePlan {
    let days = (end - start).num_days().max(0) as u64 + 1;
    let estimated = days * READINGS_PER_DAY;

    let (rate, resolution) = if estimated > DAY_TIER {
        (estimated.div_ceil(DAY_TARGET), Resolution::Day)
    } else if estimated > HOUR_TIER {
        (estimated.div_ceil(HOUR_TARGET), Resolution::Hour)
    } else if estimated > MINUTE_TIER {
        (estimated.div_ceil(MINUTE_TARGET), Resolution::Minute)
    } else {
        (1, Resolution::Raw)
    };

    SamplePlan {
        rate: rate as usize,
        resolution,
        estimated_count: estimated,
    }
}

/// Thin a dataset to roughly `1/rate` of its size.
///
/// Anomalous readings are always kept. Non-anomalous readings keep every
/// `rate`-th position of their original relative order. Output is sorted
/// by timestamp regardless of input order; a rate of 0 or 1 keeps the
/// full content and only normalizes the order.
pub fn sample(readings: Vec<Reading>, rate: usize) -> Vec<Reading> {
    let mut sampled = if rate <= 1 {
        readings
    } else {
        let (anomalies, normal): (Vec<Reading>, Vec<Reading>) =
            readings.into_iter().partition(|r| r.is_anomaly);

        let mut kept = anomalies;
        kept.extend(
            normal
                .into_iter()
                .enumerate()
                .filter(|(index, _)| index % rate == 0)
                .map(|(_, reading)| reading),
        );
        kept
    };

    sampled.sort_by_key(|reading| reading.timestamp);
    sampled
}

/// Positional thinning for chart payloads. Anomaly flags are not
/// consulted here; event preservation happens in [`sample`], and flagged
/// points can drop out of a decimated series.
pub fn decimate_for_display(readings: &[Reading]) -> Vec<Reading> {
    let rate = if readings.len() > DISPLAY_DENSE_LIMIT {
        readings.len().div_ceil(DISPLAY_DENSE_TARGET)
    } else if readings.len() > DISPLAY_LIMIT {
        readings.len().div_ceil(DISPLAY_TARGET)
    } else {
        return readings.to_vec();
    };

    readings
        .iter()
        .enumerate()
        .filter(|(index, _)| index % rate == 0)
        .map(|(_, reading)| reading.clone())
        .collect()
}

/// User-facing note for ranges wide enough to be sampled heavily.
pub fn range_warning(start: NaiveDate, end: NaiveDate) -> Option<&'static str> {
    let days = (end - start).num_days() + 1;
    if days > 30 {
        Some("Long date range detected. Data will be sampled for better performance.")
    } else if days > 7 {
        Some("Wide date range detected. Some data points may be sampled for performance.")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use gridscope_core::Parameter;

    fn series(count: usize, anomalous_every: usize) -> Vec<Reading> {
        let base = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let mut reading = Reading {
                    id: format!("r-{i}"),
                    timestamp: base + Duration::seconds(i as i64),
                    node: "node-a".to_string(),
                    voltage: Some(230.0),
                    current: Some(10.0),
                    power: Some(2300.0),
                    frequency: Some(60.0),
                    power_factor: Some(0.95),
                    is_anomaly: false,
                    anomaly_parameters: Vec::new(),
                };
                if anomalous_every > 0 && i % anomalous_every == 0 {
                    reading.set_anomaly_parameters(vec![Parameter::Voltage]);
                }
                reading
            })
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_day_range_samples_at_minute_tier() {
        let plan = plan_for_range(date(2024, 3, 7), date(2024, 3, 7));
        assert_eq!(plan.estimated_count, 86_400);
        assert_eq!(plan.resolution, Resolution::Minute);
        assert_eq!(plan.rate, 6);
    }

    #[test]
    fn week_range_lands_in_day_tier() {
        let plan = plan_for_range(date(2024, 3, 1), date(2024, 3, 7));
        assert_eq!(plan.estimated_count, 7 * 86_400);
        assert_eq!(plan.resolution, Resolution::Day);
        assert_eq!(plan.rate, 121);
    }

    #[test]
    fn two_day_range_lands_in_hour_tier() {
        let plan = plan_for_range(date(2024, 3, 7), date(2024, 3, 8));
        assert_eq!(plan.resolution, Resolution::Hour);
        assert_eq!(plan.rate, 18);
    }

    #[test]
    fn sample_never_drops_anomalies() {
        let readings = series(10_000, 97);
        let anomaly_ids: Vec<String> = readings
            .iter()
            .filter(|r| r.is_anomaly)
            .map(|r| r.id.clone())
            .collect();

        let sampled = sample(readings, 50);
        for id in &anomaly_ids {
            assert!(sampled.iter().any(|r| &r.id == id), "anomaly {id} dropped");
        }
        assert!(sampled.len() < 10_000 / 10);
    }

    #[test]
    fn rate_one_keeps_content_and_sorts() {
        let mut readings = series(100, 0);
        readings.reverse();
        let sampled = sample(readings, 1);
        assert_eq!(sampled.len(), 100);
        assert!(sampled.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn sampled_output_is_chronological() {
        let mut readings = series(5_000, 37);
        readings.reverse();
        let sampled = sample(readings, 10);
        assert!(sampled.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn display_decimation_tiers() {
        let small = series(900, 0);
        assert_eq!(decimate_for_display(&small).len(), 900);

        let dense = series(5_000, 0);
        let thinned = decimate_for_display(&dense);
        assert_eq!(thinned.len(), 1_000);

        let very_dense = series(20_000, 0);
        let thinned = decimate_for_display(&very_dense);
        assert_eq!(thinned.len(), 500);
    }

    #[test]
    fn range_warnings_by_span() {
        assert_eq!(range_warning(date(2024, 3, 1), date(2024, 3, 5)), None);
        assert!(range_warning(date(2024, 3, 1), date(2024, 3, 10))
            .unwrap()
            .starts_with("Wide"));
        assert!(range_warning(date(2024, 1, 1), date(2024, 2, 15))
            .unwrap()
            .starts_with("Long"));
    }
}
