//! Interruption detection.
//!
//! An interruption is a sustained voltage sag: consecutive readings below
//! the voltage threshold lasting at least the minimum duration. The scan
//! is a single pass over the chronologically sorted series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridscope_core::Reading;

/// Voltage below this counts as interrupted supply.
pub const DEFAULT_VOLTAGE_THRESHOLD: f64 = 180.0;

/// Sags shorter than this are ignored.
pub const DEFAULT_MIN_DURATION_SECS: f64 = 30.0;

/// One detected supply interruption. `ongoing` marks an interruption that
/// was still open when the data ended; its `end` is the last observed
/// timestamp, not a recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interruption {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: f64,
    pub ongoing: bool,
}

/// Aggregates over a set of detected interruptions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterruptionStats {
    pub count: usize,
    /// Mean duration in minutes, one decimal. 0 when there are none.
    pub avg_duration_min: f64,
    /// Summed duration in minutes, one decimal.
    pub total_downtime_min: f64,
    pub longest: Option<Interruption>,
    /// Latest by end timestamp.
    pub most_recent: Option<Interruption>,
}

/// Scan a series for sustained voltage sags.
///
/// Readings are sorted by timestamp first, so callers can pass data in any
/// order. A sag opens at the first reading below `voltage_threshold` and
/// closes at the first reading back at or above it; the closing reading's
/// timestamp is the interruption end. A sag still open after the last
/// reading is emitted with `ongoing = true` and the last timestamp as its
/// end. Both cases apply the `min_duration_secs` filter. Readings without
/// a voltage (or with NaN) never open a sag. Zero or one readings can
/// never produce an interruption.
pub fn detect_interruptions(
    readings: &[Reading],
    voltage_threshold: f64,
    min_duration_secs: f64,
) -> Vec<Interruption> {
    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by_key(|reading| reading.timestamp);

    let mut interruptions = Vec::new();
    let mut sag_start: Option<DateTime<Utc>> = None;

    for reading in &sorted {
        let below = reading
            .voltage
            .is_some_and(|voltage| voltage < voltage_threshold);

        match (below, sag_start) {
            (true, None) => sag_start = Some(reading.timestamp),
            (false, Some(start)) => {
                sag_start = None;
                let duration = secs_between(start, reading.timestamp);
                if duration >= min_duration_secs {
                    interruptions.push(Interruption {
                        start,
                        end: reading.timestamp,
                        duration_secs: duration,
                        ongoing: false,
                    });
                }
            }
            _ => {}
        }
    }

    if let (Some(start), Some(last)) = (sag_start, sorted.last()) {
        let duration = secs_between(start, last.timestamp);
        if duration >= min_duration_secs {
            interruptions.push(Interruption {
                start,
                end: last.timestamp,
                duration_secs: duration,
                ongoing: true,
            });
        }
    }

    interruptions
}

/// Aggregate stats for the dashboard's metric cards.
pub fn interruption_stats(interruptions: &[Interruption]) -> InterruptionStats {
    if interruptions.is_empty() {
        return InterruptionStats::default();
    }

    let count = interruptions.len();
    let total_secs: f64 = interruptions.iter().map(|i| i.duration_secs).sum();

    let longest = interruptions
        .iter()
        .reduce(|max, current| {
            if current.duration_secs > max.duration_secs {
                current
            } else {
                max
            }
        })
        .cloned();

    let most_recent = interruptions
        .iter()
        .reduce(|latest, current| if current.end > latest.end { current } else { latest })
        .cloned();

    InterruptionStats {
        count,
        avg_duration_min: round1(total_secs / count as f64 / 60.0),
        total_downtime_min: round1(total_secs / 60.0),
        longest,
        most_recent,
    }
}

fn secs_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading_at(offset_secs: i64, voltage: Option<f64>) -> Reading {
        let base = Utc.with_ymd_and_hms(2024, 3, 7, 6, 0, 0).unwrap();
        Reading {
            id: format!("r-{offset_secs}"),
            timestamp: base + Duration::seconds(offset_secs),
            node: "node-a".to_string(),
            voltage,
            current: None,
            power: None,
            frequency: None,
            power_factor: None,
            is_anomaly: false,
            anomaly_parameters: Vec::new(),
        }
    }

    #[test]
    fn empty_and_single_reading_yield_nothing() {
        assert!(detect_interruptions(&[], 180.0, 30.0).is_empty());
        let one = vec![reading_at(0, Some(150.0))];
        assert!(detect_interruptions(&one, 180.0, 30.0).is_empty());
    }

    #[test]
    fn forty_second_sag_is_one_interruption() {
        let readings = vec![
            reading_at(0, Some(230.0)),
            reading_at(10, Some(190.0)),
            reading_at(20, Some(190.0)),
            reading_at(30, Some(190.0)),
            reading_at(40, Some(190.0)),
            reading_at(50, Some(230.0)),
        ];

        let found = detect_interruptions(&readings, 200.0, 30.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].duration_secs, 40.0);
        assert!(!found[0].ongoing);
    }

    #[test]
    fn short_sag_is_filtered() {
        let readings = vec![
            reading_at(0, Some(230.0)),
            reading_at(10, Some(150.0)),
            reading_at(20, Some(150.0)),
            reading_at(30, Some(230.0)),
        ];
        assert!(detect_interruptions(&readings, 180.0, 30.0).is_empty());
    }

    #[test]
    fn trailing_sag_is_ongoing() {
        let readings = vec![
            reading_at(0, Some(230.0)),
            reading_at(10, Some(150.0)),
            reading_at(50, Some(150.0)),
        ];

        let found = detect_interruptions(&readings, 180.0, 30.0);
        assert_eq!(found.len(), 1);
        assert!(found[0].ongoing);
        assert_eq!(found[0].duration_secs, 40.0);
        assert_eq!(found[0].end, readings[2].timestamp);
    }

    #[test]
    fn unsorted_input_is_handled() {
        let readings = vec![
            reading_at(50, Some(230.0)),
            reading_at(10, Some(150.0)),
            reading_at(0, Some(230.0)),
            reading_at(20, Some(150.0)),
        ];

        let found = detect_interruptions(&readings, 180.0, 30.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].duration_secs, 40.0);
    }

    #[test]
    fn missing_voltage_never_opens_a_sag() {
        let readings = vec![
            reading_at(0, None),
            reading_at(40, None),
            reading_at(80, Some(230.0)),
        ];
        assert!(detect_interruptions(&readings, 180.0, 30.0).is_empty());
    }

    #[test]
    fn stats_aggregate_and_round() {
        let readings = vec![
            reading_at(0, Some(230.0)),
            reading_at(10, Some(150.0)),
            reading_at(70, Some(230.0)),
            reading_at(100, Some(150.0)),
            reading_at(220, Some(230.0)),
        ];

        let found = detect_interruptions(&readings, 180.0, 30.0);
        assert_eq!(found.len(), 2);

        let stats = interruption_stats(&found);
        assert_eq!(stats.count, 2);
        // 60s + 120s: average 1.5 min, total 3.0 min.
        assert_eq!(stats.avg_duration_min, 1.5);
        assert_eq!(stats.total_downtime_min, 3.0);
        assert_eq!(stats.longest.as_ref().unwrap().duration_secs, 120.0);
        assert_eq!(stats.most_recent.as_ref().unwrap().end, readings[4].timestamp);
    }

    #[test]
    fn empty_stats_are_zeroed() {
        let stats = interruption_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.avg_duration_min, 0.0);
        assert!(stats.longest.is_none());
    }
}
