//! Power-quality classification.
//!
//! A verdict is a pure aggregation over the full reading set, never a
//! judgement of the latest reading alone: per-parameter out-of-range and
//! out-of-ideal percentages plus the anomaly rate, folded into a level
//! by one of three methods.

use serde::{Deserialize, Serialize};

use gridscope_core::{GridscopeError, QualityThresholds, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMethod {
    Anomaly,
    Voltage,
    #[default]
    Combined,
}

impl QualityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityMethod::Anomaly => "anomaly",
            QualityMethod::Voltage => "voltage",
            QualityMethod::Combined => "combined",
        }
    }
}

impl std::str::FromStr for QualityMethod {
    type Err = GridscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anomaly" => Ok(QualityMethod::Anomaly),
            "voltage" => Ok(QualityMethod::Voltage),
            "combined" => Ok(QualityMethod::Combined),
            other => Err(GridscopeError::UnknownName {
                kind: "quality method",
                value: other.to_string(),
            }),
        }
    }
}

/// Percentages for one graded parameter. Denominator is the number of
/// readings that actually carry the parameter; a parameter nobody reports
/// grades as 0%.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterQuality {
    pub out_of_range_pct: f64,
    pub out_of_ideal_pct: f64,
}

/// The aggregates a verdict was derived from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityStats {
    pub reading_count: usize,
    pub anomaly_count: usize,
    pub anomaly_pct: f64,
    pub voltage: ParameterQuality,
    pub frequency: ParameterQuality,
    pub power_factor: ParameterQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub level: QualityLevel,
    pub method: QualityMethod,
    pub reason: String,
    pub stats: QualityStats,
}

/// Grade a reading set.
///
/// An empty set grades good with a "no readings" reason; absence of data
/// is an empty-result state here, not an error.
pub fn classify(
    readings: &[Reading],
    thresholds: &QualityThresholds,
    method: QualityMethod,
) -> QualityVerdict {
    let stats = aggregate(readings, thresholds);

    if readings.is_empty() {
        return QualityVerdict {
            level: QualityLevel::Good,
            method,
            reason: "No readings available".to_string(),
            stats,
        };
    }

    let (level, reason) = match method {
        QualityMethod::Anomaly => by_anomaly_rate(&stats),
        QualityMethod::Voltage => by_voltage(&stats),
        QualityMethod::Combined => by_combination(&stats),
    };

    QualityVerdict {
        level,
        method,
        reason,
        stats,
    }
}

fn by_anomaly_rate(stats: &QualityStats) -> (QualityLevel, String) {
    let pct = stats.anomaly_pct;
    if pct > 50.0 {
        (
            QualityLevel::Poor,
            format!("{pct:.1}% of readings are anomalous"),
        )
    } else if pct > 10.0 {
        (
            QualityLevel::Fair,
            format!("{pct:.1}% of readings are anomalous"),
        )
    } else {
        (
            QualityLevel::Good,
            format!("Anomaly rate {pct:.1}% is within tolerance"),
        )
    }
}

fn by_voltage(stats: &QualityStats) -> (QualityLevel, String) {
    if stats.voltage.out_of_range_pct > 10.0 {
        (
            QualityLevel::Poor,
            format!(
                "Voltage out of range for {:.1}% of readings",
                stats.voltage.out_of_range_pct
            ),
        )
    } else if stats.voltage.out_of_ideal_pct > 25.0 {
        (
            QualityLevel::Fair,
            format!(
                "Voltage outside the ideal band for {:.1}% of readings",
                stats.voltage.out_of_ideal_pct
            ),
        )
    } else {
        (
            QualityLevel::Excellent,
            "Voltage within acceptable range".to_string(),
        )
    }
}

fn by_combination(stats: &QualityStats) -> (QualityLevel, String) {
    let graded = [
        ("Voltage", &stats.voltage),
        ("Frequency", &stats.frequency),
        ("Power factor", &stats.power_factor),
    ];

    let mut reasons: Vec<String> = graded
        .iter()
        .filter(|(_, q)| q.out_of_range_pct > 10.0)
        .map(|(name, q)| format!("{name} out of range for {:.1}% of readings", q.out_of_range_pct))
        .collect();
    if stats.anomaly_pct > 25.0 {
        reasons.push(format!("{:.1}% of readings are anomalous", stats.anomaly_pct));
    }
    if !reasons.is_empty() {
        return (QualityLevel::Poor, reasons.join("; "));
    }

    let mut reasons: Vec<String> = graded
        .iter()
        .filter(|(_, q)| q.out_of_range_pct > 5.0)
        .map(|(name, q)| format!("{name} out of range for {:.1}% of readings", q.out_of_range_pct))
        .collect();
    if stats.anomaly_pct > 10.0 {
        reasons.push(format!("{:.1}% of readings are anomalous", stats.anomaly_pct));
    }
    if !reasons.is_empty() {
        return (QualityLevel::Fair, reasons.join("; "));
    }

    let near_ideal = graded.iter().all(|(_, q)| q.out_of_ideal_pct < 15.0);
    if near_ideal && stats.anomaly_pct < 5.0 {
        return (
            QualityLevel::Excellent,
            "All parameters near ideal with a low anomaly rate".to_string(),
        );
    }

    (
        QualityLevel::Good,
        "Parameters within acceptable limits".to_string(),
    )
}

fn aggregate(readings: &[Reading], thresholds: &QualityThresholds) -> QualityStats {
    let mut anomalies = 0usize;
    let mut voltage = Counter::default();
    let mut frequency = Counter::default();
    let mut power_factor = Counter::default();

    for reading in readings {
        if reading.is_anomaly {
            anomalies += 1;
        }
        if let Some(v) = reading.voltage {
            voltage.record(
                !(v >= thresholds.voltage.min && v <= thresholds.voltage.max),
                !thresholds.voltage.ideal.contains(v),
            );
        }
        if let Some(f) = reading.frequency {
            frequency.record(
                !(f >= thresholds.frequency.min && f <= thresholds.frequency.max),
                !thresholds.frequency.ideal.contains(f),
            );
        }
        if let Some(pf) = reading.power_factor {
            power_factor.record(
                pf.is_nan() || pf < thresholds.power_factor.min,
                pf.is_nan() || pf < thresholds.power_factor.ideal,
            );
        }
    }

    QualityStats {
        reading_count: readings.len(),
        anomaly_count: anomalies,
        anomaly_pct: pct(anomalies, readings.len()),
        voltage: voltage.quality(),
        frequency: frequency.quality(),
        power_factor: power_factor.quality(),
    }
}

#[derive(Default)]
struct Counter {
    present: usize,
    out_of_range: usize,
    out_of_ideal: usize,
}

impl Counter {
    fn record(&mut self, out_of_range: bool, out_of_ideal: bool) {
        self.present += 1;
        if out_of_range {
            self.out_of_range += 1;
        }
        if out_of_ideal {
            self.out_of_ideal += 1;
        }
    }

    fn quality(&self) -> ParameterQuality {
        ParameterQuality {
            out_of_range_pct: pct(self.out_of_range, self.present),
            out_of_ideal_pct: pct(self.out_of_ideal, self.present),
        }
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
