use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The telemetry channels a reading can carry. Declaration order is the
/// order checks run in and the order flagged parameters are reported in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Voltage,
    Current,
    Power,
    Frequency,
    PowerFactor,
}

impl Parameter {
    pub const ALL: [Parameter; 5] = [
        Parameter::Voltage,
        Parameter::Current,
        Parameter::Power,
        Parameter::Frequency,
        Parameter::PowerFactor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Voltage => "voltage",
            Parameter::Current => "current",
            Parameter::Power => "power",
            Parameter::Frequency => "frequency",
            Parameter::PowerFactor => "power_factor",
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single telemetry reading from a monitoring node.
///
/// Channel fields are optional: exports from older firmware omit channels
/// they never measured, and every consumer skips absent fields rather than
/// erroring. `id` is stable across recomputation and is the merge key for
/// background classification results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub frequency: Option<f64>,
    pub power_factor: Option<f64>,
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(default)]
    pub anomaly_parameters: Vec<Parameter>,
}

impl Reading {
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Voltage => self.voltage,
            Parameter::Current => self.current,
            Parameter::Power => self.power,
            Parameter::Frequency => self.frequency,
            Parameter::PowerFactor => self.power_factor,
        }
    }

    /// Replace the anomaly flags. `is_anomaly` is kept equal to
    /// "the parameter list is non-empty"; this is the only mutation path
    /// so the two fields cannot drift apart.
    pub fn set_anomaly_parameters(&mut self, parameters: Vec<Parameter>) {
        self.is_anomaly = !parameters.is_empty();
        self.anomaly_parameters = parameters;
    }
}
