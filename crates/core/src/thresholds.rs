use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GridscopeError;
use crate::reading::Parameter;

/// Closed acceptable range for one parameter. Containment is inclusive;
/// NaN is never contained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Acceptable ranges per parameter. Parameters without an entry are not
/// checked at all, so a partial set evaluates only the channels it names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdSet {
    ranges: BTreeMap<Parameter, Range>,
}

impl ThresholdSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: Parameter, min: f64, max: f64) -> Self {
        self.ranges.insert(parameter, Range::new(min, max));
        self
    }

    pub fn get(&self, parameter: Parameter) -> Option<Range> {
        self.ranges.get(&parameter).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, Range)> + '_ {
        self.ranges.iter().map(|(p, r)| (*p, *r))
    }

    /// Nameplate tolerances of the monitoring hardware.
    pub fn strict() -> Self {
        Self::empty()
            .with(Parameter::Voltage, 218.51, 241.49)
            .with(Parameter::Current, 0.0, 50.0)
            .with(Parameter::Power, 0.0, 10_000.0)
            .with(Parameter::Frequency, 59.5, 60.5)
            .with(Parameter::PowerFactor, 0.8, 1.0)
    }

    /// Widened bands the dashboard uses for day-to-day processing.
    pub fn relaxed() -> Self {
        Self::empty()
            .with(Parameter::Voltage, 217.4, 242.6)
            .with(Parameter::Current, 0.0, 50.0)
            .with(Parameter::Power, 0.0, 10_000.0)
            .with(Parameter::Frequency, 59.2, 60.8)
            .with(Parameter::PowerFactor, 0.792, 1.0)
    }

    pub fn from_name(name: &str) -> Result<Self, GridscopeError> {
        match name {
            "strict" => Ok(Self::strict()),
            "relaxed" => Ok(Self::relaxed()),
            other => Err(GridscopeError::UnknownName {
                kind: "threshold preset",
                value: other.to_string(),
            }),
        }
    }
}

/// Acceptable band plus the tighter ideal band quality grading uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBand {
    pub min: f64,
    pub max: f64,
    pub ideal: Range,
}

impl QualityBand {
    pub const fn new(min: f64, max: f64, ideal_min: f64, ideal_max: f64) -> Self {
        Self {
            min,
            max,
            ideal: Range::new(ideal_min, ideal_max),
        }
    }
}

/// Power factor grades against floors rather than a closed band: anything
/// at or above the floor is acceptable, anything at or above `ideal` is
/// ideal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerFactorFloor {
    pub min: f64,
    pub ideal: f64,
}

/// Inputs to the quality classifier. Callers own the relationship between
/// the acceptable and ideal bands; nothing here validates that one
/// contains the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub voltage: QualityBand,
    pub frequency: QualityBand,
    pub power_factor: PowerFactorFloor,
}

impl QualityThresholds {
    pub fn strict() -> Self {
        Self {
            voltage: QualityBand::new(218.51, 241.49, 220.0, 240.0),
            frequency: QualityBand::new(59.5, 60.5, 59.8, 60.2),
            power_factor: PowerFactorFloor {
                min: 0.8,
                ideal: 0.95,
            },
        }
    }

    /// The band set the dashboard ships with. The 0.1 power-factor ideal
    /// floor is carried over from that configuration unchanged.
    pub fn relaxed() -> Self {
        Self {
            voltage: QualityBand::new(217.4, 242.6, 220.0, 240.0),
            frequency: QualityBand::new(59.2, 60.8, 59.8, 60.2),
            power_factor: PowerFactorFloor {
                min: 0.792,
                ideal: 0.1,
            },
        }
    }

    pub fn from_name(name: &str) -> Result<Self, GridscopeError> {
        match name {
            "strict" => Ok(Self::strict()),
            "relaxed" => Ok(Self::relaxed()),
            other => Err(GridscopeError::UnknownName {
                kind: "quality preset",
                value: other.to_string(),
            }),
        }
    }
}
