//! Threshold evaluation.
//!
//! Pure checks of individual readings against a configured threshold set.
//! The heavier aggregate analysis (quality verdicts, interruption scans)
//! lives in the sibling modules.

use gridscope_core::{Parameter, Reading, ThresholdSet};

/// Outcome of checking one reading against a threshold set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub is_anomaly: bool,
    pub parameters: Vec<Parameter>,
}

/// Check a reading against a threshold set.
///
/// Parameters are checked in declaration order and flagged when the value
/// falls outside its configured range. NaN never satisfies a range check,
/// so NaN values are flagged rather than silently passing. Absent fields
/// and parameters without a configured range are skipped. Deterministic,
/// no error cases.
pub fn evaluate(reading: &Reading, thresholds: &ThresholdSet) -> Evaluation {
    let mut parameters = Vec::new();

    for parameter in Parameter::ALL {
        let Some(range) = thresholds.get(parameter) else {
            continue;
        };
        let Some(value) = reading.value(parameter) else {
            continue;
        };
        if !range.contains(value) {
            parameters.push(parameter);
        }
    }

    Evaluation {
        is_anomaly: !parameters.is_empty(),
        parameters,
    }
}

/// Run `evaluate` across a batch in place, replacing any previous flags.
/// Returns the number of anomalous readings.
pub fn annotate(readings: &mut [Reading], thresholds: &ThresholdSet) -> usize {
    let mut anomalies = 0;

    for reading in readings.iter_mut() {
        let evaluation = evaluate(reading, thresholds);
        if evaluation.is_anomaly {
            anomalies += 1;
        }
        reading.set_anomaly_parameters(evaluation.parameters);
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_reading(voltage: Option<f64>, frequency: Option<f64>) -> Reading {
        Reading {
            id: "r-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap(),
            node: "node-a".to_string(),
            voltage,
            current: Some(10.0),
            power: Some(2300.0),
            frequency,
            power_factor: Some(0.95),
            is_anomaly: false,
            anomaly_parameters: Vec::new(),
        }
    }

    #[test]
    fn flags_voltage_just_above_max() {
        let thresholds = ThresholdSet::strict();
        let max = thresholds.get(Parameter::Voltage).unwrap().max;
        let reading = make_reading(Some(max + 0.01), Some(60.0));

        let evaluation = evaluate(&reading, &thresholds);
        assert!(evaluation.is_anomaly);
        assert_eq!(evaluation.parameters, vec![Parameter::Voltage]);
    }

    #[test]
    fn in_range_reading_is_clean() {
        let reading = make_reading(Some(230.0), Some(60.0));
        let evaluation = evaluate(&reading, &ThresholdSet::strict());
        assert!(!evaluation.is_anomaly);
        assert!(evaluation.parameters.is_empty());
    }

    #[test]
    fn nan_is_flagged() {
        let reading = make_reading(Some(f64::NAN), Some(60.0));
        let evaluation = evaluate(&reading, &ThresholdSet::strict());
        assert_eq!(evaluation.parameters, vec![Parameter::Voltage]);
    }

    #[test]
    fn missing_field_is_skipped() {
        let reading = make_reading(None, Some(60.0));
        let evaluation = evaluate(&reading, &ThresholdSet::strict());
        assert!(!evaluation.is_anomaly);
    }

    #[test]
    fn unconfigured_parameter_is_skipped() {
        let thresholds = ThresholdSet::empty().with(Parameter::Frequency, 59.5, 60.5);
        let reading = make_reading(Some(500.0), Some(60.0));
        let evaluation = evaluate(&reading, &thresholds);
        assert!(!evaluation.is_anomaly);
    }

    #[test]
    fn flagged_parameters_keep_declaration_order() {
        let mut reading = make_reading(Some(0.0), Some(0.0));
        reading.power_factor = Some(0.1);
        let evaluation = evaluate(&reading, &ThresholdSet::strict());
        assert_eq!(
            evaluation.parameters,
            vec![Parameter::Voltage, Parameter::Frequency, Parameter::PowerFactor]
        );
    }

    #[test]
    fn annotate_is_idempotent_and_clears_stale_flags() {
        let thresholds = ThresholdSet::strict();
        let mut readings = vec![make_reading(Some(300.0), Some(60.0))];
        readings[0].set_anomaly_parameters(vec![Parameter::Frequency]);

        let first = annotate(&mut readings, &thresholds);
        assert_eq!(first, 1);
        assert_eq!(readings[0].anomaly_parameters, vec![Parameter::Voltage]);

        let second = annotate(&mut readings, &thresholds);
        assert_eq!(second, 1);
        assert_eq!(readings[0].anomaly_parameters, vec![Parameter::Voltage]);

        readings[0].voltage = Some(230.0);
        let third = annotate(&mut readings, &thresholds);
        assert_eq!(third, 0);
        assert!(!readings[0].is_anomaly);
        assert!(readings[0].anomaly_parameters.is_empty());
    }
}
