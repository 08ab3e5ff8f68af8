use std::collections::HashMap;

use gridscope_compute::Evaluation;
use gridscope_core::Reading;

use crate::classifier::ClassifiedBatch;

/// Per-id anomaly results from one classified chunk.
pub type AnomalyPatch = HashMap<String, Evaluation>;

/// Extract the patch a classified batch carries.
pub fn patch_from(batch: &ClassifiedBatch) -> AnomalyPatch {
    batch
        .readings
        .iter()
        .map(|reading| {
            (
                reading.id.clone(),
                Evaluation {
                    is_anomaly: reading.is_anomaly,
                    parameters: reading.anomaly_parameters.clone(),
                },
            )
        })
        .collect()
}

/// Apply per-id anomaly results to a dataset.
///
/// Readings whose id is absent from the patch keep their last-known
/// flags; patch entries whose id matches nothing are ignored. Returns how
/// many readings actually changed. This is the only write path for
/// background classification results, and it is pure: replaying chunk
/// patches in order reproduces every state the background task went
/// through.
pub fn merge_flags(base: &mut [Reading], patch: &AnomalyPatch) -> usize {
    let mut updated = 0;

    for reading in base.iter_mut() {
        if let Some(evaluation) = patch.get(&reading.id) {
            if reading.is_anomaly != evaluation.is_anomaly
                || reading.anomaly_parameters != evaluation.parameters
            {
                reading.set_anomaly_parameters(evaluation.parameters.clone());
                updated += 1;
            }
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use gridscope_core::Parameter;

    fn make_reading(i: usize) -> Reading {
        let base = Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap();
        Reading {
            id: format!("r-{i}"),
            timestamp: base + Duration::seconds(i as i64),
            node: "node-a".to_string(),
            voltage: Some(230.0),
            current: None,
            power: None,
            frequency: None,
            power_factor: None,
            is_anomaly: false,
            anomaly_parameters: Vec::new(),
        }
    }

    fn flagged(parameters: Vec<Parameter>) -> Evaluation {
        Evaluation {
            is_anomaly: !parameters.is_empty(),
            parameters,
        }
    }

    #[test]
    fn merge_applies_by_id_not_position() {
        let mut base: Vec<Reading> = (0..5).map(make_reading).collect();
        base.reverse();

        let patch: AnomalyPatch =
            [("r-2".to_string(), flagged(vec![Parameter::Voltage]))].into();

        assert_eq!(merge_flags(&mut base, &patch), 1);
        let touched = base.iter().find(|r| r.id == "r-2").unwrap();
        assert!(touched.is_anomaly);
        assert_eq!(base.iter().filter(|r| r.is_anomaly).count(), 1);
    }

    #[test]
    fn unmatched_ids_keep_last_known_flags() {
        let mut base: Vec<Reading> = (0..3).map(make_reading).collect();
        base[0].set_anomaly_parameters(vec![Parameter::Frequency]);

        let patch: AnomalyPatch =
            [("r-9".to_string(), flagged(vec![Parameter::Voltage]))].into();

        assert_eq!(merge_flags(&mut base, &patch), 0);
        assert!(base[0].is_anomaly);
        assert_eq!(base[0].anomaly_parameters, vec![Parameter::Frequency]);
    }

    #[test]
    fn patch_can_clear_flags() {
        let mut base: Vec<Reading> = (0..2).map(make_reading).collect();
        base[1].set_anomaly_parameters(vec![Parameter::Voltage]);

        let patch: AnomalyPatch = [("r-1".to_string(), flagged(Vec::new()))].into();

        assert_eq!(merge_flags(&mut base, &patch), 1);
        assert!(!base[1].is_anomaly);
        assert!(base[1].anomaly_parameters.is_empty());
    }

    #[test]
    fn chunked_merges_grow_the_anomaly_count_monotonically() {
        let mut base: Vec<Reading> = (0..100).map(make_reading).collect();

        let mut last_count = 0usize;
        for chunk_start in (0..100).step_by(25) {
            let patch: AnomalyPatch = (chunk_start..chunk_start + 25)
                .filter(|i| i % 10 == 0)
                .map(|i| (format!("r-{i}"), flagged(vec![Parameter::Voltage])))
                .collect();

            merge_flags(&mut base, &patch);
            let count = base.iter().filter(|r| r.is_anomaly).count();
            assert!(count >= last_count);
            last_count = count;
        }

        assert_eq!(last_count, 10);
    }
}
