//! Counter reset (wraparound) detection.
//!
//! A forward delta below `threshold` is far too large to be a transient
//! artifact: the counter wrapped at its maximum. The counter maximum is
//! assumed to be a power of ten, and the true volume across the reset
//! instant is `(counter_max - previous) + next`.
//!
//! Detection never touches the totalizer; it only yields records which are
//! written into the anomaly column at the pre-reset minute.

use serde::{Deserialize, Serialize};

/// Thresholds used by [`detect_resets`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResetPolicy {
    /// Forward deltas strictly below this value are resets.
    pub threshold: f64,
    /// Counter maximum assumed when the pre-reset value is not positive.
    pub default_counter_max: f64,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            threshold: -1_000_000.0,
            default_counter_max: 10_000_000.0,
        }
    }
}

/// A detected wraparound at `position` (the pre-reset minute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterResetRecord {
    pub position: usize,
    pub previous_value: f64,
    pub next_value: f64,
    pub counter_max: f64,
    pub true_consumption: f64,
}

/// Smallest power of ten strictly greater than `previous`.
pub fn counter_max_for(previous: f64, default_counter_max: f64) -> f64 {
    if !previous.is_finite() || previous <= 0.0 {
        return default_counter_max;
    }
    let mut max = 1.0_f64;
    while max <= previous {
        max *= 10.0;
    }
    max
}

/// Scan `totals` for wraparounds. Pairs with an undefined or non-finite side
/// are skipped.
pub fn detect_resets(totals: &[Option<f64>], policy: &ResetPolicy) -> Vec<CounterResetRecord> {
    totals
        .windows(2)
        .enumerate()
        .filter_map(|(position, w)| {
            let previous_value = w[0].filter(|v| v.is_finite())?;
            let next_value = w[1].filter(|v| v.is_finite())?;
            let delta = next_value - previous_value;
            if !(delta < policy.threshold) {
                return None;
            }
            let counter_max = counter_max_for(previous_value, policy.default_counter_max);
            Some(CounterResetRecord {
                position,
                previous_value,
                next_value,
                counter_max,
                true_consumption: (counter_max - previous_value) + next_value,
            })
        })
        .collect()
}

/// Write each record's true consumption into `anomalies`, overwriting
/// whatever was there. Returns how many positions already held a value.
pub fn apply_resets(anomalies: &mut [Option<f64>], records: &[CounterResetRecord]) -> usize {
    let mut collisions = 0;
    for r in records {
        if let Some(slot) = anomalies.get_mut(r.position) {
            if slot.is_some() {
                collisions += 1;
            }
            *slot = Some(r.true_consumption);
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_max_is_next_power_of_ten() {
        let d = 10_000_000.0;
        assert_eq!(counter_max_for(9_999_950.0, d), 10_000_000.0);
        assert_eq!(counter_max_for(123_456.0, d), 1_000_000.0);
        assert_eq!(counter_max_for(5.0, d), 10.0);
        // strictly greater: an exact power of ten moves to the next one
        assert_eq!(counter_max_for(1_000_000.0, d), 10_000_000.0);
        assert_eq!(counter_max_for(0.5, d), 1.0);
    }

    #[test]
    fn non_positive_previous_uses_default() {
        assert_eq!(counter_max_for(0.0, 10_000_000.0), 10_000_000.0);
        assert_eq!(counter_max_for(-3.0, 42.0), 42.0);
        assert_eq!(counter_max_for(f64::NAN, 42.0), 42.0);
    }

    #[test]
    fn wraparound_detected_with_true_consumption() {
        let totals = vec![Some(9_999_900.0), Some(9_999_950.0), Some(120.0), Some(200.0)];
        let records = detect_resets(&totals, &ResetPolicy::default());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.position, 1);
        assert_eq!(r.counter_max, 10_000_000.0);
        assert_eq!(r.true_consumption, 170.0);
    }

    #[test]
    fn small_drops_are_not_resets() {
        let totals = vec![Some(5_000_000.0), Some(4_500_000.0), Some(4_000_001.0)];
        assert!(detect_resets(&totals, &ResetPolicy::default()).is_empty());
    }

    #[test]
    fn threshold_is_strict() {
        let totals = vec![Some(2_000_000.0), Some(1_000_000.0)];
        // delta == threshold: not below it
        assert!(detect_resets(&totals, &ResetPolicy::default()).is_empty());
    }

    #[test]
    fn non_finite_neighbours_are_not_resets() {
        let totals = vec![
            Some(100.0),
            Some(f64::NAN),
            Some(110.0),
            Some(f64::NEG_INFINITY),
            Some(120.0),
            Some(f64::INFINITY),
        ];
        assert!(detect_resets(&totals, &ResetPolicy::default()).is_empty());
    }

    #[test]
    fn undefined_neighbours_are_skipped() {
        let totals = vec![Some(9_999_950.0), None, Some(10.0)];
        assert!(detect_resets(&totals, &ResetPolicy::default()).is_empty());
    }

    #[test]
    fn apply_overwrites_and_counts_collisions() {
        let mut anom = vec![None, Some(3.0), None];
        let records = vec![
            CounterResetRecord {
                position: 1,
                previous_value: 9_999_950.0,
                next_value: 120.0,
                counter_max: 10_000_000.0,
                true_consumption: 170.0,
            },
            CounterResetRecord {
                position: 2,
                previous_value: 9_999_990.0,
                next_value: 5.0,
                counter_max: 10_000_000.0,
                true_consumption: 15.0,
            },
        ];
        assert_eq!(apply_resets(&mut anom, &records), 1);
        assert_eq!(anom, vec![None, Some(170.0), Some(15.0)]);
    }
}
