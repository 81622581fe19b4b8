//! Scoring rules for probabilistic predictions.
//!
//! Predictions arrive as empirical samples (one value per scenario); the
//! metrics treat them as a discrete predictive distribution.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Floor applied inside the log to keep the score finite when no sample
/// lands near an observation.
const LOG_SCORE_FLOOR: f64 = 1e-6;

/// Standard calibration metrics over a batch of prediction/observation
/// pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    /// Mean continuous ranked probability score (lower is better).
    pub crps: f64,
    /// Mean negative log predictive density (lower is better).
    pub log_score: f64,
    /// Fraction of observations inside the central 50% interval.
    pub coverage_50: f64,
    pub coverage_80: f64,
    pub coverage_95: f64,
}

/// Compute metrics for a batch. `predictions[i]` is the sample vector
/// predicting `observed[i]`.
pub fn compute_metrics(
    predictions: &[Vec<f64>],
    observed: &[f64],
) -> Result<CalibrationMetrics, CalibrationError> {
    if predictions.is_empty()
        || observed.is_empty()
        || predictions.len() != observed.len()
        || predictions.iter().any(|p| p.is_empty())
    {
        return Err(CalibrationError::EmptyInput);
    }

    let mut crps_total = 0.0;
    let mut log_total = 0.0;
    let mut inside = [0usize; 3];
    for (samples, &y) in predictions.iter().zip(observed) {
        crps_total += sample_crps(samples, y);
        log_total += -predictive_density(samples, y).max(LOG_SCORE_FLOOR).ln();
        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (slot, central) in [0.5, 0.8, 0.95].iter().enumerate() {
            let (lo, hi) = central_interval(&sorted, *central);
            if y >= lo && y <= hi {
                inside[slot] += 1;
            }
        }
    }

    let n = observed.len() as f64;
    Ok(CalibrationMetrics {
        crps: crps_total / n,
        log_score: log_total / n,
        coverage_50: inside[0] as f64 / n,
        coverage_80: inside[1] as f64 / n,
        coverage_95: inside[2] as f64 / n,
    })
}

/// CRPS of an empirical sample against one observation:
/// `E|X - y| - 0.5 E|X - X'|`.
pub fn sample_crps(samples: &[f64], y: f64) -> f64 {
    let n = samples.len() as f64;
    let term_obs: f64 = samples.iter().map(|x| (x - y).abs()).sum::<f64>() / n;

    // E|X - X'| via the sorted-sample identity, O(n log n).
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut pair_sum = 0.0;
    let mut prefix = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        pair_sum += x * i as f64 - prefix;
        prefix += x;
    }
    let term_pairs = 2.0 * pair_sum / (n * n);

    term_obs - 0.5 * term_pairs
}

/// Discrete predictive density: mass of samples in a unit-wide bin around
/// the observation. Appropriate for the integer-valued race components.
fn predictive_density(samples: &[f64], y: f64) -> f64 {
    let hits = samples.iter().filter(|&&x| (x - y).abs() <= 0.5).count();
    hits as f64 / samples.len() as f64
}

/// Central interval bounds covering a `central` fraction of the sorted
/// sample.
fn central_interval(sorted: &[f64], central: f64) -> (f64, f64) {
    let tail = (1.0 - central) / 2.0;
    let last = sorted.len() - 1;
    let lo_idx = (tail * last as f64).floor() as usize;
    let hi_idx = ((1.0 - tail) * last as f64).ceil() as usize;
    (sorted[lo_idx], sorted[hi_idx.min(last)])
}
