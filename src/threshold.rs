// Threshold selector
//
// Converts a calibration-sensitivity target s in [0, 1] into a concrete score
// cutoff: the 100*(1 - s)-th percentile of the calibration score
// distribution. Lower scores are more anomalous, so raising s toward 1 lowers
// the cutoff.

use crate::error::TrainError;

#[path = "threshold_test.rs"]
mod threshold_test;

/// Percentile of `values` at `p` in (0, 100], using the estimator
/// pos = p * (n + 1) / 100 with linear interpolation between order
/// statistics; positions below 1 return the minimum and positions at or
/// above n return the maximum.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    debug_assert!(!values.is_empty());
    debug_assert!(p > 0.0 && p <= 100.0);
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = p * (n as f64 + 1.0) / 100.0;
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= n as f64 {
        return sorted[n - 1];
    }
    let lower = pos.floor() as usize; // 1-based order statistic
    let d = pos - lower as f64;
    sorted[lower - 1] + d * (sorted[lower] - sorted[lower - 1])
}

/// Derive the score cutoff for a sensitivity target. `sensitivity = 1.0` is
/// defined as the minimum observed calibration score; the percentile
/// estimator rejects a 0th-percentile request, so this case is handled
/// explicitly.
pub fn score_threshold(calibration_scores: &[f64], sensitivity: f64) -> Result<f64, TrainError> {
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(TrainError::InputValidation(format!(
            "calibration-sensitivity threshold must be in [0, 1], got {}",
            sensitivity
        )));
    }
    if calibration_scores.is_empty() {
        return Err(TrainError::DataSufficiency(
            "cannot derive a score threshold from an empty calibration score set".into(),
        ));
    }
    if sensitivity == 1.0 {
        return Ok(calibration_scores
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min));
    }
    Ok(percentile(calibration_scores, 100.0 * (1.0 - sensitivity)))
}
