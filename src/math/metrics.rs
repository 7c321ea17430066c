//! Regression quality metrics used to evaluate a trained pipeline.
//!
//! These are advisory: a run with poor metrics still produces an artifact.

use serde::{Deserialize, Serialize};

use crate::math::median;

/// Held-out evaluation of a trained pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Median of `|ŷ - y|`.
    pub median_abs_error: f64,
    /// Mean of `|ŷ - y| / y`.
    pub mape: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Number of rows the metrics were computed on.
    pub n: usize,
}

/// Compute all metrics. `None` when there is nothing to evaluate.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Option<EvalMetrics> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    Some(EvalMetrics {
        median_abs_error: median_absolute_error(y_true, y_pred)?,
        mape: mean_absolute_percentage_error(y_true, y_pred),
        r2: r2_score(y_true, y_pred),
        n: y_true.len(),
    })
}

pub fn median_absolute_error(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .map(|(y, yhat)| (yhat - y).abs())
        .collect();
    median(&errors)
}

pub fn mean_absolute_percentage_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred)
        .map(|(y, yhat)| (yhat - y).abs() / y)
        .sum::<f64>()
        / n
}

/// `1 - SS_res / SS_tot`.
///
/// A constant target makes `SS_tot` zero; the score is then 1.0 for a perfect
/// prediction and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(y, yhat)| (y - yhat).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_scores() {
        let y = [100.0, 200.0, 300.0];
        let m = evaluate(&y, &y).unwrap();
        assert_eq!(m.median_abs_error, 0.0);
        assert_eq!(m.mape, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.n, 3);
    }

    #[test]
    fn known_errors() {
        let y = [100.0, 200.0, 400.0];
        let yhat = [110.0, 180.0, 400.0];
        // abs errors: 10, 20, 0 -> median 10
        assert_eq!(median_absolute_error(&y, &yhat), Some(10.0));
        // (0.1 + 0.1 + 0) / 3
        assert!((mean_absolute_percentage_error(&y, &yhat) - 0.2 / 3.0).abs() < 1e-12);
        // mean = 233.33, ss_tot = 46666.67, ss_res = 500
        let r2 = r2_score(&y, &yhat);
        assert!((r2 - (1.0 - 500.0 / (140_000.0 / 3.0))).abs() < 1e-9);
    }

    #[test]
    fn constant_target_r2() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
    }

    #[test]
    fn empty_input_has_no_metrics() {
        assert!(evaluate(&[], &[]).is_none());
    }
}
