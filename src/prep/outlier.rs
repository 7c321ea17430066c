//! Outlier exclusion on the sale price.
//!
//! The fence is derived from the price quartiles of the rows that survived
//! row-level cleaning:
//!
//! ```text
//! IQD   = P75 - P25
//! keep  P5 < price < P75 + 0.5 * IQD
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::CleanedFeatureRow;
use crate::math::{quantile_sorted, sorted_copy};

/// Lower bound quantile.
pub const FLOOR_QUANTILE: f64 = 0.05;

/// Multiplier applied to the interquartile difference above P75.
pub const UPPER_IQD_MULTIPLIER: f64 = 0.5;

/// Price band computed over a population of cleaned rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierFence {
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub iqd: f64,
    /// Exclusive lower bound (`P5`).
    pub lower: f64,
    /// Exclusive upper bound (`P75 + 0.5 * IQD`).
    pub upper: f64,
}

impl OutlierFence {
    /// Compute the fence from target values. `None` for an empty population.
    pub fn from_targets(targets: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(targets);
        let p05 = quantile_sorted(&sorted, FLOOR_QUANTILE)?;
        let p25 = quantile_sorted(&sorted, 0.25)?;
        let p50 = quantile_sorted(&sorted, 0.50)?;
        let p75 = quantile_sorted(&sorted, 0.75)?;
        let iqd = p75 - p25;
        Some(Self {
            p05,
            p25,
            p50,
            p75,
            iqd,
            lower: p05,
            upper: p75 + UPPER_IQD_MULTIPLIER * iqd,
        })
    }

    pub fn contains(&self, target: f64) -> bool {
        target > self.lower && target < self.upper
    }

    /// Keep the rows whose target lies strictly inside the band.
    pub fn apply(&self, rows: Vec<CleanedFeatureRow>) -> Vec<CleanedFeatureRow> {
        rows.into_iter()
            .filter(|r| self.contains(r.valeur_fonciere))
            .collect()
    }
}

/// Compute the fence over `rows` and drop everything outside it.
pub fn remove_outliers(rows: Vec<CleanedFeatureRow>) -> (Vec<CleanedFeatureRow>, Option<OutlierFence>) {
    let targets: Vec<f64> = rows.iter().map(|r| r.valeur_fonciere).collect();
    match OutlierFence::from_targets(&targets) {
        Some(fence) => (fence.apply(rows), Some(fence)),
        None => (rows, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price: f64) -> CleanedFeatureRow {
        CleanedFeatureRow {
            valeur_fonciere: price,
            surface_reelle_bati: 40.0,
            nombre_pieces_principales: 2.0,
            code_postal: 75011,
            total_surface_lots: 0.0,
        }
    }

    #[test]
    fn fence_values_on_simple_population() {
        // 1..=100 (x1000): P5 = 5950, P25 = 25750, P75 = 75250
        let prices: Vec<f64> = (1..=100).map(|i| i as f64 * 1000.0).collect();
        let fence = OutlierFence::from_targets(&prices).unwrap();
        assert!((fence.p05 - 5_950.0).abs() < 1e-9);
        assert!((fence.p25 - 25_750.0).abs() < 1e-9);
        assert!((fence.p75 - 75_250.0).abs() < 1e-9);
        assert!((fence.iqd - 49_500.0).abs() < 1e-9);
        assert!((fence.upper - 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn retained_rows_respect_the_bounds() {
        let mut prices: Vec<f64> = (1..=200).map(|i| 150_000.0 + i as f64 * 2_500.0).collect();
        prices.extend([1.0, 15.0, 9_000_000.0, 25_000_000.0]);
        let rows: Vec<_> = prices.iter().map(|&p| row(p)).collect();

        let (kept, fence) = remove_outliers(rows);
        let fence = fence.unwrap();
        assert!(!kept.is_empty());
        for r in &kept {
            assert!(r.valeur_fonciere > fence.p05);
            assert!(r.valeur_fonciere < fence.p75 + 0.5 * (fence.p75 - fence.p25));
        }
        assert!(kept.iter().all(|r| r.valeur_fonciere != 1.0));
        assert!(kept.iter().all(|r| r.valeur_fonciere != 25_000_000.0));
    }

    #[test]
    fn reapplying_a_fixed_fence_removes_nothing() {
        let rows: Vec<_> = (1..=50).map(|i| row(i as f64 * 10_000.0)).collect();
        let (kept, fence) = remove_outliers(rows);
        let fence = fence.unwrap();
        let again = fence.apply(kept.clone());
        assert_eq!(again, kept);
    }

    #[test]
    fn single_row_is_excluded_by_strict_bounds() {
        let (kept, fence) = remove_outliers(vec![row(300_000.0)]);
        assert!(kept.is_empty());
        assert_eq!(fence.unwrap().p05, 300_000.0);
    }

    #[test]
    fn empty_population_has_no_fence() {
        let (kept, fence) = remove_outliers(Vec::new());
        assert!(kept.is_empty());
        assert!(fence.is_none());
    }
}
