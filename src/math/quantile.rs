//! Order statistics.
//!
//! Quantiles use linear interpolation between the two nearest ranks, which is
//! what pandas `Series.quantile` does by default:
//!
//! ```text
//! h = (n - 1) * q
//! Q(q) = x[floor(h)] + (h - floor(h)) * (x[ceil(h)] - x[floor(h)])
//! ```

/// Sort a copy of `values` ascending (NaNs last).
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile of an already sorted slice.
///
/// Returns `None` for an empty slice or a `q` outside `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Quantile of an unsorted slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted_copy(values), q)
}

/// Median (mean of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}
