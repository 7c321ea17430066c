//! One-hot encoding of a categorical column.
//!
//! The category set is discovered at fit time and stored as an explicit
//! `category → index` map inside the artifact. Transforming a category that was
//! not seen at fit time is an error: a price for an unrepresented postal code is
//! out of distribution and must be reported, not silently bucketed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::FeatureColumn;
use crate::error::PredictError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: FeatureColumn,
    /// Category → output position, positions assigned in ascending category order.
    index: BTreeMap<i64, usize>,
}

impl OneHotEncoder {
    /// Learn the category set of `column` from `values`.
    pub fn fit(column: FeatureColumn, values: impl IntoIterator<Item = i64>) -> Self {
        let mut index: BTreeMap<i64, usize> = values.into_iter().map(|v| (v, 0)).collect();
        for (pos, slot) in index.values_mut().enumerate() {
            *slot = pos;
        }
        Self { column, index }
    }

    pub fn column(&self) -> FeatureColumn {
        self.column
    }

    /// Number of output columns (one per known category).
    pub fn width(&self) -> usize {
        self.index.len()
    }

    pub fn categories(&self) -> impl Iterator<Item = i64> + '_ {
        self.index.keys().copied()
    }

    pub fn contains(&self, value: i64) -> bool {
        self.index.contains_key(&value)
    }

    pub fn index_of(&self, value: i64) -> Result<usize, PredictError> {
        self.index
            .get(&value)
            .copied()
            .ok_or(PredictError::UnseenCategory {
                column: self.column.name(),
                value,
            })
    }

    /// Write the one-hot block for `value` into `out` (length `width()`).
    pub fn encode_into(&self, value: i64, out: &mut [f64]) -> Result<(), PredictError> {
        let pos = self.index_of(value)?;
        out.fill(0.0);
        out[pos] = 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_sorted_and_deduplicated() {
        let enc = OneHotEncoder::fit(FeatureColumn::CodePostal, [75011, 75001, 75011, 75020]);
        assert_eq!(enc.width(), 3);
        assert_eq!(enc.categories().collect::<Vec<_>>(), vec![75001, 75011, 75020]);
        assert_eq!(enc.index_of(75011), Ok(1));
    }

    #[test]
    fn encode_sets_a_single_hot_position() {
        let enc = OneHotEncoder::fit(FeatureColumn::CodePostal, [75001, 75002, 75003]);
        let mut out = vec![9.0; 3];
        enc.encode_into(75003, &mut out).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn unseen_category_is_an_error() {
        let enc = OneHotEncoder::fit(FeatureColumn::CodePostal, [75001]);
        let err = enc.index_of(99999).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Found unknown categories [99999] in column code_postal during transform"
        );
        assert!(!enc.contains(99999));
    }
}
