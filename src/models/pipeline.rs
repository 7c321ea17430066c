//! The trained pipeline: postal-code encoder + random forest, plus the schema
//! that ties request fields to model inputs.
//!
//! Encoded row layout:
//!
//! ```text
//! [ one-hot(code_postal) ... | surface_reelle_bati | nombre_pieces_principales | total_surface_lots ]
//! ```
//!
//! The passthrough order is recorded in `FeatureSchema` and every row is built by
//! looking columns up by name, so training and serving cannot drift apart on
//! column positions.

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{FeatureColumn, FeatureRow, ForestParams};
use crate::error::PredictError;
use crate::math::EvalMetrics;
use crate::models::encoder::OneHotEncoder;
use crate::models::forest::RandomForest;

/// Anything that can price a single property.
///
/// The prediction service depends on this trait rather than on
/// `TrainedPipeline`, so handlers can be exercised with a stub model.
pub trait PricePredictor: Send + Sync {
    fn predict(&self, row: &FeatureRow) -> Result<f64, PredictError>;
}

/// Named layout of the model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Categorical column expanded by the encoder (placed first).
    pub encoded: FeatureColumn,
    /// Numeric columns copied as-is, in this order, after the one-hot block.
    pub passthrough: Vec<FeatureColumn>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            encoded: FeatureColumn::CodePostal,
            passthrough: vec![
                FeatureColumn::SurfaceReelleBati,
                FeatureColumn::NombrePiecesPrincipales,
                FeatureColumn::TotalSurfaceLots,
            ],
        }
    }
}

/// Provenance and held-out quality of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub trained_at: DateTime<Utc>,
    pub source: String,
    pub seed: u64,
    pub n_train: usize,
    pub n_test: usize,
    /// Held-out rows skipped because their postal code was absent from training.
    pub n_unseen: usize,
    pub metrics: Option<EvalMetrics>,
    pub forest: ForestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub schema: FeatureSchema,
    pub encoder: OneHotEncoder,
    pub forest: RandomForest,
    pub card: ModelCard,
}

impl TrainedPipeline {
    /// Width of an encoded row.
    pub fn width(&self) -> usize {
        encoded_width(&self.schema, &self.encoder)
    }

    pub fn encode(&self, row: &FeatureRow) -> Result<Vec<f64>, PredictError> {
        let mut out = vec![0.0; self.width()];
        encode_into(&self.schema, &self.encoder, row, &mut out)?;
        Ok(out)
    }

    /// Output column names, e.g. `code_postal=75001`, then the passthrough names.
    pub fn feature_names(&self) -> Vec<String> {
        let column = self.encoder.column().name();
        self.encoder
            .categories()
            .map(|c| format!("{column}={c}"))
            .chain(self.schema.passthrough.iter().map(|c| c.name().to_string()))
            .collect()
    }
}

impl PricePredictor for TrainedPipeline {
    fn predict(&self, row: &FeatureRow) -> Result<f64, PredictError> {
        let encoded = self.encode(row)?;
        let price = self.forest.predict_row(&encoded);
        if !price.is_finite() {
            return Err(PredictError::Model("Non-finite model prediction.".to_string()));
        }
        Ok(price)
    }
}

pub fn encoded_width(schema: &FeatureSchema, encoder: &OneHotEncoder) -> usize {
    encoder.width() + schema.passthrough.len()
}

/// Encode one row into `out` (length `encoded_width`).
pub fn encode_into(
    schema: &FeatureSchema,
    encoder: &OneHotEncoder,
    row: &FeatureRow,
    out: &mut [f64],
) -> Result<(), PredictError> {
    let category = row.category(schema.encoded).ok_or_else(|| {
        PredictError::Model(format!("Column `{}` is not categorical.", schema.encoded.name()))
    })?;
    let (one_hot, rest) = out.split_at_mut(encoder.width());
    encoder.encode_into(category, one_hot)?;
    for (slot, column) in rest.iter_mut().zip(&schema.passthrough) {
        *slot = row.value(*column);
    }
    Ok(())
}

/// Encode many rows into a design matrix (one row per input row).
pub fn encode_rows(
    schema: &FeatureSchema,
    encoder: &OneHotEncoder,
    rows: &[FeatureRow],
) -> Result<DMatrix<f64>, PredictError> {
    let width = encoded_width(schema, encoder);
    let mut flat = vec![0.0; rows.len() * width];
    for (row, chunk) in rows.iter().zip(flat.chunks_mut(width.max(1))) {
        encode_into(schema, encoder, row, chunk)?;
    }
    Ok(DMatrix::from_row_slice(rows.len(), width, &flat))
}
