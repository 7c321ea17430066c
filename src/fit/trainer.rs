//! Fit and evaluate the price pipeline on a cleaned table.
//!
//! 1. split the rows 80/20 (seeded)
//! 2. fit the postal-code encoder on the training rows only
//! 3. fit the forest on the encoded training rows
//! 4. score the held-out rows (advisory, never a gate)

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{CleanedFeatureRow, FeatureRow, TrainConfig};
use crate::error::AppError;
use crate::fit::split::{TEST_FRACTION, train_test_split};
use crate::math::{EvalMetrics, evaluate};
use crate::models::{FeatureSchema, ModelCard, OneHotEncoder, RandomForest, TrainedPipeline, encode_rows};

/// Fewest cleaned rows that still leave one row on each side of the split.
pub const MIN_TRAIN_ROWS: usize = 2;

/// Held-out scoring of a fitted pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: Option<EvalMetrics>,
    /// Held-out rows whose postal code the encoder has never seen.
    pub n_unseen: usize,
}

/// Train a pipeline on `rows` and score it on the held-out share.
pub fn train(rows: &[CleanedFeatureRow], config: &TrainConfig) -> Result<TrainedPipeline, AppError> {
    if rows.len() < MIN_TRAIN_ROWS {
        return Err(AppError::new(
            3,
            format!(
                "Not enough cleaned rows to train: {} (need at least {MIN_TRAIN_ROWS}).",
                rows.len()
            ),
        ));
    }

    let split = train_test_split(rows, TEST_FRACTION, config.seed);
    info!(train = split.train.len(), test = split.test.len(), "train/test split");

    let schema = FeatureSchema::default();
    let encoder = OneHotEncoder::fit(schema.encoded, split.train.iter().map(|r| r.code_postal));
    debug!(categories = ?encoder.categories().collect::<Vec<_>>(), "postal code categories");

    let features: Vec<FeatureRow> = split.train.iter().map(CleanedFeatureRow::features).collect();
    let targets: Vec<f64> = split.train.iter().map(|r| r.valeur_fonciere).collect();
    let x = encode_rows(&schema, &encoder, &features)
        .map_err(|e| AppError::new(4, format!("Failed to encode training rows: {e}")))?;

    info!(
        trees = config.forest.n_trees,
        rows = x.nrows(),
        features = x.ncols(),
        "fitting random forest"
    );
    let forest = RandomForest::fit(&x, &targets, &config.forest, config.seed)?;

    let evaluation = evaluate_held_out(&schema, &encoder, &forest, &split.test);
    match &evaluation.metrics {
        Some(m) => {
            info!("Median absolute error: {:.2}", m.median_abs_error);
            info!("MAPE: {:.2}", m.mape);
            info!("R2: {:.2}", m.r2);
        }
        None => warn!("no held-out rows could be scored"),
    }

    Ok(TrainedPipeline {
        schema,
        encoder,
        forest,
        card: ModelCard {
            trained_at: Utc::now(),
            source: config.input.clone(),
            seed: config.seed,
            n_train: split.train.len(),
            n_test: split.test.len(),
            n_unseen: evaluation.n_unseen,
            metrics: evaluation.metrics,
            forest: config.forest,
        },
    })
}

/// Score `test` rows, skipping those with a postal code unknown to `encoder`.
pub fn evaluate_held_out(
    schema: &FeatureSchema,
    encoder: &OneHotEncoder,
    forest: &RandomForest,
    test: &[CleanedFeatureRow],
) -> Evaluation {
    let (known, unseen): (Vec<&CleanedFeatureRow>, Vec<&CleanedFeatureRow>) =
        test.iter().partition(|r| encoder.contains(r.code_postal));
    if !unseen.is_empty() {
        warn!(
            rows = unseen.len(),
            "held-out rows with postal codes unseen in training were not scored"
        );
    }

    let features: Vec<FeatureRow> = known.iter().map(|r| r.features()).collect();
    let y_true: Vec<f64> = known.iter().map(|r| r.valeur_fonciere).collect();
    let metrics = encode_rows(schema, encoder, &features)
        .ok()
        .and_then(|x| evaluate(&y_true, &forest.predict(&x)));

    Evaluation {
        metrics,
        n_unseen: unseen.len(),
    }
}
