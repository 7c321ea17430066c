//! The training workflow shared by `dvf train` and the tests:
//! ingest -> clean -> (export) -> fit + evaluate -> write artifact.

use tracing::{info, warn};

use crate::domain::TrainConfig;
use crate::error::AppError;
use crate::io::{RowError, load_records, write_artifact, write_cleaned_csv};
use crate::models::TrainedPipeline;
use crate::prep::{PreparedData, prepare};

/// Everything a training run produced.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
    pub prepared: PreparedData,
    pub pipeline: TrainedPipeline,
}

/// Run the whole training job. The artifact is only written on success.
pub fn run_training(config: &TrainConfig) -> Result<TrainingRun, AppError> {
    // 1) Load and parse the raw table.
    let ingest = load_records(&config.input, config.delimiter)?;
    if !ingest.row_errors.is_empty() {
        warn!(rows = ingest.row_errors.len(), "skipped unparsable rows");
    }

    // 2) Row filters, derived columns, outlier fence.
    let prepared = prepare(&ingest.records);
    info!(
        rows_in = prepared.stats.rows_in,
        retained = prepared.stats.retained,
        "cleaned transaction table"
    );

    // 3) Optional export of what the model will see.
    if let Some(path) = &config.export_cleaned {
        write_cleaned_csv(path, &prepared.rows)?;
        info!(path = %path.display(), rows = prepared.rows.len(), "cleaned table exported");
    }

    // 4) Fit and score.
    let pipeline = crate::fit::train(&prepared.rows, config)?;

    // 5) Persist.
    write_artifact(&config.model_path, &pipeline)?;

    Ok(TrainingRun {
        rows_read: ingest.rows_read,
        row_errors: ingest.row_errors,
        prepared,
        pipeline,
    })
}
