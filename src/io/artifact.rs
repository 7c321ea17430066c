//! Read/write the model artifact.
//!
//! The artifact is a single bincode blob holding the whole `TrainedPipeline`
//! (schema, encoder, forest, model card). Floats are stored bit-for-bit, so a
//! reloaded pipeline predicts exactly what the freshly trained one did.
//!
//! Reading checks the tree layout too: a blob that decodes but would index out
//! of bounds at prediction time is rejected like any other corrupt artifact.
//!
//! Writes go to a sibling `*.partial` file that is renamed into place once
//! complete: a crashed or failed run never leaves a truncated artifact behind.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::models::TrainedPipeline;

/// Default artifact location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "pipeline.bin";

const TOOL: &str = "paris-prices";

#[derive(Serialize)]
struct ArtifactRef<'a> {
    tool: &'a str,
    pipeline: &'a TrainedPipeline,
}

#[derive(Deserialize)]
struct ArtifactFile {
    tool: String,
    pipeline: TrainedPipeline,
}

/// Serialize `pipeline` to `path`, replacing any previous artifact atomically.
pub fn write_artifact(path: &Path, pipeline: &TrainedPipeline) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create model directory '{}': {e}", dir.display())))?;
    }

    let tmp = partial_path(path);
    let result = write_blob(&tmp, pipeline).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| {
            AppError::new(2, format!("Failed to move model artifact into '{}': {e}", path.display()))
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }

    info!(path = %path.display(), "model artifact written");
    Ok(())
}

/// Load a pipeline. Any failure here means the server must not start.
pub fn read_artifact(path: &Path) -> Result<TrainedPipeline, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::artifact(format!("Failed to open model artifact '{}': {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let artifact: ArtifactFile = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
        .map_err(|e| AppError::artifact(format!("Corrupt model artifact '{}': {e}", path.display())))?;

    if artifact.tool != TOOL {
        return Err(AppError::artifact(format!(
            "'{}' was not written by {TOOL} (found '{}').",
            path.display(),
            artifact.tool
        )));
    }

    let pipeline = artifact.pipeline;
    if pipeline.forest.n_features() != pipeline.width() {
        return Err(AppError::artifact(format!(
            "Inconsistent model artifact '{}': forest expects {} features, schema yields {}.",
            path.display(),
            pipeline.forest.n_features(),
            pipeline.width()
        )));
    }
    pipeline
        .forest
        .validate()
        .map_err(|e| AppError::artifact(format!("Corrupt model artifact '{}': {e}", path.display())))?;
    Ok(pipeline)
}

fn write_blob(path: &Path, pipeline: &TrainedPipeline) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model artifact '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    let artifact = ArtifactRef { tool: TOOL, pipeline };
    bincode::serde::encode_into_std_write(&artifact, &mut writer, bincode::config::standard())
        .map_err(|e| AppError::new(4, format!("Failed to encode model artifact: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write model artifact '{}': {e}", path.display())))?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureColumn, FeatureRow, ForestParams};
    use crate::models::{
        FeatureSchema, ModelCard, Node, OneHotEncoder, PricePredictor, RandomForest, RegressionTree, encode_rows,
    };
    use chrono::Utc;

    fn tiny_pipeline() -> TrainedPipeline {
        let schema = FeatureSchema::default();
        let rows: Vec<FeatureRow> = (0..30)
            .map(|i| FeatureRow {
                surface_reelle_bati: 20.0 + i as f64 * 3.0,
                nombre_pieces_principales: 1.0 + (i % 4) as f64,
                code_postal: 75001 + (i % 3),
                total_surface_lots: (i % 5) as f64 * 1.5,
            })
            .collect();
        let y: Vec<f64> = rows
            .iter()
            .map(|r| r.surface_reelle_bati * 10_000.0 + (r.code_postal - 75001) as f64 * 25_000.0)
            .collect();
        let encoder = OneHotEncoder::fit(FeatureColumn::CodePostal, rows.iter().map(|r| r.code_postal));
        let x = encode_rows(&schema, &encoder, &rows).unwrap();
        let forest_params = ForestParams {
            n_trees: 10,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, &forest_params, 5).unwrap();
        TrainedPipeline {
            schema,
            encoder,
            forest,
            card: ModelCard {
                trained_at: Utc::now(),
                source: "test".to_string(),
                seed: 5,
                n_train: 30,
                n_test: 0,
                n_unseen: 0,
                metrics: None,
                forest: forest_params,
            },
        }
    }

    #[test]
    fn round_trip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("pipeline.bin");
        let pipeline = tiny_pipeline();

        write_artifact(&path, &pipeline).unwrap();
        assert!(!partial_path(&path).exists());
        let loaded = read_artifact(&path).unwrap();
        assert_eq!(loaded, pipeline);

        let row = FeatureRow {
            surface_reelle_bati: 50.0,
            nombre_pieces_principales: 3.0,
            code_postal: 75002,
            total_surface_lots: 0.0,
        };
        let before = pipeline.predict(&row).unwrap();
        let after = loaded.predict(&row).unwrap();
        assert_eq!(before.to_bits(), after.to_bits());
    }

    #[test]
    fn missing_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact(&dir.path().join("nope.bin")).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn garbage_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.bin");
        fs::write(&path, b"definitely not a model").unwrap();
        let err = read_artifact(&path).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn dangling_tree_nodes_are_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.bin");
        let mut pipeline = tiny_pipeline();
        let broken = RegressionTree::from_nodes(vec![Node::Split {
            feature: 0,
            threshold: 0.5,
            left: 7,
            right: 9,
        }]);
        pipeline.forest = RandomForest::from_trees(vec![broken], pipeline.width());

        write_artifact(&path, &pipeline).unwrap();
        let err = read_artifact(&path).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("tree 0"));
    }

    #[test]
    fn self_referencing_split_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.bin");
        let mut pipeline = tiny_pipeline();
        let looping = RegressionTree::from_nodes(vec![
            Node::Split {
                feature: 1,
                threshold: 0.5,
                left: 0,
                right: 1,
            },
            Node::Leaf { value: 1.0 },
        ]);
        pipeline.forest = RandomForest::from_trees(vec![looping], pipeline.width());

        write_artifact(&path, &pipeline).unwrap();
        assert_eq!(read_artifact(&path).unwrap_err().exit_code(), 5);
    }

    #[test]
    fn truncated_artifact_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.bin");
        write_artifact(&path, &tiny_pipeline()).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert_eq!(read_artifact(&path).unwrap_err().exit_code(), 5);
    }
}
