//! Command-line parsing for the Paris apartment price predictor.
//!
//! Argument parsing only; `app` turns these into configs and runs them.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Delimiter, ForestParams, ServeConfig, TrainConfig};
use crate::io::{DEFAULT_MODEL_PATH, DEFAULT_SOURCE};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dvf", version, about = "Paris apartment price model: train, serve, predict")]
pub struct Cli {
    /// More logging (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clean a DVF extract, fit the model, print metrics and write the artifact.
    Train(TrainArgs),
    /// Serve predictions over HTTP from a trained artifact.
    Serve(ServeArgs),
    /// Price a single apartment from the command line.
    Predict(PredictArgs),
    /// Print an artifact's model card, feature layout and known postal codes.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ModelPathArg {
    /// Model artifact path.
    #[arg(short, long = "model", env = "PARIS_PRICES_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// DVF CSV file or `http(s)://` URL, plain or gzipped.
    #[arg(short, long, env = "PARIS_PRICES_INPUT", default_value = DEFAULT_SOURCE)]
    pub input: String,

    /// Field delimiter of the input.
    #[arg(long, value_enum, default_value_t = Delimiter::Auto)]
    pub delimiter: Delimiter,

    #[command(flatten)]
    pub model: ModelPathArg,

    /// Seed for the train/test split and the forest.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of trees in the forest.
    #[arg(long, default_value_t = 100)]
    pub trees: usize,

    /// Maximum tree depth (unlimited when omitted).
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Minimum rows required to split a node.
    #[arg(long, default_value_t = 2)]
    pub min_samples_split: usize,

    /// Minimum rows in each leaf.
    #[arg(long, default_value_t = 1)]
    pub min_samples_leaf: usize,

    /// Fraction of features tried at each split, in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    pub max_features: f64,

    /// Also write the cleaned table to CSV.
    #[arg(long = "export-cleaned", value_name = "CSV")]
    pub export_cleaned: Option<PathBuf>,
}

impl TrainArgs {
    pub fn to_config(&self) -> TrainConfig {
        TrainConfig {
            input: self.input.clone(),
            delimiter: self.delimiter,
            model_path: self.model.model.clone(),
            seed: self.seed,
            forest: ForestParams {
                n_trees: self.trees,
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                max_features: self.max_features,
            },
            export_cleaned: self.export_cleaned.clone(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub model: ModelPathArg,

    /// Address to listen on.
    #[arg(short, long, env = "PARIS_PRICES_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Answer failed predictions with 400/422/500 instead of 200.
    #[arg(long)]
    pub strict_status: bool,
}

impl ServeArgs {
    pub fn to_config(&self) -> ServeConfig {
        ServeConfig {
            model_path: self.model.model.clone(),
            bind: self.bind,
            strict_status: self.strict_status,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub model: ModelPathArg,

    /// Built surface in m².
    #[arg(long)]
    pub surface: String,

    /// Number of main rooms.
    #[arg(long)]
    pub rooms: String,

    /// Total lot (Carrez) surface in m².
    #[arg(long, default_value = "0")]
    pub terrain: String,

    /// Postal code, e.g. 75011.
    #[arg(long)]
    pub zip: String,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub model: ModelPathArg,
}
