//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - dispatches to train / serve / predict / inspect

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, InspectArgs, PredictArgs, TrainArgs};
use crate::domain::PredictionResponse;
use crate::error::AppError;
use crate::io::read_artifact;
use crate::serve::PredictionService;

pub mod pipeline;

/// Entry point for the `dvf` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Train(args) => handle_train(&args),
        Command::Serve(args) => crate::serve::run(&args.to_config()),
        Command::Predict(args) => handle_predict(&args),
        Command::Inspect(args) => handle_inspect(&args),
    }
}

/// Logs go to stderr so stdout stays clean for reports and JSON.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "paris_prices=info,warp=info",
        1 => "paris_prices=debug,warp=info",
        _ => "paris_prices=trace,warp=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_train(args: &TrainArgs) -> Result<(), AppError> {
    let config = args.to_config();
    let run = pipeline::run_training(&config)?;
    println!("{}", crate::report::format_training_summary(&run, &config));
    Ok(())
}

/// Same payload as `GET /predict`; a failed prediction is an error exit.
fn handle_predict(args: &PredictArgs) -> Result<(), AppError> {
    let pipeline = read_artifact(&args.model.model)?;
    let params: HashMap<String, String> = [
        ("surface", &args.surface),
        ("rooms", &args.rooms),
        ("terrain", &args.terrain),
        ("zip", &args.zip),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.clone()))
    .collect();

    let service = PredictionService::new(Arc::new(pipeline));
    let (body, _) = service.respond(&params);

    println!("{}", to_json(&body)?);
    match body {
        PredictionResponse::Price { .. } => Ok(()),
        PredictionResponse::Error { error } => Err(AppError::new(2, error)),
    }
}

fn handle_inspect(args: &InspectArgs) -> Result<(), AppError> {
    let pipeline = read_artifact(&args.model.model)?;
    let card = &pipeline.card;
    let doc = json!({
        "artifact": args.model.model.display().to_string(),
        "trained_at": card.trained_at.to_rfc3339(),
        "source": card.source,
        "seed": card.seed,
        "n_train": card.n_train,
        "n_test": card.n_test,
        "n_unseen": card.n_unseen,
        "metrics": card.metrics,
        "forest": {
            "params": card.forest,
            "trees": pipeline.forest.n_trees(),
        },
        "schema": pipeline.schema,
        "features": pipeline.feature_names(),
        "postal_codes": pipeline.encoder.categories().collect::<Vec<_>>(),
    });
    println!("{}", to_json(&doc)?);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::new(4, format!("Failed to encode JSON: {e}")))
}
