//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and cleaned transaction rows (`RawTransactionRecord`, `CleanedFeatureRow`)
//! - model input columns and rows (`FeatureColumn`, `FeatureRow`)
//! - the prediction request/response contract
//! - run configuration (`TrainConfig`, `ServeConfig`, `ForestParams`)

pub mod types;

pub use types::*;
