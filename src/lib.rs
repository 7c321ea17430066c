//! `paris-prices` library crate.
//!
//! The binary (`dvf`) is a thin wrapper around this library so that:
//!
//! - training and serving are testable without spawning processes
//! - the HTTP layer and the CLI share one prediction path
//!
//! Flow: `io::ingest` -> `prep` -> `fit` -> `io::artifact` -> `serve`.

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod prep;
pub mod report;
pub mod serve;
