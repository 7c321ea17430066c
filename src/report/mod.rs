//! Reporting: human-readable training summaries.

pub mod format;

pub use format::*;
