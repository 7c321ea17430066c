//! Feature preparation: raw DVF rows → cleaned, labeled feature table.
//!
//! - row-level filters and derived columns (`filter`)
//! - price outlier fence (`outlier`)

pub mod filter;
pub mod outlier;

pub use filter::*;
pub use outlier::*;
