//! Mathematical utilities: quantiles and regression metrics.

pub mod metrics;
pub mod quantile;

pub use metrics::*;
pub use quantile::*;
