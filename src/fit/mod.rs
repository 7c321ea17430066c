//! Training orchestration.
//!
//! Responsibilities:
//!
//! - split the cleaned table into train / held-out rows (`split`)
//! - fit encoder + forest and score the held-out rows (`trainer`)

pub mod split;
pub mod trainer;

pub use split::*;
pub use trainer::*;
