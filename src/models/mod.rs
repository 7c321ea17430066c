//! Model building blocks.
//!
//! - `encoder`: one-hot encoding of the postal code
//! - `tree`: CART regression tree
//! - `forest`: bagged ensemble of trees
//! - `pipeline`: encoder + forest + feature schema, the unit that gets persisted

pub mod encoder;
pub mod forest;
pub mod pipeline;
pub mod tree;

pub use encoder::*;
pub use forest::*;
pub use pipeline::*;
pub use tree::*;
