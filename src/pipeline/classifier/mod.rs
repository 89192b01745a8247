//! Disease classifier: model abstraction, once-per-process resource loading
//! and ranked prediction.

pub mod model;
pub mod predict;
pub mod resources;
pub mod risk;

pub use model::*;
pub use predict::*;
pub use resources::*;
pub use risk::*;

use thiserror::Error;

/// Errors are `Clone` so a failed load can be memoized and reported to
/// every request without retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Cannot read model file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Model definition is not valid JSON: {0}")]
    Parse(String),

    #[error("Model shape invalid: {0}")]
    Shape(String),

    #[error("Input length mismatch: model expects {expected}, got {actual}")]
    InputLength { expected: usize, actual: usize },

    #[error("Model produced an unusable output: {0}")]
    Output(String),
}
