//! Reconciles manually entered data with data extracted from uploaded reports.

pub mod job;
pub mod merger;
pub mod types;

pub use job::*;
pub use merger::*;
pub use types::*;
