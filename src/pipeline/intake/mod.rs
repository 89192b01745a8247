//! Input validation and sanitization: the first gate of the pipeline.

pub mod denylist;
pub mod types;
pub mod validator;

pub use denylist::*;
pub use types::*;
pub use validator::*;

use serde::Serialize;
use thiserror::Error;

/// All violations of the first failing category.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Validation failed ({category}): {}", summarize(.violations))]
pub struct ValidationFailure {
    pub category: ViolationCategory,
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationFailure {
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}
