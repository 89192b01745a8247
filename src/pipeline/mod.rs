pub mod stage; // Stage trait + tracing decorator
pub mod intake; // Validation and sanitization
pub mod merge; // Manual vs report-derived data
pub mod features; // Disease routing + feature mapping
pub mod matcher; // Phrase-to-vector encoding
pub mod classifier; // Model resources + ranked prediction
pub mod confidence;
pub mod prompts;
pub mod explain;
pub mod reflection; // Verification + single-pass correction
pub mod recommend;
pub mod response;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, PipelineContext, PipelineError};
pub use response::AssessmentResponse;
