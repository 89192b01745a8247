//! Report extraction jobs: where report-derived data comes from.
//!
//! A request may reference an asynchronous extraction job by id, or carry
//! the extracted payload inline. Only finished data is ever merged; anything
//! else is recorded and the assessment proceeds on manual data.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::ExtractionResult;
use crate::models::AdditionalInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionJobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl ExtractionJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// State of one report extraction job as reported by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub job_id: String,
    pub status: ExtractionJobStatus,
    pub progress_percent: u8,
    /// Present only when `status` is `Complete`.
    pub result: Option<ExtractionResult>,
    pub error: Option<String>,
}

impl ExtractionJob {
    pub fn new(job_id: &str, status: ExtractionJobStatus, progress_percent: u8) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            progress_percent: progress_percent.min(100),
            result: None,
            error: None,
        }
    }

    pub fn complete(job_id: &str, result: ExtractionResult) -> Self {
        Self {
            result: Some(result),
            ..Self::new(job_id, ExtractionJobStatus::Complete, 100)
        }
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, ExtractionJobStatus::Failed, 0)
        }
    }
}

/// Extraction-job status capability.
pub trait ReportSource: Send + Sync {
    fn job(&self, job_id: &str) -> Option<ExtractionJob>;
}

/// In-process job table, for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryReportSource {
    jobs: Mutex<HashMap<String, ExtractionJob>>,
}

impl InMemoryReportSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job.
    pub fn upsert(&self, job: ExtractionJob) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(job.job_id.clone(), job);
        }
    }
}

impl ReportSource for InMemoryReportSource {
    fn job(&self, job_id: &str) -> Option<ExtractionJob> {
        self.jobs.lock().ok()?.get(job_id).cloned()
    }
}

/// Where report data for this assessment stood when the pipeline ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    /// Payload supplied inline in the request.
    Inline,
    Pending,
    Processing,
    Complete,
    Failed,
    /// The job id is unknown to the report source.
    NotFound,
    /// A job id was given but no report source is configured.
    SourceUnavailable,
}

impl From<ExtractionJobStatus> for ReportState {
    fn from(status: ExtractionJobStatus) -> Self {
        match status {
            ExtractionJobStatus::Pending => Self::Pending,
            ExtractionJobStatus::Processing => Self::Processing,
            ExtractionJobStatus::Complete => Self::Complete,
            ExtractionJobStatus::Failed => Self::Failed,
        }
    }
}

/// Report status surfaced in result metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub state: ReportState,
    pub progress_percent: u8,
    pub merged: bool,
}

/// Resolve report-derived data for a request.
///
/// Inline `extracted_data` takes precedence over a job reference. Returns
/// `(None, None)` when the request refers to no report at all.
pub fn resolve_report(
    info: &AdditionalInfo,
    source: Option<&dyn ReportSource>,
) -> (Option<ExtractionResult>, Option<ReportStatus>) {
    if let Some(inline) = &info.extracted_data {
        let result = ExtractionResult::from_value(inline);
        let status = ReportStatus {
            job_id: info.report_job_id.clone(),
            state: ReportState::Inline,
            progress_percent: 100,
            merged: true,
        };
        return (Some(result), Some(status));
    }

    let Some(job_id) = info.report_job_id.as_deref() else {
        return (None, None);
    };

    let unmerged = |state: ReportState, progress_percent: u8| ReportStatus {
        job_id: Some(job_id.to_string()),
        state,
        progress_percent,
        merged: false,
    };

    let Some(source) = source else {
        tracing::warn!("Report job referenced but no report source configured");
        return (None, Some(unmerged(ReportState::SourceUnavailable, 0)));
    };

    match source.job(job_id) {
        None => {
            tracing::warn!("Report job not found, continuing with manual data");
            (None, Some(unmerged(ReportState::NotFound, 0)))
        }
        Some(ExtractionJob {
            status: ExtractionJobStatus::Complete,
            result: Some(result),
            ..
        }) => {
            let status = ReportStatus {
                merged: true,
                ..unmerged(ReportState::Complete, 100)
            };
            (Some(result), Some(status))
        }
        Some(job) => {
            tracing::info!(
                status = job.status.as_str(),
                progress = job.progress_percent,
                "Report job not ready, continuing with manual data"
            );
            (None, Some(unmerged(job.status.into(), job.progress_percent)))
        }
    }
}
