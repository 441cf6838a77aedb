use std::time::Duration;

use scenechain_core::types::JobId;

use crate::job::JobStatus;

/// Errors from submitting, polling or downloading a generation job.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The request was rejected before or by the service. Not retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service does not know this job id.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The job was still running when the wait deadline passed.
    #[error("Job {job_id} did not finish within {waited:?} (last status: {last_status:?})")]
    Timeout {
        job_id: JobId,
        waited: Duration,
        last_status: JobStatus,
    },

    /// The service reported the job as failed.
    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    /// The result asset cannot be fetched (job not succeeded, or gone).
    #[error("Asset for job {job_id} unavailable: {reason}")]
    AssetUnavailable { job_id: JobId, reason: String },

    #[error("Generation cancelled")]
    Cancelled,

    /// The service returned an unexpected non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}
