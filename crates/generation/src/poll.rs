//! Bounded polling until a job reaches a terminal status.
//!
//! [`await_completion`] polls at a fixed interval until the job succeeds,
//! fails, the deadline passes, or the [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use scenechain_core::types::JobId;

use crate::client::GenerationClient;
use crate::error::GenerationError;
use crate::job::{Job, JobStatus};

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of status checks before giving up.
pub const DEFAULT_MAX_POLLS: u32 = 60;

/// Tunable parameters for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Total time to wait for a terminal status.
    pub timeout: Duration,
}

impl PollConfig {
    /// Build a config that allows `max_polls` checks `interval` apart.
    pub fn from_polls(interval: Duration, max_polls: u32) -> Self {
        Self {
            interval,
            timeout: interval * max_polls,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_polls(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_POLLS)
    }
}

/// Poll `job_id` until it is terminal.
///
/// Returns the succeeded [`Job`]. A failed job becomes
/// [`GenerationError::JobFailed`], an expired deadline
/// [`GenerationError::Timeout`], and cancellation
/// [`GenerationError::Cancelled`]. Poll errors are returned immediately.
pub async fn await_completion<C: GenerationClient>(
    client: &C,
    job_id: &JobId,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<Job, GenerationError> {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut last_status = JobStatus::Submitted;
    let mut polls = 0u32;

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            job = client.poll(job_id) => job?,
        };
        polls += 1;

        if job.status != last_status {
            tracing::debug!(
                job_id = %job_id,
                from = ?last_status,
                to = ?job.status,
                polls,
                "Job status changed",
            );
            last_status = job.status;
        }

        match job.status {
            JobStatus::Succeeded => {
                tracing::info!(
                    job_id = %job_id,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job succeeded",
                );
                return Ok(job);
            }
            JobStatus::Failed => {
                let reason = job
                    .error
                    .clone()
                    .unwrap_or_else(|| "service reported failure".to_string());
                return Err(GenerationError::JobFailed {
                    job_id: job_id.clone(),
                    reason,
                });
            }
            _ => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(GenerationError::Timeout {
                job_id: job_id.clone(),
                waited: now - started,
                last_status,
            });
        }

        let wait = config.interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
