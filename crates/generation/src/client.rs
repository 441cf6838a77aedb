//! The generation service seam.

use std::future::Future;

use scenechain_core::types::JobId;

use crate::error::GenerationError;
use crate::job::{GenerationRequest, Job};

/// Submits generation jobs and retrieves their results.
///
/// Implementations hold no per-job state between calls; everything needed
/// to follow a job is in its [`JobId`] and the [`Job`] snapshots returned by
/// [`poll`](Self::poll).
pub trait GenerationClient: Send + Sync {
    /// Enqueue a job.
    ///
    /// Fails with [`GenerationError::InvalidRequest`] for an empty prompt or
    /// an unsupported reference image.
    fn submit(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<JobId, GenerationError>> + Send;

    /// Fetch the current state of a job.
    ///
    /// Fails with [`GenerationError::NotFound`] if the id is unknown.
    fn poll(&self, job_id: &JobId) -> impl Future<Output = Result<Job, GenerationError>> + Send;

    /// Download the finished video.
    ///
    /// Fails with [`GenerationError::AssetUnavailable`] unless the job has
    /// succeeded.
    fn download(&self, job: &Job) -> impl Future<Output = Result<Vec<u8>, GenerationError>> + Send;
}
