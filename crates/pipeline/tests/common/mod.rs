//! In-memory fakes for the generation service and the media tool.
//!
//! `MockClient` behaviour is keyed on the prompt:
//! - contains "fail": the job ends in `Failed`
//! - contains "stall": the job never leaves `Processing`
//! - contains "slow": each poll takes 50ms
//!
//! Downloaded clips contain `clip:{job_id}:{prompt}`. `MockMedia` treats a
//! clip whose content contains "corrupt" as undecodable.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scenechain_core::media::{ClipConcatenator, FrameExtractor, MediaError};
use scenechain_core::run_context::{ContinuityPolicy, RunContext};
use scenechain_core::types::JobId;
use scenechain_generation::client::GenerationClient;
use scenechain_generation::error::GenerationError;
use scenechain_generation::job::{GenerationRequest, Job, JobStatus};
use scenechain_generation::poll::PollConfig;
use scenechain_pipeline::assembler::SequenceAssembler;
use scenechain_pipeline::continuity::ContinuityPipeline;

// ---------------------------------------------------------------------------
// MockClient
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockClient {
    inner: Arc<ClientState>,
}

#[derive(Default)]
struct ClientState {
    submitted: Mutex<Vec<GenerationRequest>>,
    jobs: Mutex<HashMap<JobId, String>>,
}

impl MockClient {
    pub fn submitted(&self) -> Vec<GenerationRequest> {
        self.inner.submitted.lock().unwrap().clone()
    }
}

impl GenerationClient for MockClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<JobId, GenerationError> {
        request.validate()?;
        let mut submitted = self.inner.submitted.lock().unwrap();
        submitted.push(request.clone());
        let id = JobId::new(format!("job_{}", submitted.len()));
        self.inner
            .jobs
            .lock()
            .unwrap()
            .insert(id.clone(), request.prompt.clone());
        Ok(id)
    }

    async fn poll(&self, job_id: &JobId) -> Result<Job, GenerationError> {
        let prompt = self
            .inner
            .jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| GenerationError::NotFound(job_id.clone()))?;

        if prompt.contains("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let (status, error) = if prompt.contains("fail") {
            (JobStatus::Failed, Some("content policy violation".to_string()))
        } else if prompt.contains("stall") {
            (JobStatus::Processing, None)
        } else {
            (JobStatus::Succeeded, None)
        };

        Ok(Job {
            id: job_id.clone(),
            result_asset: (status == JobStatus::Succeeded).then(|| format!("mem://{job_id}")),
            prompt,
            reference_image: None,
            status,
            error,
        })
    }

    async fn download(&self, job: &Job) -> Result<Vec<u8>, GenerationError> {
        if job.status != JobStatus::Succeeded {
            return Err(GenerationError::AssetUnavailable {
                job_id: job.id.clone(),
                reason: "not finished".into(),
            });
        }
        Ok(format!("clip:{}:{}", job.id, job.prompt).into_bytes())
    }
}

// ---------------------------------------------------------------------------
// MockMedia
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockMedia {
    inner: Arc<MediaState>,
}

#[derive(Default)]
struct MediaState {
    unavailable: AtomicBool,
    block_extraction: AtomicBool,
    concat_calls: AtomicUsize,
}

impl MockMedia {
    /// Behave as if the media tool were not installed.
    pub fn unavailable(self) -> Self {
        self.inner.unavailable.store(true, Ordering::SeqCst);
        self
    }

    /// Make extraction wait until cancelled.
    pub fn blocking_extraction(self) -> Self {
        self.inner.block_extraction.store(true, Ordering::SeqCst);
        self
    }

    pub fn concat_calls(&self) -> usize {
        self.inner.concat_calls.load(Ordering::SeqCst)
    }
}

impl FrameExtractor for MockMedia {
    async fn extract_last_frame(
        &self,
        video: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(MediaError::Unavailable {
                tool: "ffmpeg".into(),
                reason: "not installed".into(),
            });
        }
        if self.inner.block_extraction.load(Ordering::SeqCst) {
            tokio::fs::write(output, b"partial").await?;
            cancel.cancelled().await;
            return Err(MediaError::Cancelled);
        }

        let content = tokio::fs::read_to_string(video).await?;
        if content.contains("corrupt") {
            return Err(MediaError::CorruptAsset {
                path: video.to_path_buf(),
                reason: "moov atom not found".into(),
            });
        }
        tokio::fs::write(output, format!("last-frame-of:{content}")).await?;
        Ok(output.to_path_buf())
    }
}

impl ClipConcatenator for MockMedia {
    async fn concat(
        &self,
        clips: &[PathBuf],
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(MediaError::Unavailable {
                tool: "ffmpeg".into(),
                reason: "not installed".into(),
            });
        }
        self.inner.concat_calls.fetch_add(1, Ordering::SeqCst);
        let mut joined = Vec::new();
        for clip in clips {
            joined.push(tokio::fs::read_to_string(clip).await?);
        }
        tokio::fs::write(output, joined.join("\n")).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn fast_polls() -> PollConfig {
    PollConfig::from_polls(Duration::from_millis(5), 10)
}

pub fn pipeline(client: &MockClient, media: &MockMedia) -> ContinuityPipeline<MockClient, MockMedia> {
    ContinuityPipeline::new(client.clone(), media.clone()).with_poll_config(fast_polls())
}

pub fn assembler(media: &MockMedia) -> SequenceAssembler<MockMedia> {
    SequenceAssembler::new(media.clone())
}

pub fn context(dir: &Path, policy: ContinuityPolicy) -> RunContext {
    RunContext::create(dir, None).with_policy(policy)
}

/// File names in `dir`, sorted.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
