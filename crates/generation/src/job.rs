//! Generation job model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use scenechain_core::media::validate_reference_image;
use scenechain_core::types::JobId;

use crate::error::GenerationError;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Map a status string reported by the service.
    ///
    /// Unknown strings are treated as still processing so that polling
    /// continues until the deadline.
    pub fn from_service(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => Self::Queued,
            "in_progress" | "processing" | "running" | "preprocessing" => Self::Processing,
            "succeeded" | "completed" => Self::Succeeded,
            "failed" | "error" | "cancelled" | "canceled" => Self::Failed,
            other => {
                tracing::warn!(status = %other, "Unknown job status from service");
                Self::Processing
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Snapshot of a job as last reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub prompt: String,
    pub reference_image: Option<PathBuf>,
    pub status: JobStatus,
    /// Where the finished video can be downloaded from.
    pub result_asset: Option<String>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// ClipDuration
// ---------------------------------------------------------------------------

/// Clip lengths the service accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ClipDuration {
    Four,
    Eight,
    #[default]
    Twelve,
}

impl ClipDuration {
    pub fn seconds(self) -> u32 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
            Self::Twelve => 12,
        }
    }
}

impl TryFrom<u32> for ClipDuration {
    type Error = GenerationError;

    fn try_from(seconds: u32) -> Result<Self, Self::Error> {
        match seconds {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            12 => Ok(Self::Twelve),
            other => Err(GenerationError::InvalidRequest(format!(
                "'seconds' must be 4, 8, or 12. Got: {other}"
            ))),
        }
    }
}

impl From<ClipDuration> for u32 {
    fn from(d: ClipDuration) -> Self {
        d.seconds()
    }
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// Parameters for one generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration: ClipDuration,
    /// Still image the clip should start from.
    pub reference_image: Option<PathBuf>,
    /// Earlier job to remix instead of starting from an image.
    pub remix_of: Option<JobId>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: ClipDuration::default(),
            reference_image: None,
            remix_of: None,
        }
    }

    pub fn with_duration(mut self, duration: ClipDuration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_reference(mut self, reference: Option<PathBuf>) -> Self {
        self.reference_image = reference;
        self
    }

    pub fn with_remix_of(mut self, job_id: Option<JobId>) -> Self {
        self.remix_of = job_id;
        self
    }

    /// Reject requests the service would refuse.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "the prompt cannot be empty".to_string(),
            ));
        }
        if self.remix_of.is_some() && self.reference_image.is_some() {
            return Err(GenerationError::InvalidRequest(
                "a remix cannot also carry a reference image".to_string(),
            ));
        }
        if let Some(reference) = &self.reference_image {
            validate_reference_image(reference)
                .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?;
        }
        Ok(())
    }
}
