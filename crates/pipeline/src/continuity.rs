//! One prompt in, one clip out, conditioned on the previous clip.
//!
//! [`ContinuityPipeline::generate_scene`] reads the run's continuity
//! reference, submits a generation job with it, waits for the job, stores
//! the clip in the run workspace, extracts the clip's last frame and
//! publishes the clip. A missing frame never fails the scene; it only
//! breaks the visual chain for the next one.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scenechain_core::media::{FrameExtractor, MediaError};
use scenechain_core::run_context::{Clip, RunContext};
use scenechain_generation::client::GenerationClient;
use scenechain_generation::error::GenerationError;
use scenechain_generation::job::{ClipDuration, GenerationRequest};
use scenechain_generation::poll::{await_completion, PollConfig};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::events::{EventBus, EventKind, PipelineEvent};

// ---------------------------------------------------------------------------
// SceneRequest
// ---------------------------------------------------------------------------

/// What to generate for one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRequest {
    pub prompt: String,
    /// Overrides the pipeline's default duration.
    pub duration: Option<ClipDuration>,
    /// Readable part of the clip filename. Defaults to `scene`.
    pub filename_hint: Option<String>,
    /// Remix the previous clip's job instead of starting from its last
    /// frame.
    pub remix: bool,
}

impl SceneRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: None,
            filename_hint: None,
            remix: false,
        }
    }

    pub fn with_duration(mut self, duration: ClipDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_filename_hint(mut self, hint: impl Into<String>) -> Self {
        self.filename_hint = Some(hint.into());
        self
    }

    pub fn with_remix(mut self, remix: bool) -> Self {
        self.remix = remix;
        self
    }
}

impl From<&str> for SceneRequest {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for SceneRequest {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

// ---------------------------------------------------------------------------
// ContinuityPipeline
// ---------------------------------------------------------------------------

/// Generates scenes for a run, chaining each to the last frame of the
/// previously published clip.
pub struct ContinuityPipeline<C, F> {
    client: C,
    extractor: F,
    poll: PollConfig,
    default_duration: ClipDuration,
    events: Option<Arc<EventBus>>,
}

impl<C, F> ContinuityPipeline<C, F>
where
    C: GenerationClient,
    F: FrameExtractor,
{
    pub fn new(client: C, extractor: F) -> Self {
        Self {
            client,
            extractor,
            poll: PollConfig::default(),
            default_duration: ClipDuration::default(),
            events: None,
        }
    }

    /// Apply polling and duration settings from a [`PipelineConfig`].
    ///
    /// The continuity policy lives on the [`RunContext`] and is not read
    /// here.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.poll = config.poll;
        self.default_duration = config.default_duration;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generate one scene and publish it into `context`.
    ///
    /// Empty prompts, and remix requests with no previous clip, are
    /// rejected before anything is submitted or recorded. Generation
    /// failures are returned as [`PipelineError::Scene`] and leave
    /// `context` unchanged. Cancellation at any await point returns
    /// [`PipelineError::Cancelled`], removes any clip file this call wrote,
    /// and also leaves `context` unchanged. That holds until every earlier
    /// scene has been published or abandoned; from then on the clip is
    /// committed and cancellation no longer withdraws it.
    pub async fn generate_scene(
        &self,
        context: &RunContext,
        request: impl Into<SceneRequest>,
        cancel: &CancellationToken,
    ) -> Result<Clip, PipelineError> {
        let request = request.into();
        let generation = self.build_request(context, &request)?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let ticket = context.reserve_slot();
        let position = ticket.position();
        let scene_err = |source: GenerationError| match source {
            GenerationError::Cancelled => PipelineError::Cancelled,
            source => PipelineError::Scene {
                position: Some(position),
                prompt: request.prompt.clone(),
                source,
            },
        };

        // -- submit and wait --
        let job_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            submitted = self.client.submit(&generation) => submitted.map_err(scene_err)?,
        };
        self.emit(
            context,
            EventKind::SceneSubmitted {
                position,
                job_id: job_id.clone(),
                with_reference: generation.reference_image.is_some(),
                remix: generation.remix_of.is_some(),
            },
        );
        tracing::info!(
            run_id = %context.run_id(),
            position,
            job_id = %job_id,
            "Scene submitted",
        );

        let job = await_completion(&self.client, &job_id, &self.poll, cancel)
            .await
            .map_err(|e| {
                if !matches!(e, GenerationError::Cancelled) {
                    tracing::error!(position, job_id = %job_id, error = %e, "Scene generation failed");
                }
                scene_err(e)
            })?;

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            downloaded = self.client.download(&job) => downloaded.map_err(scene_err)?,
        };

        // -- persist --
        let hint = request.filename_hint.as_deref().unwrap_or_default();
        let clip_path = context.workspace().clip_path(position, hint);
        if let Err(source) = tokio::fs::write(&clip_path, &bytes).await {
            discard(&[clip_path.as_path()]).await;
            return Err(PipelineError::Persist {
                path: clip_path,
                source,
            });
        }

        // -- continuity frame --
        let frame_path = context.workspace().frame_path(position);
        let reference_frame = match self
            .extractor
            .extract_last_frame(&clip_path, &frame_path, cancel)
            .await
        {
            Ok(frame) => Some(frame),
            Err(MediaError::Cancelled) => {
                discard(&[clip_path.as_path(), frame_path.as_path()]).await;
                return Err(PipelineError::Cancelled);
            }
            Err(e) => {
                tracing::warn!(
                    position,
                    path = %clip_path.display(),
                    error = %e,
                    policy = ?context.policy(),
                    "Could not extract continuity frame, continuing without it",
                );
                self.emit(
                    context,
                    EventKind::ContinuityDegraded {
                        position,
                        video: clip_path.clone(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        };

        // -- publish --
        // Stay cancellable while earlier scenes are still in flight. Once
        // `commit` runs the clip is part of the sequence.
        let cancelled = tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            () = ticket.wait_turn() => cancel.is_cancelled(),
        };
        if cancelled {
            let mut written = vec![clip_path.as_path()];
            if let Some(frame) = &reference_frame {
                written.push(frame.as_path());
            }
            discard(&written).await;
            return Err(PipelineError::Cancelled);
        }

        let clip = ticket
            .commit(clip_path, reference_frame, Some(job_id))
            .await;

        tracing::info!(
            run_id = %context.run_id(),
            position,
            sequence_index = clip.sequence_index,
            path = %clip.video_asset_path.display(),
            has_reference = clip.reference_frame_path.is_some(),
            "Scene completed",
        );
        self.emit(
            context,
            EventKind::SceneCompleted {
                position,
                sequence_index: clip.sequence_index,
                video: clip.video_asset_path.clone(),
                reference_frame: clip.reference_frame_path.clone(),
            },
        );
        Ok(clip)
    }

    /// Turn a scene request into a validated generation request using the
    /// context's current reference or last job.
    fn build_request(
        &self,
        context: &RunContext,
        request: &SceneRequest,
    ) -> Result<GenerationRequest, PipelineError> {
        let unscheduled = |source: GenerationError| PipelineError::Scene {
            position: None,
            prompt: request.prompt.clone(),
            source,
        };

        let mut generation = GenerationRequest::new(request.prompt.trim())
            .with_duration(request.duration.unwrap_or(self.default_duration));

        if request.remix {
            let previous = context.last_job_id().ok_or_else(|| {
                unscheduled(GenerationError::InvalidRequest(
                    "there is no previous clip to remix".to_string(),
                ))
            })?;
            generation = generation.with_remix_of(Some(previous));
        } else {
            generation = generation.with_reference(context.current_reference());
        }

        generation.validate().map_err(unscheduled)?;
        Ok(generation)
    }

    fn emit(&self, context: &RunContext, kind: EventKind) {
        if let Some(bus) = &self.events {
            bus.publish(PipelineEvent::new(context.run_id(), kind));
        }
    }
}

/// Best-effort removal of files written by a cancelled scene.
async fn discard(paths: &[&Path]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed partial scene output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial scene output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_request_from_prompt() {
        let req: SceneRequest = "a harbor at dawn".into();
        assert_eq!(req.prompt, "a harbor at dawn");
        assert!(req.duration.is_none());
        assert!(!req.remix);
    }

    #[test]
    fn scene_request_builder() {
        let req = SceneRequest::new("p")
            .with_duration(ClipDuration::Four)
            .with_filename_hint("intro")
            .with_remix(true);
        assert_eq!(req.duration, Some(ClipDuration::Four));
        assert_eq!(req.filename_hint.as_deref(), Some("intro"));
        assert!(req.remix);
    }
}
