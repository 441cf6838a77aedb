//! Stitches a run's clips into one video.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scenechain_core::media::{ClipConcatenator, MediaError};
use scenechain_core::run_context::RunContext;

use crate::error::AssemblyError;
use crate::events::{EventBus, EventKind, PipelineEvent};

/// Concatenates the clips of a [`RunContext`] in `sequence_index` order.
pub struct SequenceAssembler<M> {
    concatenator: M,
    events: Option<Arc<EventBus>>,
}

impl<M: ClipConcatenator> SequenceAssembler<M> {
    pub fn new(concatenator: M) -> Self {
        Self {
            concatenator,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Write the run's final video into its workspace and return the path.
    ///
    /// Fails with [`AssemblyError::EmptySequence`] before touching the
    /// filesystem when there are no clips, and with
    /// [`AssemblyError::MissingClip`] if any clip file has disappeared.
    /// Calling it again overwrites the previous output with the same
    /// ordering.
    pub async fn assemble(
        &self,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, AssemblyError> {
        let clips = context.ordered_clips();
        if clips.is_empty() {
            return Err(AssemblyError::EmptySequence);
        }

        let mut paths = Vec::with_capacity(clips.len());
        for clip in &clips {
            let exists = tokio::fs::try_exists(&clip.video_asset_path)
                .await
                .map_err(|e| AssemblyError::Failed {
                    reason: format!(
                        "cannot check clip {}: {e}",
                        clip.video_asset_path.display()
                    ),
                })?;
            if !exists {
                return Err(AssemblyError::MissingClip(clip.video_asset_path.clone()));
            }
            paths.push(clip.video_asset_path.clone());
        }

        let output = context.workspace().final_video_path();
        tracing::info!(
            run_id = %context.run_id(),
            clips = paths.len(),
            output = %output.display(),
            "Assembling final video",
        );

        self.concatenator
            .concat(&paths, &output, cancel)
            .await
            .map_err(|e| {
                let err = assembly_error(e);
                if !matches!(err, AssemblyError::Cancelled) {
                    tracing::error!(error = %err, "Assembly failed");
                }
                err
            })?;

        if let Some(bus) = &self.events {
            bus.publish(PipelineEvent::new(
                context.run_id(),
                EventKind::AssemblyCompleted {
                    clips: paths.len(),
                    output: output.clone(),
                },
            ));
        }
        Ok(output)
    }
}

fn assembly_error(e: MediaError) -> AssemblyError {
    match e {
        MediaError::Cancelled => AssemblyError::Cancelled,
        MediaError::Unavailable { tool, reason } => AssemblyError::Failed {
            reason: format!("{tool} is not installed or not on PATH ({reason})"),
        },
        MediaError::ToolFailed { exit_code, stderr } => AssemblyError::Failed {
            reason: format!("concatenation exited with {exit_code:?}: {stderr}"),
        },
        other => AssemblyError::Failed {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_tool_reason_names_the_tool() {
        let err = assembly_error(MediaError::Unavailable {
            tool: "ffmpeg".into(),
            reason: "No such file or directory".into(),
        });
        assert_matches!(err, AssemblyError::Failed { reason } if reason.contains("ffmpeg is not installed"));
    }

    #[test]
    fn cancellation_is_preserved() {
        assert_matches!(assembly_error(MediaError::Cancelled), AssemblyError::Cancelled);
    }
}
