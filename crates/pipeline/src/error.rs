use std::path::PathBuf;

use scenechain_generation::error::GenerationError;

/// Errors from generating a single scene.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The scene could not be produced. `position` is `None` when the
    /// request was rejected before a slot was reserved.
    #[error("Scene {} ({prompt:?}) failed: {source}", position_label(.position))]
    Scene {
        position: Option<u64>,
        prompt: String,
        #[source]
        source: GenerationError,
    },

    #[error("Failed to write clip {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scene generation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The underlying generation failure, if this is a scene failure.
    pub fn generation_error(&self) -> Option<&GenerationError> {
        match self {
            Self::Scene { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn position_label(position: &Option<u64>) -> String {
    match position {
        Some(p) => format!("#{p}"),
        None => "(unscheduled)".to_string(),
    }
}

/// Errors from concatenating a run's clips.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// The run has no clips. Nothing was written.
    #[error("Nothing to assemble: the run has no clips")]
    EmptySequence,

    #[error("Assembly failed: clip {} is missing", .0.display())]
    MissingClip(PathBuf),

    #[error("Assembly failed: {reason}")]
    Failed { reason: String },

    #[error("Assembly cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_error_mentions_position_and_prompt() {
        let err = PipelineError::Scene {
            position: Some(2),
            prompt: "harbor".into(),
            source: GenerationError::InvalidRequest("nope".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("#2"), "{msg}");
        assert!(msg.contains("\"harbor\""), "{msg}");
        assert!(err.generation_error().is_some());
    }

    #[test]
    fn unscheduled_scene_error() {
        let err = PipelineError::Scene {
            position: None,
            prompt: String::new(),
            source: GenerationError::InvalidRequest("empty".into()),
        };
        assert!(err.to_string().contains("(unscheduled)"));
        assert!(PipelineError::Cancelled.generation_error().is_none());
    }
}
