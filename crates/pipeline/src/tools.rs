//! Named operations for an external planner.
//!
//! A planner (typically a language model with tool calling) sees the
//! [`descriptors`] and sends back [`ToolCall`]s as
//! `{"name": "...", "arguments": {...}}`. A [`RunSession`] executes them
//! against one run and answers with a serializable [`ToolOutput`] or a
//! [`ToolError`] whose message can be shown to the planner as is.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use scenechain_core::media::{ClipConcatenator, FrameExtractor};
use scenechain_core::run_context::{Clip, RunContext};
use scenechain_core::types::JobId;
use scenechain_generation::client::GenerationClient;
use scenechain_generation::job::ClipDuration;

use crate::assembler::SequenceAssembler;
use crate::continuity::{ContinuityPipeline, SceneRequest};
use crate::error::{AssemblyError, PipelineError};

pub const GENERATE_SCENE: &str = "generate_scene";
pub const ASSEMBLE: &str = "assemble";

// ---------------------------------------------------------------------------
// Calls and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    GenerateScene(GenerateSceneArgs),
    Assemble(AssembleArgs),
}

impl ToolCall {
    /// Parse a call from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, ToolError> {
        serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateSceneArgs {
    pub prompt: String,
    /// 4, 8 or 12.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<ClipDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_hint: Option<String>,
    #[serde(default)]
    pub remix: bool,
}

impl From<GenerateSceneArgs> for SceneRequest {
    fn from(args: GenerateSceneArgs) -> Self {
        SceneRequest {
            prompt: args.prompt,
            duration: args.seconds,
            filename_hint: args.filename_hint,
            remix: args.remix,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembleArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    Scene {
        sequence_index: u32,
        video_path: PathBuf,
        reference_frame_path: Option<PathBuf>,
        job_id: Option<JobId>,
    },
    Assembled {
        final_video_path: PathBuf,
        clips: usize,
    },
}

impl From<Clip> for ToolOutput {
    fn from(clip: Clip) -> Self {
        Self::Scene {
            sequence_index: clip.sequence_index,
            video_path: clip.video_asset_path,
            reference_frame_path: clip.reference_frame_path,
            job_id: clip.job_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid tool call: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Scene(#[from] PipelineError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Name, purpose and JSON-schema parameters of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// Every tool a [`RunSession`] can execute.
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: GENERATE_SCENE,
            description: "Generate the next scene of the video. The scene starts from the \
                          last frame of the previous scene so the shots connect visually.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "What happens in this scene."
                    },
                    "seconds": {
                        "type": "integer",
                        "enum": [4, 8, 12],
                        "description": "Clip length in seconds."
                    },
                    "filename_hint": {
                        "type": "string",
                        "description": "Short label used in the clip filename."
                    },
                    "remix": {
                        "type": "boolean",
                        "description": "Remix the previous scene instead of continuing from its last frame."
                    }
                },
                "required": ["prompt"]
            }),
        },
        ToolDescriptor {
            name: ASSEMBLE,
            description: "Join every generated scene, in order, into the final video.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
    ]
}

// ---------------------------------------------------------------------------
// RunSession
// ---------------------------------------------------------------------------

/// One run plus everything needed to act on it.
pub struct RunSession<C, F, M> {
    pipeline: ContinuityPipeline<C, F>,
    assembler: SequenceAssembler<M>,
    context: RunContext,
    cancel: CancellationToken,
}

impl<C, F, M> RunSession<C, F, M>
where
    C: GenerationClient,
    F: FrameExtractor,
    M: ClipConcatenator,
{
    pub fn new(
        pipeline: ContinuityPipeline<C, F>,
        assembler: SequenceAssembler<M>,
        context: RunContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            assembler,
            context,
            cancel,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute a parsed call.
    pub async fn dispatch(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        tracing::debug!(run_id = %self.context.run_id(), ?call, "Dispatching tool call");
        match call {
            ToolCall::GenerateScene(args) => Ok(self.generate_scene(args).await?.into()),
            ToolCall::Assemble(_) => {
                let final_video_path = self.assemble().await?;
                Ok(ToolOutput::Assembled {
                    final_video_path,
                    clips: self.context.len(),
                })
            }
        }
    }

    /// Parse and execute a call given as JSON.
    pub async fn dispatch_json(&self, raw: &str) -> Result<ToolOutput, ToolError> {
        self.dispatch(ToolCall::from_json(raw)?).await
    }

    pub async fn generate_scene(
        &self,
        request: impl Into<SceneRequest>,
    ) -> Result<Clip, PipelineError> {
        self.pipeline
            .generate_scene(&self.context, request, &self.cancel)
            .await
    }

    pub async fn assemble(&self) -> Result<PathBuf, AssemblyError> {
        self.assembler.assemble(&self.context, &self.cancel).await
    }
}
