//! `scenechain-worker` -- runs a scene script end to end.
//!
//! Reads a plain-text scene script, generates one clip per scene (each
//! starting from the last frame of the one before), and concatenates the
//! clips into `final_video.mp4` inside a fresh run workspace.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default              |
//! |---------------------------|----------|----------------------|
//! | `SORA_ENDPOINT`           | yes      | --                   |
//! | `SORA_API_KEY`            | yes      | --                   |
//! | `SORA_API_VERSION`        | no       | `2024-12-01-preview` |
//! | `SORA_MODEL`              | no       | `sora-2`             |
//! | `SORA_POLL_INTERVAL_SECS` | no       | `5`                  |
//! | `SORA_MAX_POLLS`          | no       | `60`                 |
//! | `SORA_OUTPUT_DIR`         | no       | `.`                  |
//! | `SCENE_SECONDS`           | no       | `12`                 |
//! | `CONTINUITY_POLICY`       | no       | `reset`              |
//! | `STARTER_IMAGE`           | no       | --                   |
//! | `SCENE_SCRIPT`            | no       | `video_script.txt`   |
//! | `RUN_TIMEOUT_SECS`        | no       | --                   |
//! | `FFMPEG_PATH`             | no       | `ffmpeg`             |
//! | `FFPROBE_PATH`            | no       | `ffprobe`            |
//! | `LOG_FORMAT`              | no       | `text`               |

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenechain_core::ffmpeg::FfmpegTool;
use scenechain_core::media::validate_reference_image;
use scenechain_core::run_context::RunContext;
use scenechain_core::workspace::Workspace;
use scenechain_generation::api::{SoraApi, SoraConfig};
use scenechain_pipeline::assembler::SequenceAssembler;
use scenechain_pipeline::config::PipelineConfig;
use scenechain_pipeline::continuity::ContinuityPipeline;
use scenechain_pipeline::error::PipelineError;
use scenechain_pipeline::events::EventBus;
use scenechain_pipeline::script::load_script;
use scenechain_pipeline::tools::{GenerateSceneArgs, RunSession, ToolCall, ToolError, ToolOutput};

use crate::config::{json_logs_requested, RunConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logs = json_logs_requested();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scenechain_worker=info,scenechain_pipeline=info,scenechain_generation=info"
                    .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let run = RunConfig::from_env()?;
    let sora = SoraConfig::from_env()?;
    let pipeline_config = PipelineConfig::from_env()?;

    let scenes = load_script(&run.script_path)
        .await
        .with_context(|| format!("cannot read scene script {}", run.script_path.display()))?;
    if scenes.is_empty() {
        bail!("scene script {} has no scenes", run.script_path.display());
    }

    if let Some(starter) = &run.starter_image {
        validate_reference_image(starter)?;
        if !tokio::fs::try_exists(starter).await? {
            bail!("starter image {} does not exist", starter.display());
        }
    }

    let workspace = Workspace::create_timestamped(&run.output_dir)
        .await
        .context("cannot create run workspace")?;
    let context = RunContext::from_workspace(workspace, run.starter_image.clone())
        .with_policy(pipeline_config.policy);

    tracing::info!(
        run_id = %context.run_id(),
        workspace = %context.workspace_root().display(),
        scenes = scenes.len(),
        policy = ?context.policy(),
        endpoint = %sora.endpoint,
        "Starting scenechain-worker",
    );

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(cancel.clone(), run.run_timeout);

    let bus = Arc::new(EventBus::default());
    spawn_event_logger(&bus, cancel.clone());

    let ffmpeg = FfmpegTool::from_env();
    let pipeline = ContinuityPipeline::new(SoraApi::new(sora), ffmpeg.clone())
        .with_config(&pipeline_config)
        .with_events(Arc::clone(&bus));
    let assembler = SequenceAssembler::new(ffmpeg).with_events(bus);
    let session = RunSession::new(pipeline, assembler, context, cancel.clone());

    let mut failure = None;
    for (ordinal, prompt) in scenes.into_iter().enumerate() {
        let call = ToolCall::GenerateScene(GenerateSceneArgs {
            prompt,
            seconds: None,
            filename_hint: None,
            remix: false,
        });
        match session.dispatch(call).await {
            Ok(ToolOutput::Scene { sequence_index, .. }) => {
                tracing::debug!(ordinal, sequence_index, "Scene done");
            }
            Ok(_) => {}
            Err(ToolError::Scene(PipelineError::Cancelled)) => {
                tracing::warn!(ordinal, "Run cancelled, not assembling");
                bail!("run cancelled after {} scene(s)", session.context().len());
            }
            Err(e) => {
                // Later scenes would lose their visual anchor; stop here.
                tracing::error!(ordinal, error = %e, "Scene failed, stopping generation");
                failure = Some(e);
                break;
            }
        }
    }

    if session.context().is_empty() {
        bail!(
            "no scenes were generated: {}",
            failure.map(|e| e.to_string()).unwrap_or_default()
        );
    }

    let final_video = session.assemble().await?;
    tracing::info!(
        path = %final_video.display(),
        clips = session.context().len(),
        "Final video ready",
    );
    cancel.cancel();

    match failure {
        Some(e) => Err(anyhow::Error::new(e).context("run incomplete; assembled the scenes generated so far")),
        None => Ok(()),
    }
}

/// Cancel the run on SIGINT/SIGTERM or after the optional deadline.
fn spawn_cancel_triggers(cancel: CancellationToken, run_timeout: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => on_signal.cancel(),
            () = on_signal.cancelled() => {}
        }
    });

    if let Some(timeout) = run_timeout {
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "Run deadline reached, cancelling");
                    cancel.cancel();
                }
                () = cancel.cancelled() => {}
            }
        });
    }
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), cancelling run");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, cancelling run");
        }
    }
}

/// Mirror pipeline events into the log as JSON at debug level.
fn spawn_event_logger(bus: &EventBus, cancel: CancellationToken) {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => tracing::debug!(event = %json, "Pipeline event"),
                        Err(e) => tracing::warn!(error = %e, "Unserializable pipeline event"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Event logger lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                () = cancel.cancelled() => break,
            }
        }
    });
}
