//! FFmpeg/FFprobe command wrappers.
//!
//! [`FfmpegTool`] implements [`FrameExtractor`] and [`ClipConcatenator`] by
//! shelling out to the `ffmpeg` and `ffprobe` binaries. Neither operation
//! re-encodes video: extraction decodes only the tail of the clip and
//! concatenation stream-copies.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::media::{render_concat_list, ClipConcatenator, FrameExtractor, MediaError};
use crate::naming::PARTS_LIST_FILENAME;
use crate::subprocess::{run_tool, ToolOutput};

/// Seconds before the end of the clip where last-frame decoding starts.
const LAST_FRAME_SEEK_SECS: &str = "-1";

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: Option<FfprobeFormat>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// FfmpegTool
// ---------------------------------------------------------------------------

/// Handle on the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve binaries from `FFMPEG_PATH` / `FFPROBE_PATH`, falling back
    /// to `ffmpeg` / `ffprobe` on `PATH`.
    pub fn from_env() -> Self {
        let ffmpeg = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".into());
        let ffprobe = std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".into());
        Self::new(ffmpeg, ffprobe)
    }

    /// Run `ffprobe` on a video file and return the parsed JSON output.
    ///
    /// A probe that exits non-zero or prints unparseable JSON means the file
    /// cannot be decoded and is reported as [`MediaError::CorruptAsset`].
    pub async fn probe_video(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<FfprobeOutput, MediaError> {
        if !path.exists() {
            return Err(MediaError::AssetNotFound(path.to_path_buf()));
        }

        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path);

        let output = run_tool(&mut cmd, cancel).await?;
        if !output.success {
            return Err(MediaError::CorruptAsset {
                path: path.to_path_buf(),
                reason: stderr_or_exit(&output),
            });
        }

        serde_json::from_str::<FfprobeOutput>(&output.stdout).map_err(|e| {
            MediaError::CorruptAsset {
                path: path.to_path_buf(),
                reason: format!("unparseable ffprobe output: {e}"),
            }
        })
    }
}

impl FrameExtractor for FfmpegTool {
    async fn extract_last_frame(
        &self,
        video: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let probe = self.probe_video(video, cancel).await?;
        if first_video_stream(&probe).is_none() {
            return Err(MediaError::CorruptAsset {
                path: video.to_path_buf(),
                reason: "no video stream".to_string(),
            });
        }

        // `-update 1` keeps overwriting the same image, so the last decoded
        // frame is what remains on disk.
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-sseof", LAST_FRAME_SEEK_SECS, "-i"])
            .arg(video)
            .args(["-update", "1", "-q:v", "2"])
            .arg(output);

        let result = run_tool(&mut cmd, cancel).await?;
        if !result.success {
            return Err(MediaError::CorruptAsset {
                path: video.to_path_buf(),
                reason: stderr_or_exit(&result),
            });
        }
        if !output.exists() {
            return Err(MediaError::CorruptAsset {
                path: video.to_path_buf(),
                reason: "ffmpeg produced no frame".to_string(),
            });
        }

        tracing::debug!(
            video = %video.display(),
            frame = %output.display(),
            duration_secs = parse_duration(&probe),
            "Extracted last frame",
        );
        Ok(output.to_path_buf())
    }
}

impl ClipConcatenator for FfmpegTool {
    async fn concat(
        &self,
        clips: &[PathBuf],
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        let list_path = output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(PARTS_LIST_FILENAME);
        // The concat demuxer resolves relative entries against the list's
        // own directory, not the working directory.
        let clips = clips
            .iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?;
        tokio::fs::write(&list_path, render_concat_list(&clips)).await?;

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy", "-y"])
            .arg(output);

        let result = run_tool(&mut cmd, cancel).await?;
        if !result.success {
            return Err(MediaError::ToolFailed {
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        tracing::debug!(
            clips = clips.len(),
            output = %output.display(),
            duration_ms = result.duration_ms,
            "Concatenated clips",
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn stderr_or_exit(output: &ToolOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit code {:?}", output.exit_code)
    } else {
        stderr.to_string()
    }
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok());
    if let Some(secs) = format_duration {
        return secs;
    }
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}
