//! Media capabilities consumed by the pipeline.
//!
//! [`FrameExtractor`] and [`ClipConcatenator`] are the seams between the
//! pipeline and the external media tool. [`crate::ffmpeg::FfmpegTool`]
//! implements both; tests substitute in-memory fakes.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// Image formats the generation service accepts as a reference.
pub const SUPPORTED_REFERENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Errors from frame extraction, probing and concatenation.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The media tool is not installed or not on `PATH`.
    #[error("{tool} is not available: {reason}")]
    Unavailable { tool: String, reason: String },

    /// The asset exists but cannot be decoded.
    #[error("corrupt asset {}: {reason}", .path.display())]
    CorruptAsset { path: PathBuf, reason: String },

    /// The input asset does not exist.
    #[error("asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    /// The tool ran and exited unsuccessfully.
    #[error("media tool failed (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("media operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces the final displayed frame of a video as a still image.
pub trait FrameExtractor: Send + Sync {
    /// Write the last frame of `video` to `output` and return its path.
    ///
    /// Must be deterministic for an unmodified input.
    fn extract_last_frame(
        &self,
        video: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PathBuf, MediaError>> + Send;
}

/// Merges an ordered list of clips into one video without re-encoding.
pub trait ClipConcatenator: Send + Sync {
    /// Concatenate `clips` in the given order into `output`, overwriting it.
    fn concat(
        &self,
        clips: &[PathBuf],
        output: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;
}

/// Render an ffmpeg concat-demuxer list for `clips`, one `file '...'` line
/// per clip, in order.
///
/// Single quotes inside paths are escaped as `'\''`.
pub fn render_concat_list(clips: &[PathBuf]) -> String {
    let mut list = String::new();
    for clip in clips {
        let escaped = clip.to_string_lossy().replace('\'', r"'\''");
        list.push_str("file '");
        list.push_str(&escaped);
        list.push_str("'\n");
    }
    list
}

/// Check that `path` has an image extension the service accepts.
pub fn validate_reference_image(path: &Path) -> Result<(), CoreError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if SUPPORTED_REFERENCE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported reference image format '{}'. Must be one of: {}",
            path.display(),
            SUPPORTED_REFERENCE_EXTENSIONS.join(", ")
        )))
    }
}

/// MIME type for a reference image, derived from its extension.
pub fn reference_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
