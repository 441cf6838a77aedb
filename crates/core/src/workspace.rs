//! Per-run output directory.
//!
//! A [`Workspace`] is created once per run and written exclusively by that
//! run. It holds the scene clips, continuity frames, the concat list and
//! the assembled video.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::naming::{
    continuity_frame_filename, scene_clip_filename, FINAL_VIDEO_FILENAME, PARTS_LIST_FILENAME,
};

/// Subdirectory of the output base that collects all run workspaces.
pub const PROJECTS_DIR: &str = "video_projects";

/// Upper bound on same-second collision suffixes tried by
/// [`Workspace::create_timestamped`].
const MAX_COLLISION_SUFFIX: u32 = 100;

/// Root directory of a single run plus the naming rules for its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Wrap an existing directory. Nothing is created on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create `{base_dir}/video_projects/video_project_{YYYYmmdd_HHMMSS}`.
    ///
    /// If another run already claimed the directory for the same second, a
    /// numeric suffix (`_1`, `_2`, ...) is appended so two runs never share
    /// a workspace. The returned root is always absolute.
    pub async fn create_timestamped(base_dir: &Path) -> std::io::Result<Self> {
        let parent = std::path::absolute(base_dir)?.join(PROJECTS_DIR);
        tokio::fs::create_dir_all(&parent).await?;

        let stem = format!("video_project_{}", Utc::now().format("%Y%m%d_%H%M%S"));

        for attempt in 0..MAX_COLLISION_SUFFIX {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}_{attempt}")
            };
            let candidate = parent.join(name);
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => {
                    tracing::info!(path = %candidate.display(), "Run workspace created");
                    return Ok(Self { root: candidate });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free workspace name under {}", parent.display()),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the clip for the scene at `position` is persisted.
    pub fn clip_path(&self, position: u64, hint: &str) -> PathBuf {
        self.root.join(scene_clip_filename(position, hint))
    }

    /// Where the continuity frame for the scene at `position` is written.
    pub fn frame_path(&self, position: u64) -> PathBuf {
        self.root.join(continuity_frame_filename(position))
    }

    pub fn final_video_path(&self) -> PathBuf {
        self.root.join(FINAL_VIDEO_FILENAME)
    }

    pub fn parts_list_path(&self) -> PathBuf {
        self.root.join(PARTS_LIST_FILENAME)
    }
}
