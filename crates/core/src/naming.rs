//! Run workspace naming conventions.
//!
//! Generates deterministic filenames for scene clips and continuity
//! frames. Every name starts with a zero-padded scene position so that a
//! plain directory listing sorts in generation order.

/// Filename of the assembled output inside a run workspace.
pub const FINAL_VIDEO_FILENAME: &str = "final_video.mp4";
/// Filename of the ffmpeg concat list written during assembly.
pub const PARTS_LIST_FILENAME: &str = "parts_list.txt";
/// Fallback used when a filename hint sanitizes to nothing.
pub const DEFAULT_FILENAME_HINT: &str = "scene";
/// Longest filename hint accepted before truncation.
pub const MAX_FILENAME_HINT_CHARS: usize = 64;

/// Replace every character that is not alphanumeric, `-` or `_` with `_`.
///
/// Leading and trailing whitespace is dropped first. An empty result falls
/// back to [`DEFAULT_FILENAME_HINT`], and the result is capped at
/// [`MAX_FILENAME_HINT_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use scenechain_core::naming::sanitize_filename_fragment;
///
/// assert_eq!(sanitize_filename_fragment("Golden Hour!"), "Golden_Hour_");
/// assert_eq!(sanitize_filename_fragment("   "), "scene");
/// ```
pub fn sanitize_filename_fragment(fragment: &str) -> String {
    let cleaned: String = fragment
        .trim()
        .chars()
        .take(MAX_FILENAME_HINT_CHARS)
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        DEFAULT_FILENAME_HINT.to_string()
    } else {
        cleaned
    }
}

/// Clip filename for the scene at `position`.
///
/// Convention: `scene_{position:03}_{hint}.mp4`
///
/// ```
/// use scenechain_core::naming::scene_clip_filename;
///
/// assert_eq!(scene_clip_filename(0, "opening"), "scene_000_opening.mp4");
/// assert_eq!(scene_clip_filename(12, "a b"), "scene_012_a_b.mp4");
/// ```
pub fn scene_clip_filename(position: u64, hint: &str) -> String {
    format!(
        "scene_{position:03}_{}.mp4",
        sanitize_filename_fragment(hint)
    )
}

/// Continuity frame filename for the scene at `position`.
pub fn continuity_frame_filename(position: u64) -> String {
    format!("frame_{position:03}.jpg")
}
