//! Plain-text scene scripts.
//!
//! Lines starting with `#` are comments. Scenes are separated by blank
//! lines, and the lines of one scene are joined with single spaces:
//!
//! ```text
//! # Act one
//! A lighthouse on a cliff at dusk,
//! waves crashing below.
//!
//! The keeper climbs the spiral stairs.
//! ```

use std::path::Path;

/// Split script text into scene prompts.
pub fn parse_script(text: &str) -> Vec<String> {
    let mut scenes = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            if !current.is_empty() {
                scenes.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        scenes.push(current.join(" "));
    }
    scenes
}

/// Read and parse a scene script from disk.
pub async fn load_script(path: &Path) -> std::io::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    let scenes = parse_script(&text);
    tracing::debug!(path = %path.display(), scenes = scenes.len(), "Loaded scene script");
    Ok(scenes)
}
