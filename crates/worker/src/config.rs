//! Per-run settings for the worker binary.

use std::path::PathBuf;
use std::time::Duration;

use scenechain_core::config::{env_optional, parse_value, ConfigError};

pub const DEFAULT_SCRIPT_PATH: &str = "video_script.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Absolute base directory; run workspaces go under
    /// `{output_dir}/video_projects/`.
    pub output_dir: PathBuf,
    pub starter_image: Option<PathBuf>,
    pub script_path: PathBuf,
    /// Cancel the whole run after this long.
    pub run_timeout: Option<Duration>,
}

impl RunConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default            |
    /// |--------------------|--------------------|
    /// | `SORA_OUTPUT_DIR`  | `.`                |
    /// | `STARTER_IMAGE`    | none               |
    /// | `SCENE_SCRIPT`     | `video_script.txt` |
    /// | `RUN_TIMEOUT_SECS` | none               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: output_dir(env_optional("SORA_OUTPUT_DIR").as_deref().unwrap_or("."))?,
            starter_image: env_optional("STARTER_IMAGE").map(PathBuf::from),
            script_path: env_optional("SCENE_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_PATH)),
            run_timeout: env_optional("RUN_TIMEOUT_SECS")
                .map(|raw| run_timeout(&raw))
                .transpose()?,
        })
    }
}

/// `LOG_FORMAT=json` switches the subscriber to JSON lines.
pub fn json_logs_requested() -> bool {
    env_optional("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Resolve the output base against the working directory.
fn output_dir(raw: &str) -> Result<PathBuf, ConfigError> {
    std::path::absolute(raw).map_err(|e| ConfigError::Invalid {
        var: "SORA_OUTPUT_DIR",
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn run_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_value("RUN_TIMEOUT_SECS", raw)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var: "RUN_TIMEOUT_SECS",
            value: raw.to_string(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
