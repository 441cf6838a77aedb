//! Pipeline tuning read from the environment.

use std::time::Duration;

use scenechain_core::config::{env_optional, env_parse_or, parse_value, ConfigError};
use scenechain_core::run_context::ContinuityPolicy;
use scenechain_generation::job::ClipDuration;
use scenechain_generation::poll::{PollConfig, DEFAULT_MAX_POLLS};

/// Accepted range for `SORA_POLL_INTERVAL_SECS`.
pub const POLL_INTERVAL_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Settings shared by every scene of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineConfig {
    pub poll: PollConfig,
    /// Duration used when a scene does not ask for one.
    pub default_duration: ClipDuration,
    pub policy: ContinuityPolicy,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `SORA_POLL_INTERVAL_SECS` | `5`     |
    /// | `SORA_MAX_POLLS`          | `60`    |
    /// | `SCENE_SECONDS`           | `12`    |
    /// | `CONTINUITY_POLICY`       | `reset` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let interval = poll_interval(env_parse_or(
            "SORA_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?)?;
        let max_polls: u32 = env_parse_or("SORA_MAX_POLLS", DEFAULT_MAX_POLLS)?;
        if max_polls == 0 {
            return Err(ConfigError::Invalid {
                var: "SORA_MAX_POLLS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let default_duration = match env_optional("SCENE_SECONDS") {
            None => ClipDuration::default(),
            Some(raw) => clip_duration(&raw)?,
        };

        Ok(Self {
            poll: PollConfig::from_polls(interval, max_polls),
            default_duration,
            policy: env_parse_or("CONTINUITY_POLICY", ContinuityPolicy::default())?,
        })
    }
}

/// Validate a poll interval in seconds.
pub fn poll_interval(secs: u64) -> Result<Duration, ConfigError> {
    if POLL_INTERVAL_RANGE_SECS.contains(&secs) {
        Ok(Duration::from_secs(secs))
    } else {
        Err(ConfigError::Invalid {
            var: "SORA_POLL_INTERVAL_SECS",
            value: secs.to_string(),
            reason: format!(
                "must be between {} and {} seconds",
                POLL_INTERVAL_RANGE_SECS.start(),
                POLL_INTERVAL_RANGE_SECS.end()
            ),
        })
    }
}

fn clip_duration(raw: &str) -> Result<ClipDuration, ConfigError> {
    let secs: u32 = parse_value("SCENE_SECONDS", raw)?;
    ClipDuration::try_from(secs).map_err(|e| ConfigError::Invalid {
        var: "SCENE_SECONDS",
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn interval_bounds() {
        assert_eq!(poll_interval(1).unwrap(), Duration::from_secs(1));
        assert_eq!(poll_interval(30).unwrap(), Duration::from_secs(30));
        assert_matches!(poll_interval(0), Err(ConfigError::Invalid { .. }));
        assert_matches!(poll_interval(31), Err(ConfigError::Invalid { .. }));
    }

    #[test]
    fn scene_seconds_parsing() {
        assert_eq!(clip_duration("8").unwrap(), ClipDuration::Eight);
        assert_matches!(
            clip_duration("10"),
            Err(ConfigError::Invalid { var: "SCENE_SECONDS", .. })
        );
        assert_matches!(clip_duration("ten"), Err(ConfigError::Invalid { .. }));
    }

    #[test]
    fn defaults_match_service_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll.timeout, Duration::from_secs(300));
        assert_eq!(config.default_duration.seconds(), 12);
        assert_eq!(config.policy, ContinuityPolicy::Reset);
    }
}
