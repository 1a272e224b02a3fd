//! Runtime configuration (spec §6 "Configuration"): one flat struct, one
//! TOML file, environment variables overriding individual keys - the same
//! "single struct, no framework" shape the teacher uses for its own
//! engine configuration, generalized from Wasm epoch/fuel limits to this
//! runtime's worker/timeout/cache knobs.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    4
}
fn default_job_timeout_ms() -> u64 {
    120_000
}
fn default_graceful_shutdown_ms() -> u64 {
    30_000
}
fn default_tool_kill_timeout_ms() -> u64 {
    10_000
}
fn default_replay_window_ms() -> u64 {
    60_000
}
fn default_max_replay_window_size() -> usize {
    10_000
}
fn default_awaiting_approval_warn_ms() -> u64 {
    600_000
}
fn default_claim_poll_ms() -> u64 {
    200
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanCacheConfig {
    pub max_entries: usize,
    pub ttl_ms: u64,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self { max_entries: 1000, ttl_ms: 86_400_000 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticCacheConfig {
    pub similarity_threshold: f32,
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self { similarity_threshold: 0.98, ttl_ms: 86_400_000, max_entries: 500 }
    }
}

/// Top-level configuration (spec §6's recognized option list, verbatim).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub workers: usize,
    pub job_timeout_ms: u64,
    pub graceful_shutdown_ms: u64,
    pub tool_kill_timeout_ms: u64,
    /// Warning-level diagnostic thresholds (spec §4.5 phase `axis_core`).
    /// `None` disables the corresponding check.
    pub min_disk_space_mb: Option<u64>,
    pub min_ram_mb: Option<u64>,
    pub replay_window_ms: u64,
    pub max_replay_window_size: usize,
    pub plan_cache: PlanCacheConfig,
    pub semantic_cache: SemanticCacheConfig,
    /// Age past which the watchdog logs an `awaiting_approval` Job as
    /// stuck (spec §4.4 "Watchdog"). Not named by spec §6's list; a
    /// reasonable operational default.
    pub awaiting_approval_warn_ms: u64,
    /// Poll interval for an empty queue (spec §4.4: "blocking with poll
    /// interval if empty").
    pub claim_poll_ms: u64,
    pub data_dir: String,
    pub required_port: Option<u16>,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            job_timeout_ms: default_job_timeout_ms(),
            graceful_shutdown_ms: default_graceful_shutdown_ms(),
            tool_kill_timeout_ms: default_tool_kill_timeout_ms(),
            min_disk_space_mb: None,
            min_ram_mb: None,
            replay_window_ms: default_replay_window_ms(),
            max_replay_window_size: default_max_replay_window_size(),
            plan_cache: PlanCacheConfig::default(),
            semantic_cache: SemanticCacheConfig::default(),
            awaiting_approval_warn_ms: default_awaiting_approval_warn_ms(),
            claim_poll_ms: default_claim_poll_ms(),
            data_dir: "./data".to_string(),
            required_port: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl AxisConfig {
    /// Loads from a TOML file (if present) and layers environment variable
    /// overrides on top, `AXIS_`-prefixed, upper-snake-case (e.g.
    /// `AXIS_WORKERS`, `AXIS_JOB_TIMEOUT_MS`). Missing file is not an
    /// error - defaults apply.
    pub fn load(path: &Path, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => AxisConfig::default(),
            Err(source) => return Err(ConfigError::Read { path: path.display().to_string(), source }),
        };

        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        macro_rules! override_u64 {
            ($key:literal, $field:expr) => {
                if let Some(raw) = env.get($key) {
                    $field = raw.parse().map_err(|_| ConfigError::Invalid {
                        key: $key.to_string(),
                        message: format!("expected an integer, got {raw:?}"),
                    })?;
                }
            };
        }

        override_u64!("AXIS_WORKERS", self.workers);
        override_u64!("AXIS_JOB_TIMEOUT_MS", self.job_timeout_ms);
        override_u64!("AXIS_GRACEFUL_SHUTDOWN_MS", self.graceful_shutdown_ms);
        override_u64!("AXIS_TOOL_KILL_TIMEOUT_MS", self.tool_kill_timeout_ms);
        override_u64!("AXIS_REPLAY_WINDOW_MS", self.replay_window_ms);
        override_u64!("AXIS_MAX_REPLAY_WINDOW_SIZE", self.max_replay_window_size);
        override_u64!("AXIS_CLAIM_POLL_MS", self.claim_poll_ms);

        if let Some(raw) = env.get("AXIS_DATA_DIR") {
            self.data_dir = raw.clone();
        }
        if let Some(raw) = env.get("AXIS_MIN_DISK_SPACE_MB") {
            self.min_disk_space_mb =
                Some(raw.parse().map_err(|_| ConfigError::Invalid { key: "AXIS_MIN_DISK_SPACE_MB".into(), message: raw.clone() })?);
        }
        if let Some(raw) = env.get("AXIS_MIN_RAM_MB") {
            self.min_ram_mb =
                Some(raw.parse().map_err(|_| ConfigError::Invalid { key: "AXIS_MIN_RAM_MB".into(), message: raw.clone() })?);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid { key: "workers".into(), message: "must be at least 1".into() });
        }
        if self.job_timeout_ms == 0 {
            return Err(ConfigError::Invalid { key: "job_timeout_ms".into(), message: "must be greater than 0".into() });
        }
        Ok(())
    }
}
