//! Pipeline configuration stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Pipeline configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// match the shipped behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum fix attempts in stage 3 before a job is marked failed.
    pub max_attempts: u32,

    /// Per-invocation wall-clock budget for the external command, seconds.
    pub exec_timeout_secs: u64,

    /// How long the worker waits on the intake queue before re-checking the
    /// running flag, milliseconds.
    pub poll_interval_ms: u64,

    /// How long `stop` waits for the worker to exit before detaching it,
    /// seconds.
    pub stop_timeout_secs: u64,

    /// Truncate captured executor stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Argv of the external command. The instruction text is fed on stdin,
    /// never spliced into the argv.
    pub command: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "claude".to_string(),
                "--dangerously-skip-permissions".to_string(),
            ],
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            exec_timeout_secs: 30 * 60,
            poll_interval_ms: 1000,
            stop_timeout_secs: 10,
            output_limit_bytes: 100_000,
            executor: ExecutorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.exec_timeout_secs == 0 {
            return Err(anyhow!("exec_timeout_secs must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.executor.command.is_empty() || self.executor.command[0].trim().is_empty() {
            return Err(anyhow!("executor.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
