use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Runtime configuration for the two execution contexts.
///
/// Stored as YAML on disk; missing files and missing fields fall back to the
/// defaults, so a bare `ChainRuntime::new()` needs no file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker pool thread count. Clamped to at least 1 at runtime build.
    pub worker_threads: usize,

    /// Name given to the worker pool threads.
    pub worker_thread_name: String,

    /// Name given to the UI event loop thread.
    pub ui_thread_name: String,

    /// Grace period for the worker pool when the runtime is dropped.
    pub shutdown_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            worker_thread_name: "hopchain-worker".to_string(),
            ui_thread_name: "hopchain-ui".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;

        let config: Self = serde_yaml_ng::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;

        tracing::info!("loaded runtime config from {}", path);
        Ok(config)
    }

    /// Save configuration as YAML.
    pub fn save<P: AsRef<Utf8Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let yaml = serde_yaml_ng::to_string(self).context("Failed to serialize config to YAML")?;
        fs::write(path, yaml).with_context(|| format!("Failed to write config file: {path}"))?;

        tracing::info!("saved runtime config to {}", path);
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
