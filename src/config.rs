use crate::error::{PipelineError, Result};
use crate::pipeline::{DEFAULT_CAPACITY, DEFAULT_IDLE_INTERVAL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_CAPACITY: &str = "PIPELINE_BUFFER_CAPACITY";
pub const ENV_IDLE_INTERVAL_MS: &str = "PIPELINE_IDLE_INTERVAL_MS";
pub const ENV_FLUSH_WHEN_FULL: &str = "PIPELINE_FLUSH_WHEN_FULL";
pub const ENV_CHANNEL_CAPACITY: &str = "PIPELINE_CHANNEL_CAPACITY";
pub const ENV_LOG_LEVEL: &str = "PIPELINE_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "LOG_FILE_PATH";

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub buffer: BufferConfig,
    /// Slots per inter-stage channel, `0` for rendezvous handoff
    pub channel_capacity: usize,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub idle_interval_ms: u64,
    pub flush_when_full: bool,
    pub drain_on_close: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Append log lines to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            channel_capacity: 0,
            log: LogConfig::default(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL.as_millis() as u64,
            flush_when_full: false,
            drain_on_close: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl BufferConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl PipelineConfig {
    /// Defaults, then the optional TOML file, then environment overrides.
    /// Not validated; call [`PipelineConfig::validate`] once all layers are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_CAPACITY) {
            self.buffer.capacity = parse_override(ENV_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_IDLE_INTERVAL_MS) {
            self.buffer.idle_interval_ms = parse_override(ENV_IDLE_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FLUSH_WHEN_FULL) {
            self.buffer.flush_when_full = parse_override(ENV_FLUSH_WHEN_FULL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
            self.channel_capacity = parse_override(ENV_CHANNEL_CAPACITY, &raw)?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        if let Some(file) = lookup(ENV_LOG_FILE).filter(|f| !f.is_empty()) {
            self.log.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer.capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "buffer.capacity must be positive".into(),
            ));
        }
        if self.buffer.idle_interval_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "buffer.idle_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::ConfigError(format!("Invalid value {raw:?} for {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer.capacity, 10);
        assert_eq!(config.buffer.idle_interval(), Duration::from_secs(5));
        assert!(!config.buffer.flush_when_full);
        assert!(config.buffer.drain_on_close);
        assert_eq!(config.channel_capacity, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [buffer]
            capacity = 4
            idle_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.buffer.capacity, 4);
        assert_eq!(config.buffer.idle_interval(), Duration::from_millis(250));
        assert!(config.buffer.drain_on_close);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_negative_capacity_rejected_by_parser() {
        let result = PipelineConfig::from_toml_str("[buffer]\ncapacity = -1\n");
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel_capacity = 8\n[log]\nlevel = \"debug\"").unwrap();

        let config = PipelineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = PipelineConfig::load_from_file(Path::new("/nonexistent/pipeline.toml"));
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CAPACITY, "3"),
            (ENV_IDLE_INTERVAL_MS, "1500"),
            (ENV_FLUSH_WHEN_FULL, "true"),
            (ENV_LOG_FILE, "/tmp/pipeline.log"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.buffer.capacity, 3);
        assert_eq!(config.buffer.idle_interval_ms, 1500);
        assert!(config.buffer.flush_when_full);
        assert_eq!(config.log.file, Some(PathBuf::from("/tmp/pipeline.log")));
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = PipelineConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_CAPACITY).then(|| "ten".to_string()));
        assert!(matches!(result, Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = PipelineConfig::default();
        config.buffer.capacity = 0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));

        let mut config = PipelineConfig::default();
        config.buffer.idle_interval_ms = 0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidConfig(_))));
    }
}
