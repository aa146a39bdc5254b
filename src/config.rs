//! Bridge configuration, read from `graft.toml`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::{LogConfig, LogFormat, LogOutput};

/// File name looked up by `BridgeConfig::discover`
pub const CONFIG_FILE: &str = "graft.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Reject host values that several union alternatives accept
    #[serde(default)]
    pub strict_variants: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Log directory; stderr when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Extra filter directives (e.g. "graft::registry=trace")
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
            filter: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Subscriber settings; an unparsable level falls back to INFO
    pub fn to_log_config(&self) -> LogConfig {
        let level = self.level.parse().unwrap_or(tracing::Level::INFO);
        let output = match &self.directory {
            Some(dir) => LogOutput::File {
                directory: dir.to_string_lossy().into_owned(),
                prefix: "graft".to_string(),
            },
            None => LogOutput::Stderr,
        };
        let mut config = LogConfig::new()
            .with_level(level)
            .with_format(self.format)
            .with_output(output);
        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `graft.toml` from `start` or its nearest ancestor, else defaults
    pub fn discover(start: &Path) -> Self {
        let mut current = Some(start);
        while let Some(dir) = current {
            let path = dir.join(CONFIG_FILE);
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return config,
                    Err(err) => {
                        tracing::warn!(target: "graft::config", path = %path.display(), %err, "ignoring unreadable config");
                    }
                }
            }
            current = dir.parent();
        }
        Self::default()
    }

    /// Install logging as described by the `[logging]` table, once per process
    pub fn init_logging(&self) -> bool {
        crate::logging::init_logging_once(self.logging.to_log_config())
    }

    pub fn generate_default() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
