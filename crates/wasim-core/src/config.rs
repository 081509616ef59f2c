//! Configuration management for wasim
//!
//! Handles loading and validation of `wasim.toml` files. Every field has a
//! default, so an empty file (or no file at all) reproduces the reference
//! setups of both models.
//!
//! ```toml
//! [general]
//! log_level = "info"
//! log_format = "pretty"
//!
//! [report]
//! buffer_interval = 4194304
//! block_interval = 131072
//! format = "plain"
//!
//! [buffer]
//! strategy = "greedy_largest"
//!
//! [block]
//! units_per_block = 128
//! physical_blocks = 1000000
//!
//! [block.initial_distribution]
//! kind = "spare_empty"
//! spare_ratio = 0.375
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::block::BlockConfig;
use crate::buffer::BufferConfig;
use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Progress report settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Buffer model parameters
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Block model parameters
    #[serde(default)]
    pub block: BlockConfig,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Optional log file, in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Progress report configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Iterations between buffer model reports
    #[serde(default = "default_buffer_interval")]
    pub buffer_interval: u64,

    /// Iterations between block model reports
    #[serde(default = "default_block_interval")]
    pub block_interval: u64,

    /// Report rendering
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            buffer_interval: default_buffer_interval(),
            block_interval: default_block_interval(),
            format: OutputFormat::default(),
        }
    }
}

fn default_buffer_interval() -> u64 {
    1 << 22
}

fn default_block_interval() -> u64 {
    1 << 17
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output for interactive use
    #[default]
    Pretty,
    /// JSON lines for machine consumption
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnknownVariant {
                kind: "log format",
                value: s.to_string(),
                expected: "pretty, json",
            }),
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Text reports on stdout
    #[default]
    Plain,
    /// One JSON object per report on stdout
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnknownVariant {
                kind: "output format",
                value: s.to_string(),
                expected: "plain, json",
            }),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(display));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(display, e.to_string()))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Serialize to TOML, e.g. for `wasim config show`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeFailed(e.to_string()))
    }

    /// Check everything that would otherwise fail at model construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general
            .log_level
            .parse::<crate::logging::LogLevel>()
            .map_err(ConfigError::ValidationError)?;
        for (field, value) in [
            ("report.buffer_interval", self.report.buffer_interval),
            ("report.block_interval", self.report.block_interval),
        ] {
            if value == 0 {
                return Err(ConfigError::TooSmall {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        self.buffer.validate()?;
        self.block.layout()?;
        Ok(())
    }

    /// Logging settings derived from `[general]`
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.general.log_level.clone(),
            format: self.general.log_format,
            file: self.general.log_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{InitialDistribution, VictimStrategy};
    use crate::buffer::EvictionStrategy;

    #[test]
    fn default_config_is_valid() {
        let config = SimConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.report.buffer_interval, 1 << 22);
        assert_eq!(config.report.block_interval, 1 << 17);
        assert_eq!(config.buffer.capacity, 1 << 24);
        assert_eq!(config.block.units_per_block, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
            [buffer]
            strategy = "weighted_random_nonzero"
            seed = 9

            [block]
            units_per_block = 16
            physical_blocks = 64

            [block.initial_distribution]
            kind = "even"
            spare_ratio = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.buffer.strategy, EvictionStrategy::WeightedRandomNonzero);
        assert_eq!(config.buffer.seed, 9);
        assert_eq!(config.buffer.max_size, 4096);
        assert_eq!(config.block.strategy, VictimStrategy::LeastUsed);
        assert_eq!(
            config.block.initial_distribution,
            InitialDistribution::Even { spare_ratio: 0.25 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_distribution_parses() {
        let config = SimConfig::from_toml_str(
            r#"
            [block]
            units_per_block = 8
            physical_blocks = 10

            [block.initial_distribution]
            kind = "explicit"
            buckets = [{ used = 7, blocks = 1 }, { used = 8, blocks = 9 }]
            "#,
        )
        .unwrap();
        let layout = config.block.layout().unwrap();
        assert_eq!(layout.counts[7], 1);
        assert_eq!(layout.counts[8], 9);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = SimConfig::default();
        config.general.log_format = LogFormat::Json;
        config.report.format = OutputFormat::Json;
        config.block.strategy = VictimStrategy::WeightedRandom;
        let text = config.to_toml_string().unwrap();
        let back = SimConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn unknown_strategy_is_parse_error() {
        let err = SimConfig::from_toml_str("[buffer]\nstrategy = \"lru\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.report.block_interval = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                field: "report.block_interval",
                ..
            })
        ));

        let mut config = SimConfig::default();
        config.general.log_level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = SimConfig::default();
        config.block.initial_distribution = InitialDistribution::SpareEmpty { spare_ratio: 1.0 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { .. })
        ));
    }

    #[test]
    fn load_from_missing_file() {
        let err = SimConfig::load_from(Path::new("/nonexistent/wasim.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wasim.toml");
        std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").unwrap();
        let config = SimConfig::load_from(&path).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.log_config().level, "debug");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Plain);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }
}
