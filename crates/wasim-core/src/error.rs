//! Error types for wasim-core
//!
//! Recoverable errors only: bad configuration, I/O, serialization and logging
//! setup. Broken model invariants are not errors in this sense; see
//! [`crate::invariant`].

use std::fmt::Write;
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wasim-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Logging setup errors
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check filesystem permissions and paths, then retry.")
                    .alternative("Verify the config and log file directories exist."),
            ),
            Self::Json(_) => None,
            Self::Logging(_) => Some(
                Remediation::new("Fix the logging settings and retry.")
                    .command("Override level", "RUST_LOG=info wasim ...")
                    .alternative("Drop the log file setting to log to stderr only."),
            ),
        }
    }
}

/// Configuration errors, raised at model construction or config load time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(String),

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("{field} must lie in {range}, got {value}")]
    RatioOutOfRange {
        field: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("{field} x spare_ratio = {product} is not a whole number (ratio {ratio})")]
    NonIntegralSplit {
        field: &'static str,
        ratio: f64,
        product: f64,
    },

    #[error("{what} of {total} does not fit a 32-bit sampling range")]
    PopulationTooLarge { what: &'static str, total: u64 },

    #[error("Unknown {kind} '{value}', expected one of: {expected}")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Config file not found: {path}. Verify the path and retry."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .command("Write defaults", "wasim config show > wasim.toml"),
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check permissions."
            ))
            .command("Check permissions", format!("ls -l \"{path}\"")),
            Self::ParseFailed(_) => Remediation::new("Config parse failed. Fix the syntax and retry.")
                .command("Validate", "wasim config validate --config wasim.toml")
                .alternative("Start again from the defaults printed by `wasim config show`."),
            Self::SerializeFailed(_) => {
                Remediation::new("Failed to serialize configuration. Check config values.")
            }
            Self::TooSmall { field, min, .. } => {
                Remediation::new(format!("Raise {field} to at least {min}."))
            }
            Self::RatioOutOfRange { field, range, .. } => {
                Remediation::new(format!("Pick a {field} within {range}."))
                    .alternative("0.375 reproduces the reference over-provisioning setup.")
            }
            Self::NonIntegralSplit { field, .. } => Remediation::new(format!(
                "Choose spare_ratio so that {field} x spare_ratio is a whole number."
            ))
            .alternative("Powers-of-two fractions (0.25, 0.375, 0.5) split evenly for most sizes."),
            Self::PopulationTooLarge { what, .. } => Remediation::new(format!(
                "Shrink the model so the {what} stays below 2^32."
            )),
            Self::UnknownVariant { kind, expected, .. } => {
                Remediation::new(format!("Use a supported {kind}: {expected}."))
            }
            Self::ValidationError(_) => {
                Remediation::new("Config validation failed. Fix the invalid fields and retry.")
                    .command("Validate", "wasim config validate --config wasim.toml")
            }
        }
    }
}
