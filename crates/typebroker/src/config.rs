// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration. Every
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Broker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Return a placeholder handle instead of `None` when creation fails.
    #[serde(default = "default_true")]
    pub fallback_placeholders: bool,

    /// Type the health check constructs to exercise the factory.
    #[serde(default = "default_sentinel_type")]
    pub sentinel_type: String,

    /// `EnvFilter` directives used by [`crate::logging::init_from_config`]
    /// when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_sentinel_type() -> String {
    "object".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            naming: NamingConfig::default(),
            scan: ScanConfig::default(),
            dispatch: DispatchConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            fallback_placeholders: true,
            sentinel_type: default_sentinel_type(),
            log_level: default_log_level(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.naming.prefix.is_empty()
            && self.naming.suffix.is_empty()
            && self.naming.markers.is_empty()
        {
            return Err(ConfigError::Invalid(
                "naming needs at least one of prefix, suffix or markers".into(),
            ));
        }
        if self.scan.max_ancestor_depth == 0 {
            return Err(ConfigError::Invalid("scan.max_ancestor_depth must be > 0".into()));
        }
        if self.dispatch.entry_points.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid("dispatch.entry_points is empty".into()));
        }
        if self.sentinel_type.trim().is_empty() {
            return Err(ConfigError::Invalid("sentinel_type is empty".into()));
        }
        if EnvFilter::try_new(&self.log_level).is_err() {
            return Err(ConfigError::Invalid(format!("invalid log_level '{}'", self.log_level)));
        }
        self.diagnostics.validate()
    }
}

/// Command naming conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Reserved type-name prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Reserved type-name suffix.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Base-type name tokens marking command hierarchies.
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

fn default_prefix() -> String {
    "Cmd".to_string()
}

fn default_suffix() -> String {
    "Command".to_string()
}

fn default_markers() -> Vec<String> {
    vec!["Command".to_string()]
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
            markers: default_markers(),
        }
    }
}

/// Module scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Modules scanned before all others, in addition to runtime-flagged ones.
    #[serde(default)]
    pub primary_modules: Vec<String>,

    /// Module name prefixes that are never scanned.
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,

    /// Bound for base-type walks during qualification.
    #[serde(default = "default_max_ancestor_depth")]
    pub max_ancestor_depth: usize,
}

fn default_skip_prefixes() -> Vec<String> {
    vec!["System".to_string(), "Microsoft".to_string()]
}

fn default_max_ancestor_depth() -> usize {
    crate::runtime::MAX_ANCESTOR_DEPTH
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            primary_modules: Vec::new(),
            skip_prefixes: default_skip_prefixes(),
            max_ancestor_depth: default_max_ancestor_depth(),
        }
    }
}

/// Dispatch bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Generic entry-point names, in order of preference (case-insensitive).
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,
}

fn default_entry_points() -> Vec<String> {
    vec!["Dispatch".to_string()]
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            entry_points: default_entry_points(),
        }
    }
}

/// Diagnostics recorder and health thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Ring buffer capacity.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entries below this severity are mirrored to tracing but not retained.
    #[serde(default = "default_min_severity")]
    pub min_severity: String,

    /// Error-rate window (seconds).
    #[serde(default = "default_error_window")]
    pub error_window_secs: u64,

    #[serde(default = "default_warning_rate")]
    pub warning_rate: f64,

    #[serde(default = "default_degraded_rate")]
    pub degraded_rate: f64,

    #[serde(default = "default_critical_rate")]
    pub critical_rate: f64,

    /// Fewer operations than this in the window never affect health.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Entries shown in the recent-activity section of the report.
    #[serde(default = "default_report_recent")]
    pub report_recent: usize,
}

fn default_capacity() -> usize {
    1000
}

fn default_min_severity() -> String {
    "info".to_string()
}

fn default_error_window() -> u64 {
    300
}

fn default_warning_rate() -> f64 {
    0.10
}

fn default_degraded_rate() -> f64 {
    0.25
}

fn default_critical_rate() -> f64 {
    0.50
}

fn default_min_samples() -> u64 {
    10
}

fn default_report_recent() -> usize {
    20
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            min_severity: default_min_severity(),
            error_window_secs: default_error_window(),
            warning_rate: default_warning_rate(),
            degraded_rate: default_degraded_rate(),
            critical_rate: default_critical_rate(),
            min_samples: default_min_samples(),
            report_recent: default_report_recent(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("diagnostics.capacity must be > 0".into()));
        }
        if self.error_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "diagnostics.error_window_secs must be > 0".into(),
            ));
        }
        if crate::diagnostics::Severity::parse(&self.min_severity).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown diagnostics.min_severity '{}'",
                self.min_severity
            )));
        }
        let ordered = 0.0 <= self.warning_rate
            && self.warning_rate <= self.degraded_rate
            && self.degraded_rate <= self.critical_rate
            && self.critical_rate <= 1.0;
        if !ordered {
            return Err(ConfigError::Invalid(format!(
                "error-rate thresholds must satisfy 0 <= warning ({}) <= degraded ({}) <= critical ({}) <= 1",
                self.warning_rate, self.degraded_rate, self.critical_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_is_default() {
        let config = BrokerConfig::from_toml_str("").expect("parse");
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.diagnostics.capacity, 1000);
        assert_eq!(config.diagnostics.error_window_secs, 300);
        assert!(config.fallback_placeholders);
    }

    #[test]
    fn test_partial_sections() {
        let config = BrokerConfig::from_toml_str(
            r#"
            fallback_placeholders = false

            [naming]
            prefix = "Op"

            [dispatch]
            entry_points = ["Send", "Dispatch"]
            "#,
        )
        .expect("parse");

        assert_eq!(config.naming.prefix, "Op");
        assert_eq!(config.naming.suffix, "Command");
        assert_eq!(config.dispatch.entry_points, vec!["Send", "Dispatch"]);
        assert!(!config.fallback_placeholders);
    }

    #[test]
    fn test_validation() {
        let mut config = BrokerConfig::default();
        assert!(config.validate().is_ok());

        config.diagnostics.warning_rate = 0.6;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BrokerConfig::default();
        config.diagnostics.min_severity = "loud".into();
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.naming = NamingConfig {
            prefix: String::new(),
            suffix: String::new(),
            markers: Vec::new(),
        };
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.dispatch.entry_points = vec![" ".into()];
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::default();
        config.log_level = "typebroker=loud".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.log_level = "warn,typebroker=debug".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut config = BrokerConfig::default();
        config.scan.primary_modules = vec!["Game.Core".into()];
        config.sentinel_type = "Game.Probe".into();

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(config.to_toml_string().expect("serialize").as_bytes())
            .expect("write");

        let loaded = BrokerConfig::from_file(file.path()).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = BrokerConfig::from_file("/nonexistent/typebroker.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
