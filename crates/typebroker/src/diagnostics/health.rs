// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Component health aggregation.

use super::recorder::RateSample;
use crate::config::DiagnosticsConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health status, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Degraded,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Degraded => "DEGRADED",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn is_healthy(&self) -> bool {
        *self == Self::Healthy
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Vec<String>,
}

impl ComponentHealth {
    pub fn new(component: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            component: component.into(),
            status,
            details: Vec::new(),
        }
    }

    pub fn healthy(component: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Healthy)
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Worsen the status; never improves it.
    pub fn escalate(&mut self, status: HealthStatus, detail: impl Into<String>) {
        self.status = self.status.max(status);
        self.details.push(detail.into());
    }
}

/// All component results plus the overall status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// `overall` is the worst component status (Healthy when empty).
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let overall = components
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or_default();
        Self {
            overall,
            components,
            generated_at: Utc::now(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.component == name)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall.is_healthy()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Error-rate classification bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRateThresholds {
    pub warning: f64,
    pub degraded: f64,
    pub critical: f64,
    pub min_samples: u64,
}

impl Default for ErrorRateThresholds {
    fn default() -> Self {
        Self::from_config(&DiagnosticsConfig::default())
    }
}

impl ErrorRateThresholds {
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self {
            warning: config.warning_rate,
            degraded: config.degraded_rate,
            critical: config.critical_rate,
            min_samples: config.min_samples,
        }
    }

    /// Status for a sample. Too few operations is always Healthy.
    pub fn classify(&self, sample: RateSample) -> HealthStatus {
        if sample.operations < self.min_samples.max(1) {
            return HealthStatus::Healthy;
        }
        let rate = sample.rate();
        if rate >= self.critical {
            HealthStatus::Critical
        } else if rate >= self.degraded {
            HealthStatus::Degraded
        } else if rate >= self.warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_is_worst_component() {
        let statuses = [
            HealthStatus::Healthy,
            HealthStatus::Warning,
            HealthStatus::Degraded,
            HealthStatus::Critical,
        ];
        for a in statuses {
            for b in statuses {
                for c in statuses {
                    let report = HealthReport::from_components(vec![
                        ComponentHealth::new("a", a),
                        ComponentHealth::new("b", b),
                        ComponentHealth::new("c", c),
                    ]);
                    for component in &report.components {
                        assert!(report.overall >= component.status);
                    }
                    assert_eq!(report.overall, a.max(b).max(c));
                }
            }
        }
    }

    #[test]
    fn test_empty_report_is_healthy() {
        assert!(HealthReport::from_components(Vec::new()).is_healthy());
    }

    #[test]
    fn test_escalate_never_improves() {
        let mut c = ComponentHealth::new("cache", HealthStatus::Degraded);
        c.escalate(HealthStatus::Warning, "minor");
        assert_eq!(c.status, HealthStatus::Degraded);
        assert_eq!(c.details, vec!["minor"]);
    }

    #[test]
    fn test_classify_error_rate() {
        let t = ErrorRateThresholds::default();
        let sample = |operations, failures| RateSample { operations, failures };

        assert_eq!(t.classify(sample(5, 5)), HealthStatus::Healthy);
        assert_eq!(t.classify(sample(100, 5)), HealthStatus::Healthy);
        assert_eq!(t.classify(sample(100, 10)), HealthStatus::Warning);
        assert_eq!(t.classify(sample(100, 30)), HealthStatus::Degraded);
        assert_eq!(t.classify(sample(100, 50)), HealthStatus::Critical);
    }

    #[test]
    fn test_json_rendering() {
        let report = HealthReport::from_components(vec![
            ComponentHealth::healthy("registry").detail("3 command types"),
        ]);
        let json = report.to_json().expect("json");
        assert!(json.contains("\"overall\": \"healthy\""));
        assert!(json.contains("3 command types"));
    }
}
