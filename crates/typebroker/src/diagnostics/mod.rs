// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Diagnostics: bounded event log, component health and the text report.
//!
//! # Modules
//! - `recorder`: Ring buffer of [`DiagnosticEntry`] values plus operation outcomes
//! - `health`: [`HealthStatus`] ordering and [`HealthReport`] aggregation
//! - `report`: Plain-text rendering for humans

pub mod health;
pub mod recorder;
pub mod report;

pub use health::{ComponentHealth, ErrorRateThresholds, HealthReport, HealthStatus};
pub use recorder::{
    Category, DiagnosticEntry, DiagnosticsRecorder, RateSample, Severity, DEFAULT_CAPACITY,
};
pub use report::ServiceSection;
