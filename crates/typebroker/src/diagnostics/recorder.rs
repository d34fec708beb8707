// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded diagnostic event log.
//!
//! Thread-safe: the ring buffer and the outcome window sit behind a single
//! mutex so concurrent writers keep FIFO order. When full, the oldest entry
//! is dropped.

use crate::config::DiagnosticsConfig;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse level from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" | "TRACE" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" | "WARNING" => Some(Self::Warning),
            "ERROR" | "ERR" => Some(Self::Error),
            "CRITICAL" | "FATAL" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        *self >= Self::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entry originated.
///
/// `NotFound`, `Construction`, `Dispatch`, `Scan` and `Initialization` are
/// the failure classes callers can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Registry,
    Scan,
    Cache,
    Construction,
    NotFound,
    Dispatch,
    Initialization,
    Health,
    Broker,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Scan => "scan",
            Self::Cache => "cache",
            Self::Construction => "construction",
            Self::NotFound => "not_found",
            Self::Dispatch => "dispatch",
            Self::Initialization => "initialization",
            Self::Health => "health",
            Self::Broker => "broker",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DiagnosticEntry {
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            category,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.severity,
            self.category,
            self.message
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// Operation outcomes observed in a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSample {
    pub operations: u64,
    pub failures: u64,
}

impl RateSample {
    pub fn rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.failures as f64 / self.operations as f64
        }
    }
}

#[derive(Debug, Default)]
struct Ring {
    entries: VecDeque<DiagnosticEntry>,
    evicted: u64,
    /// Error-or-worse counts per category, never reset by eviction.
    error_counts: BTreeMap<Category, u64>,
    outcomes: VecDeque<(DateTime<Utc>, bool)>,
}

/// Bounded, thread-safe diagnostic log.
#[derive(Debug)]
pub struct DiagnosticsRecorder {
    ring: Mutex<Ring>,
    capacity: usize,
    min_severity: Severity,
}

impl Default for DiagnosticsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DiagnosticsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self::with_min_severity(capacity, Severity::Info)
    }

    pub fn with_min_severity(capacity: usize, min_severity: Severity) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                ..Ring::default()
            }),
            capacity,
            min_severity,
        }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let min = Severity::parse(&config.min_severity).unwrap_or_default();
        Self::with_min_severity(config.capacity, min)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Record an entry.
    pub fn record(&self, severity: Severity, category: Category, message: impl Into<String>) {
        self.append(DiagnosticEntry::new(severity, category, message));
    }

    /// Record an entry with a detail string.
    pub fn record_detail(
        &self,
        severity: Severity,
        category: Category,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.append(DiagnosticEntry::new(severity, category, message).with_detail(detail));
    }

    /// Append a pre-built entry. Every entry is mirrored to `tracing`;
    /// entries below the minimum severity are not retained.
    pub fn append(&self, entry: DiagnosticEntry) {
        mirror(&entry);
        if entry.severity < self.min_severity {
            return;
        }

        let mut ring = self.ring.lock();
        if entry.severity.is_error() {
            *ring.error_counts.entry(entry.category).or_insert(0) += 1;
        }
        if ring.entries.len() >= self.capacity {
            ring.entries.pop_front(); // Drop oldest if full
            ring.evicted += 1;
        }
        ring.entries.push_back(entry);
    }

    /// Count one operation outcome toward the error rate.
    pub fn record_outcome(&self, success: bool) {
        let mut ring = self.ring.lock();
        if ring.outcomes.len() >= self.capacity {
            ring.outcomes.pop_front();
        }
        ring.outcomes.push_back((Utc::now(), success));
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.ring.lock().entries.iter().cloned().collect()
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DiagnosticEntry> {
        let ring = self.ring.lock();
        let skip = ring.entries.len().saturating_sub(n);
        ring.entries.iter().skip(skip).cloned().collect()
    }

    /// Entries with timestamp at or after `since`, oldest first.
    pub fn entries_since(&self, since: DateTime<Utc>) -> Vec<DiagnosticEntry> {
        self.ring
            .lock()
            .entries
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Error-or-worse entries within the last `window`.
    pub fn recent_errors(&self, window: Duration) -> Vec<DiagnosticEntry> {
        let mut entries = self.entries_since(Utc::now() - window);
        entries.retain(|e| e.severity.is_error());
        entries
    }

    /// Operation outcomes within the last `window`.
    pub fn error_rate(&self, window: Duration) -> RateSample {
        let since = Utc::now() - window;
        let ring = self.ring.lock();
        ring.outcomes
            .iter()
            .filter(|(at, _)| *at >= since)
            .fold(RateSample::default(), |mut acc, (_, ok)| {
                acc.operations += 1;
                if !ok {
                    acc.failures += 1;
                }
                acc
            })
    }

    /// Cumulative error counts per category.
    pub fn error_histogram(&self) -> BTreeMap<Category, u64> {
        self.ring.lock().error_counts.clone()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries dropped because the ring was full.
    pub fn evicted(&self) -> u64 {
        self.ring.lock().evicted
    }

    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        ring.entries.clear();
        ring.outcomes.clear();
        ring.error_counts.clear();
        ring.evicted = 0;
    }
}

fn mirror(entry: &DiagnosticEntry) {
    let detail = entry.detail.as_deref().unwrap_or("");
    match entry.severity {
        Severity::Debug => {
            tracing::debug!(category = %entry.category, detail, "{}", entry.message)
        }
        Severity::Info => {
            tracing::info!(category = %entry.category, detail, "{}", entry.message)
        }
        Severity::Warning => {
            tracing::warn!(category = %entry.category, detail, "{}", entry.message)
        }
        Severity::Error | Severity::Critical => {
            tracing::error!(
                category = %entry.category,
                severity = %entry.severity,
                detail,
                "{}",
                entry.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ring_keeps_most_recent_in_order() {
        let recorder = DiagnosticsRecorder::new(1000);
        for i in 0..1500 {
            recorder.record(Severity::Info, Category::Broker, format!("event {}", i));
        }

        let entries = recorder.entries();
        assert_eq!(entries.len(), 1000);
        assert_eq!(recorder.evicted(), 500);
        for (offset, entry) in entries.iter().enumerate() {
            assert_eq!(entry.message, format!("event {}", 500 + offset));
        }
    }

    #[test]
    fn test_min_severity_filters_retention() {
        let recorder = DiagnosticsRecorder::with_min_severity(10, Severity::Warning);
        recorder.record(Severity::Info, Category::Cache, "ignored");
        recorder.record(Severity::Error, Category::Cache, "kept");
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.entries()[0].message, "kept");
    }

    #[test]
    fn test_recent_errors_window() {
        let recorder = DiagnosticsRecorder::new(10);
        recorder.append(
            DiagnosticEntry::new(Severity::Error, Category::Dispatch, "old")
                .with_timestamp(Utc::now() - Duration::minutes(10)),
        );
        recorder.record(Severity::Error, Category::Dispatch, "new");
        recorder.record(Severity::Warning, Category::Dispatch, "soft");

        let errors = recorder.recent_errors(Duration::minutes(5));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "new");
        assert_eq!(recorder.error_histogram().get(&Category::Dispatch), Some(&2));
    }

    #[test]
    fn test_recent_tail() {
        let recorder = DiagnosticsRecorder::new(10);
        for i in 0..5 {
            recorder.record(Severity::Info, Category::Registry, i.to_string());
        }
        let tail: Vec<String> = recorder.recent(2).into_iter().map(|e| e.message).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(recorder.recent(50).len(), 5);
    }

    #[test]
    fn test_error_rate() {
        let recorder = DiagnosticsRecorder::new(100);
        for i in 0..20 {
            recorder.record_outcome(i % 4 != 0);
        }
        let sample = recorder.error_rate(Duration::minutes(5));
        assert_eq!(sample.operations, 20);
        assert_eq!(sample.failures, 5);
        assert!((sample.rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_writers() {
        let recorder = Arc::new(DiagnosticsRecorder::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for i in 0..250 {
                        recorder.record(Severity::Info, Category::Broker, format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }

        assert_eq!(recorder.len(), 1000);
        assert_eq!(recorder.evicted(), 1000);

        // Per-writer order survives interleaving.
        let entries = recorder.entries();
        for t in 0..8 {
            let seq: Vec<usize> = entries
                .iter()
                .filter_map(|e| e.message.strip_prefix(&format!("{}-", t)).map(str::to_string))
                .filter_map(|s| s.parse().ok())
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_severity_parse_and_serde() {
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("nope"), None);

        let entry = DiagnosticEntry::new(Severity::Error, Category::NotFound, "missing");
        let json = serde_json::to_string(&entry).expect("json");
        assert!(json.contains("\"severity\":\"error\""));
        assert!(json.contains("\"category\":\"not_found\""));
        assert!(!json.contains("detail"));
    }
}
