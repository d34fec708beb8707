// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Human-readable diagnostic report. No stable schema.

use super::health::HealthReport;
use super::recorder::DiagnosticsRecorder;
use std::fmt::Write;

/// Detail lines for one service.
#[derive(Debug, Clone, Default)]
pub struct ServiceSection {
    pub name: String,
    pub lines: Vec<String>,
}

impl ServiceSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

/// Render health, error histogram, recent activity and per-service detail.
pub fn render(
    health: &HealthReport,
    recorder: &DiagnosticsRecorder,
    services: &[ServiceSection],
    recent: usize,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== typebroker diagnostics ===");
    let _ = writeln!(out, "generated: {}", health.generated_at.to_rfc3339());
    let _ = writeln!(out);

    let _ = writeln!(out, "--- health: {} ---", health.overall);
    for component in &health.components {
        let _ = writeln!(out, "{:<14} {}", component.component, component.status);
        for detail in &component.details {
            let _ = writeln!(out, "    {}", detail);
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "--- error histogram ---");
    let histogram = recorder.error_histogram();
    if histogram.is_empty() {
        let _ = writeln!(out, "(no errors)");
    }
    for (category, count) in &histogram {
        let _ = writeln!(out, "{:<14} {}", category, count);
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "--- recent activity ({} retained, {} evicted) ---",
        recorder.len(),
        recorder.evicted()
    );
    for entry in recorder.recent(recent) {
        let _ = writeln!(out, "{}", entry);
    }
    let _ = writeln!(out);

    for service in services {
        let _ = writeln!(out, "--- {} ---", service.name);
        for line in &service.lines {
            let _ = writeln!(out, "{}", line);
        }
        let _ = writeln!(out);
    }

    out
}
