// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command type discovery and alias index.
//!
//! A scan walks the loaded modules (primary modules first), keeps the types
//! that follow the command naming conventions or derive from a marker base,
//! and indexes each one under several lookup aliases. Enumeration failures
//! are skip-and-continue: a scan never aborts.

mod descriptor;
mod naming;

pub use descriptor::TypeDescriptor;
pub use naming::NamingConvention;

use crate::config::ScanConfig;
use crate::diagnostics::{Category, DiagnosticsRecorder, Severity};
use crate::runtime::{
    ancestors_from, EnumerationError, ForeignRuntime, ForeignTypeInfo, ModuleRef, TypeHandle,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of the last scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub modules_scanned: usize,
    pub modules_partial: usize,
    pub modules_failed: usize,
    pub modules_skipped: usize,
    pub types_seen: usize,
    pub types_registered: usize,
    pub duplicate_aliases: usize,
    pub elapsed: Duration,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Concurrent index of discovered command types.
#[derive(Debug)]
pub struct TypeRegistry {
    naming: NamingConvention,
    config: ScanConfig,
    aliases: DashMap<String, Arc<TypeDescriptor>>,
    /// Lowercase alias -> descriptor, for the case-insensitive fallback.
    folded: DashMap<String, Arc<TypeDescriptor>>,
    by_handle: DashMap<TypeHandle, Arc<TypeDescriptor>>,
    report: RwLock<ScanReport>,
    recorder: Arc<DiagnosticsRecorder>,
}

impl TypeRegistry {
    pub fn new(
        naming: NamingConvention,
        config: ScanConfig,
        recorder: Arc<DiagnosticsRecorder>,
    ) -> Self {
        Self {
            naming,
            config,
            aliases: DashMap::new(),
            folded: DashMap::new(),
            by_handle: DashMap::new(),
            report: RwLock::new(ScanReport::default()),
            recorder,
        }
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    /// Scan `modules` and register every qualifying type.
    ///
    /// Returns the number of types registered by this call.
    pub fn scan(&self, runtime: &dyn ForeignRuntime, modules: &[ModuleRef]) -> usize {
        let start = Instant::now();
        let mut report = ScanReport::default();

        let mut ordered: Vec<&ModuleRef> = modules.iter().collect();
        ordered.sort_by_key(|m| !self.is_primary(m));

        for module in ordered {
            if self.is_skipped(module) {
                tracing::debug!("Skipping module {}", module.name);
                report.modules_skipped += 1;
                continue;
            }

            let types = match runtime.enumerate_types(module) {
                Ok(types) => types,
                Err(EnumerationError::Partial { loaded, reason, .. }) => {
                    report.modules_partial += 1;
                    self.recorder.record_detail(
                        Severity::Warning,
                        Category::Scan,
                        format!(
                            "Module {} enumerated partially ({} types loaded)",
                            module.name,
                            loaded.len()
                        ),
                        reason,
                    );
                    loaded
                }
                Err(EnumerationError::Unavailable { reason, .. }) => {
                    report.modules_failed += 1;
                    self.recorder.record_detail(
                        Severity::Warning,
                        Category::Scan,
                        format!("Module {} could not be enumerated; skipped", module.name),
                        reason,
                    );
                    continue;
                }
            };

            report.modules_scanned += 1;
            report.types_seen += types.len();

            for info in types.iter().filter(|t| self.qualifies(runtime, t)) {
                if self.register(runtime, info, &mut report) {
                    report.types_registered += 1;
                }
            }
        }

        report.elapsed = start.elapsed();
        report.completed_at = Some(Utc::now());
        let registered = report.types_registered;

        tracing::info!(
            "Scan complete: {} command types from {} modules ({} partial, {} failed, {} skipped) in {:?}",
            registered,
            report.modules_scanned,
            report.modules_partial,
            report.modules_failed,
            report.modules_skipped,
            report.elapsed
        );
        if self.by_handle.is_empty() {
            self.recorder
                .record(Severity::Warning, Category::Registry, "No command types discovered");
        } else {
            self.recorder.record(
                Severity::Info,
                Category::Registry,
                format!("Registered {} command types", registered),
            );
        }

        *self.report.write() = report;
        registered
    }

    /// Resolve a name: exact alias, then convention candidates, then a
    /// case-insensitive match.
    pub fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(hit) = self.aliases.get(name) {
            return Some(Arc::clone(hit.value()));
        }

        for candidate in self.naming.candidates(name) {
            if let Some(hit) = self.aliases.get(&candidate) {
                return Some(Arc::clone(hit.value()));
            }
        }

        self.folded
            .get(&name.to_lowercase())
            .map(|hit| Arc::clone(hit.value()))
    }

    /// Canonical names of all registered types, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_handle
            .iter()
            .map(|d| d.canonical_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Every indexed alias, sorted.
    pub fn list_aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.aliases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Canonical name -> descriptor, for cache warming.
    pub fn snapshot(&self) -> HashMap<String, Arc<TypeDescriptor>> {
        self.by_handle
            .iter()
            .map(|d| (d.canonical_name().to_string(), Arc::clone(d.value())))
            .collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub fn report(&self) -> ScanReport {
        self.report.read().clone()
    }

    fn is_primary(&self, module: &ModuleRef) -> bool {
        module.primary || self.config.primary_modules.iter().any(|p| p.as_str() == &*module.name)
    }

    fn is_skipped(&self, module: &ModuleRef) -> bool {
        self.config
            .skip_prefixes
            .iter()
            .any(|p| !p.is_empty() && module.name.starts_with(p.as_str()))
    }

    fn qualifies(&self, runtime: &dyn ForeignRuntime, info: &ForeignTypeInfo) -> bool {
        if !info.is_instantiable() {
            return false;
        }
        if self.naming.qualifies_by_name(info.name()) {
            return true;
        }
        ancestors_from(runtime, &info.bases, self.config.max_ancestor_depth)
            .iter()
            .any(|base| self.naming.matches_marker(base.short_name()))
    }

    /// First registration wins for both the type and each alias.
    fn register(
        &self,
        runtime: &dyn ForeignRuntime,
        info: &ForeignTypeInfo,
        report: &mut ScanReport,
    ) -> bool {
        let mut aliases = self.naming.aliases(info.name());
        let canonical = info.handle.as_str();
        if !aliases.iter().any(|a| a == canonical) {
            aliases.push(canonical.to_string());
        }

        let descriptor = match self.by_handle.entry(info.handle.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    "Type {} already registered; ignoring copy in {}",
                    canonical,
                    info.module
                );
                return false;
            }
            Entry::Vacant(slot) => {
                let descriptor = Arc::new(TypeDescriptor::build(runtime, info, aliases));
                slot.insert(Arc::clone(&descriptor));
                descriptor
            }
        };

        for alias in descriptor.aliases() {
            match self.aliases.entry(alias.clone()) {
                Entry::Occupied(existing) => {
                    report.duplicate_aliases += 1;
                    self.recorder.record_detail(
                        Severity::Info,
                        Category::Registry,
                        format!("Duplicate alias '{}' ignored", alias),
                        format!(
                            "kept {}, ignored {}",
                            existing.get().canonical_name(),
                            descriptor.canonical_name()
                        ),
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&descriptor));
                }
            }
            self.folded
                .entry(alias.to_lowercase())
                .or_insert_with(|| Arc::clone(&descriptor));
        }

        true
    }
}

#[cfg(test)]
mod tests;
