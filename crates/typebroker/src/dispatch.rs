// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic dispatch onto a foreign bus.
//!
//! The bus exposes an entry point parameterized by the command's concrete
//! type (`Dispatch<T>(T)`). The bridge finds it, specializes it once per
//! `(bus type, command type)` and keeps the result as a type-erased closure.

use crate::config::DispatchConfig;
use crate::diagnostics::{Category, DiagnosticsRecorder, Severity};
use crate::registry::TypeRegistry;
use crate::runtime::{ForeignBus, ForeignObject, GenericMethodInfo, RuntimeError, TypeHandle};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A dispatch function bound to one command type.
pub type DispatchFn =
    Arc<dyn Fn(&dyn ForeignBus, &ForeignObject) -> Result<(), RuntimeError> + Send + Sync>;

/// Dispatch failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("command type '{0}' not found")]
    NotFound(String),

    #[error("bus {bus} exposes no generic dispatch entry point")]
    NoEntryPoint { bus: String },

    #[error("specializing {bus}.{method}<{command}> failed: {source}")]
    Specialization {
        bus: String,
        method: String,
        command: String,
        #[source]
        source: RuntimeError,
    },

    #[error("dispatching {command} on {bus} failed: {source}")]
    Invocation {
        bus: String,
        command: String,
        #[source]
        source: RuntimeError,
    },
}

impl DispatchError {
    pub fn category(&self) -> Category {
        match self {
            Self::NotFound(_) => Category::NotFound,
            _ => Category::Dispatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DispatchKey {
    bus: TypeHandle,
    command: TypeHandle,
}

/// Dispatch statistics.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub dispatched: AtomicU64,
    pub failures: AtomicU64,
    pub specializations: AtomicU64,
}

/// Snapshot of dispatch statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub dispatched: u64,
    pub failures: u64,
    pub specializations: u64,
    pub functions: usize,
}

/// Routes constructed commands to a bus's generic entry point.
pub struct DispatchBridge {
    entry_points: Vec<String>,
    functions: DashMap<DispatchKey, DispatchFn>,
    recorder: Arc<DiagnosticsRecorder>,
    stats: DispatchStats,
}

impl DispatchBridge {
    pub fn new(config: &DispatchConfig, recorder: Arc<DiagnosticsRecorder>) -> Self {
        Self {
            entry_points: config
                .entry_points
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            functions: DashMap::new(),
            recorder,
            stats: DispatchStats::default(),
        }
    }

    /// Pre-register a dispatch function, replacing any existing one.
    pub fn register<F>(&self, bus_type: TypeHandle, command_type: TypeHandle, f: F)
    where
        F: Fn(&dyn ForeignBus, &ForeignObject) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.register_fn(bus_type, command_type, Arc::new(f));
    }

    pub fn register_fn(&self, bus_type: TypeHandle, command_type: TypeHandle, f: DispatchFn) {
        let key = DispatchKey {
            bus: bus_type,
            command: command_type,
        };
        self.functions.insert(key, f);
    }

    pub fn is_registered(&self, bus_type: &TypeHandle, command_type: &TypeHandle) -> bool {
        self.functions.contains_key(&DispatchKey {
            bus: bus_type.clone(),
            command: command_type.clone(),
        })
    }

    /// Dispatch `command` as its own runtime type.
    pub fn dispatch(&self, bus: &dyn ForeignBus, command: &ForeignObject) -> bool {
        self.finish(self.try_dispatch(bus, command.type_handle(), command))
    }

    /// Dispatch `command` as the type `type_name` resolves to.
    pub fn dispatch_by_name(
        &self,
        registry: &TypeRegistry,
        bus: &dyn ForeignBus,
        type_name: &str,
        command: &ForeignObject,
    ) -> bool {
        let result = match registry.resolve(type_name) {
            Some(descriptor) => self.try_dispatch(bus, descriptor.handle(), command),
            None => Err(DispatchError::NotFound(type_name.to_string())),
        };
        self.finish(result)
    }

    /// Dispatch without recording; the caller decides what a failure means.
    pub fn try_dispatch(
        &self,
        bus: &dyn ForeignBus,
        command_type: &TypeHandle,
        command: &ForeignObject,
    ) -> Result<(), DispatchError> {
        let f = self.function_for(bus, command_type)?;
        f(bus, command).map_err(|source| DispatchError::Invocation {
            bus: bus.bus_type().to_string(),
            command: command_type.to_string(),
            source,
        })
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            specializations: self.stats.specializations.load(Ordering::Relaxed),
            functions: self.functions.len(),
        }
    }

    /// Exactly one diagnostic entry per failed call.
    fn finish(&self, result: Result<(), DispatchError>) -> bool {
        match result {
            Ok(()) => {
                self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                self.recorder.record_outcome(true);
                true
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                self.recorder.record_outcome(false);
                self.recorder.record(Severity::Error, err.category(), err.to_string());
                false
            }
        }
    }

    fn function_for(
        &self,
        bus: &dyn ForeignBus,
        command_type: &TypeHandle,
    ) -> Result<DispatchFn, DispatchError> {
        let key = DispatchKey {
            bus: bus.bus_type(),
            command: command_type.clone(),
        };
        if let Some(f) = self.functions.get(&key) {
            return Ok(Arc::clone(f.value()));
        }

        let method = self
            .find_entry_point(bus)
            .ok_or_else(|| DispatchError::NoEntryPoint {
                bus: key.bus.to_string(),
            })?;

        let specialized = bus
            .specialize(&method, command_type)
            .map_err(|source| DispatchError::Specialization {
                bus: key.bus.to_string(),
                method: method.name.clone(),
                command: command_type.to_string(),
                source,
            })?;
        self.stats.specializations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Specialized {}.{}<{}>", key.bus, method.name, command_type);

        let f: DispatchFn = Arc::new(move |bus: &dyn ForeignBus, command: &ForeignObject| {
            bus.invoke(&specialized, command)
        });
        let entry = self.functions.entry(key).or_insert(f);
        Ok(Arc::clone(entry.value()))
    }

    /// First configured name with a one-type-parameter, one-argument shape.
    fn find_entry_point(&self, bus: &dyn ForeignBus) -> Option<GenericMethodInfo> {
        let methods = bus.generic_methods();
        self.entry_points.iter().find_map(|name| {
            methods
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(name) && m.type_params == 1 && m.params == 1)
                .cloned()
        })
    }
}
