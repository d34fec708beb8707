// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The broker: owned context tying registry, cache, factory and bridge
//! together behind an initialize-once lifecycle.
//!
//! # Concurrency
//!
//! - Published state lives in an `ArcSwapOption`: readers take a lock-free
//!   snapshot and never observe a half-built registry.
//! - First access is double-checked under a single init guard, so threads
//!   racing to initialize share exactly one initialization sequence.
//! - `reinitialize` builds a complete new state before swapping it in.
//!
//! # Usage Pattern
//!
//! ```
//! use std::sync::Arc;
//! use typebroker::{Broker, BrokerConfig};
//! use typebroker::runtime::{ClassSpec, InMemoryRuntime, ModuleSpec};
//!
//! let runtime = Arc::new(
//!     InMemoryRuntime::builder()
//!         .module(ModuleSpec::new("Game").primary().class(ClassSpec::new("Game.CmdJump")))
//!         .build(),
//! );
//! let broker = Broker::new(runtime, BrokerConfig::default()).expect("valid config");
//!
//! let handle = broker.create("Jump", &[]).expect("handle");
//! assert!(handle.is_valid());
//! ```

use crate::cache::TypeDescriptorCache;
use crate::config::{BrokerConfig, ConfigError};
use crate::diagnostics::report::{self, ServiceSection};
use crate::diagnostics::{
    Category, ComponentHealth, DiagnosticEntry, DiagnosticsRecorder, ErrorRateThresholds,
    HealthReport, HealthStatus, Severity,
};
use crate::dispatch::{DispatchBridge, DispatchFn};
use crate::factory::InstanceFactory;
use crate::handle::{CommandHandle, FailureKind, FallbackCommand};
use crate::registry::{NamingConvention, TypeDescriptor, TypeRegistry};
use crate::runtime::{
    ForeignBus, ForeignObject, ForeignRuntime, ForeignValue, RuntimeError, TypeHandle,
};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;

/// Upper bound on the error-rate window (one year).
const MAX_ERROR_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

static GLOBAL_BROKER: OnceLock<Arc<Broker>> = OnceLock::new();

/// Install the process-wide broker. The first install wins; the installed
/// broker is returned either way.
pub fn install_global(broker: Arc<Broker>) -> Arc<Broker> {
    GLOBAL_BROKER.get_or_init(|| broker).clone()
}

/// Get the process-wide broker (returns None if not installed)
pub fn global() -> Option<Arc<Broker>> {
    GLOBAL_BROKER.get().cloned()
}

/// Broker errors. Initialization failure is the only error `create` and
/// `dispatch` callers never see directly.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("module listing failed: {0}")]
    ModuleListing(#[source] RuntimeError),

    #[error("broker initialization failed: {0}")]
    InitializationFailed(String),
}

impl BrokerError {
    pub fn category(&self) -> Category {
        match self {
            Self::Config(_) => Category::Broker,
            Self::ModuleListing(_) | Self::InitializationFailed(_) => Category::Initialization,
        }
    }
}

/// One published generation of broker state.
pub struct BrokerState {
    generation: u64,
    registry: Arc<TypeRegistry>,
    cache: Arc<TypeDescriptorCache>,
    factory: InstanceFactory,
    bridge: DispatchBridge,
    initialized_at: DateTime<Utc>,
}

impl BrokerState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TypeDescriptorCache {
        &self.cache
    }

    pub fn factory(&self) -> &InstanceFactory {
        &self.factory
    }

    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }
}

type DispatchKey = (TypeHandle, TypeHandle);

/// Dynamic type-resolution and instantiation broker.
pub struct Broker {
    runtime: Arc<dyn ForeignRuntime>,
    config: BrokerConfig,
    recorder: Arc<DiagnosticsRecorder>,
    state: ArcSwapOption<BrokerState>,
    /// Set when the last initialization attempt failed with no state to fall back on.
    failure: ArcSwapOption<String>,
    init_guard: Mutex<()>,
    generation: AtomicU64,
    /// Caller-registered dispatch functions, replayed onto every new bridge.
    dispatch_fns: DashMap<DispatchKey, DispatchFn>,
}

impl Broker {
    /// Create an uninitialized broker. Only the configuration is validated.
    pub fn new(
        runtime: Arc<dyn ForeignRuntime>,
        config: BrokerConfig,
    ) -> Result<Self, BrokerError> {
        config.validate()?;
        Ok(Self::build(runtime, config))
    }

    fn build(runtime: Arc<dyn ForeignRuntime>, config: BrokerConfig) -> Self {
        let recorder = Arc::new(DiagnosticsRecorder::from_config(&config.diagnostics));
        Self {
            runtime,
            config,
            recorder,
            state: ArcSwapOption::empty(),
            failure: ArcSwapOption::empty(),
            init_guard: Mutex::new(()),
            generation: AtomicU64::new(0),
            dispatch_fns: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<dyn ForeignRuntime> {
        &self.runtime
    }

    pub fn recorder(&self) -> &Arc<DiagnosticsRecorder> {
        &self.recorder
    }

    /// Initialize if needed. Safe to call from many threads at once.
    ///
    /// After a failure every later call fails fast until `reinitialize`
    /// succeeds.
    pub fn initialize(&self) -> Result<(), BrokerError> {
        self.ensure_state().map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.load().is_some()
    }

    /// Reason for the last failed initialization, if the broker is failed.
    pub fn failure(&self) -> Option<String> {
        self.failure.load_full().map(|reason| String::clone(&reason))
    }

    /// Number of successful (re)initializations.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current published state, without initializing.
    pub fn state(&self) -> Option<Arc<BrokerState>> {
        self.state.load_full()
    }

    /// Rebuild registry, cache, factory and bridge, then swap them in.
    ///
    /// On failure the previous state stays published. Handles issued
    /// earlier stay valid either way.
    pub fn reinitialize(&self) -> Result<(), BrokerError> {
        let _guard = self.init_guard.lock();
        match self.build_state() {
            Ok(state) => {
                self.state.store(Some(Arc::new(state)));
                self.failure.store(None);
                Ok(())
            }
            Err(err) => {
                let kept = self.state.load().is_some();
                self.recorder.record_detail(
                    Severity::Error,
                    Category::Initialization,
                    if kept {
                        "Reinitialization failed; previous state kept"
                    } else {
                        "Reinitialization failed"
                    },
                    err.to_string(),
                );
                if !kept {
                    self.failure.store(Some(Arc::new(err.to_string())));
                }
                Err(err)
            }
        }
    }

    /// Resolve `name`, construct it and wrap the result.
    ///
    /// Not-found and construction failures yield a placeholder handle
    /// (or `None` when placeholders are disabled). A failed broker yields
    /// `None`.
    pub fn create(&self, name: &str, args: &[ForeignValue]) -> Option<CommandHandle> {
        let state = match self.ensure_state() {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!("create('{}') refused: {}", name, err);
                return None;
            }
        };

        let Some(descriptor) = state.registry.resolve(name) else {
            let reason = format!("No command type matches '{}'", name);
            self.recorder.record_outcome(false);
            self.recorder.record(Severity::Error, Category::NotFound, reason.clone());
            return self.placeholder(None, name, args, FailureKind::NotFound, reason);
        };

        match state.factory.create_detailed(descriptor.handle(), args) {
            Ok(constructed) => Some(CommandHandle::live(
                descriptor,
                constructed.object,
                Arc::clone(&self.runtime),
            )),
            Err(err) => self.placeholder(
                Some(descriptor),
                name,
                args,
                FailureKind::Construction,
                err.to_string(),
            ),
        }
    }

    /// Resolve a name against the current registry.
    pub fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.ensure_state().ok()?.registry.resolve(name)
    }

    /// Canonical names of every discovered command type.
    pub fn list_names(&self) -> Vec<String> {
        self.ensure_state()
            .map(|state| state.registry.list_names())
            .unwrap_or_default()
    }

    /// Send a live handle's instance to the bus. Placeholders are refused.
    pub fn dispatch(&self, bus: &dyn ForeignBus, handle: &CommandHandle) -> bool {
        match handle.object() {
            Some(object) => self.dispatch_object(bus, object),
            None => {
                self.recorder.record_outcome(false);
                self.recorder.record(
                    Severity::Error,
                    Category::Dispatch,
                    format!("Cannot dispatch placeholder '{}'", handle.name()),
                );
                false
            }
        }
    }

    pub fn dispatch_object(&self, bus: &dyn ForeignBus, object: &ForeignObject) -> bool {
        match self.ensure_state() {
            Ok(state) => state.bridge.dispatch(bus, object),
            Err(_) => false,
        }
    }

    pub fn dispatch_by_name(
        &self,
        bus: &dyn ForeignBus,
        type_name: &str,
        object: &ForeignObject,
    ) -> bool {
        match self.ensure_state() {
            Ok(state) => state.bridge.dispatch_by_name(&state.registry, bus, type_name, object),
            Err(_) => false,
        }
    }

    /// Register a dispatch function that survives reinitialization.
    pub fn register_dispatch<F>(&self, bus_type: TypeHandle, command_type: TypeHandle, f: F)
    where
        F: Fn(&dyn ForeignBus, &ForeignObject) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        let f: DispatchFn = Arc::new(f);
        let _guard = self.init_guard.lock();
        if let Some(state) = self.state.load_full() {
            state
                .bridge
                .register_fn(bus_type.clone(), command_type.clone(), Arc::clone(&f));
        }
        self.dispatch_fns.insert((bus_type, command_type), f);
    }

    /// Error-or-worse entries within `window`.
    pub fn recent_errors(&self, window: Duration) -> Vec<DiagnosticEntry> {
        self.recorder.recent_errors(window)
    }

    /// Run every component check. Never initializes the broker.
    pub fn health_check(&self) -> HealthReport {
        let mut components = Vec::with_capacity(4);

        match self.state.load_full() {
            Some(state) => {
                components.push(self.probe_registry(&state));
                components.push(self.probe_cache(&state));
                components.push(self.probe_factory(&state));
            }
            None => {
                let component = match self.failure() {
                    Some(reason) => ComponentHealth::new("broker", HealthStatus::Critical)
                        .detail(format!("initialization failed: {}", reason)),
                    None => ComponentHealth::new("broker", HealthStatus::Warning)
                        .detail("not initialized"),
                };
                components.push(component);
            }
        }
        components.push(self.probe_error_rate());

        let report = HealthReport::from_components(components);
        self.recorder.record(
            Severity::Debug,
            Category::Health,
            format!("Health check: {}", report.overall),
        );
        report
    }

    /// Plain-text report: health, error histogram, recent activity, services.
    pub fn diagnostic_info(&self) -> String {
        let health = self.health_check();
        let mut services = Vec::new();

        let mut broker = ServiceSection::new("broker")
            .line(format!("generation: {}", self.generation()));
        if let Some(reason) = self.failure() {
            broker = broker.line(format!("failure: {}", reason));
        }

        if let Some(state) = self.state.load_full() {
            broker = broker.line(format!("initialized at: {}", state.initialized_at.to_rfc3339()));

            let scan = state.registry.report();
            services.push(
                ServiceSection::new("registry")
                    .line(format!("command types: {}", state.registry.len()))
                    .line(format!("aliases: {}", state.registry.list_aliases().len()))
                    .line(format!(
                        "modules: {} scanned, {} partial, {} failed, {} skipped",
                        scan.modules_scanned,
                        scan.modules_partial,
                        scan.modules_failed,
                        scan.modules_skipped
                    ))
                    .line(format!("types seen: {}", scan.types_seen))
                    .line(format!("duplicate aliases: {}", scan.duplicate_aliases))
                    .line(format!("scan time: {:?}", scan.elapsed)),
            );

            let cache = state.cache.stats();
            services.push(
                ServiceSection::new("cache")
                    .line(format!("descriptors: {}", cache.descriptors))
                    .line(format!(
                        "constructors: {} cached, {} negative",
                        cache.constructor_entries, cache.negative_entries
                    ))
                    .line(format!("member lists: {}", cache.member_entries))
                    .line(format!(
                        "lookups: {} hits, {} resolutions ({:.1}% hit rate)",
                        cache.hits,
                        cache.resolutions,
                        cache.hit_rate() * 100.0
                    ))
                    .line(format!("fast-path invoke failures: {}", cache.invoke_failures)),
            );

            let factory = state.factory.stats();
            services.push(
                ServiceSection::new("factory")
                    .line(format!("fast path: {}", factory.fast_successes))
                    .line(format!("fallback: {}", factory.fallback_successes))
                    .line(format!("failures: {}", factory.failures))
                    .line(format!("verification warnings: {}", factory.verify_warnings)),
            );

            let dispatch = state.bridge.stats();
            services.push(
                ServiceSection::new("dispatch")
                    .line(format!("dispatched: {}", dispatch.dispatched))
                    .line(format!("failures: {}", dispatch.failures))
                    .line(format!("specializations: {}", dispatch.specializations))
                    .line(format!("functions: {}", dispatch.functions)),
            );
        }
        services.insert(0, broker);

        report::render(&health, &self.recorder, &services, self.config.diagnostics.report_recent)
    }

    // -------------------------------------------------------------------
    // Lifecycle internals
    // -------------------------------------------------------------------

    fn ensure_state(&self) -> Result<Arc<BrokerState>, BrokerError> {
        if let Some(state) = self.state.load_full() {
            return Ok(state);
        }
        if let Some(reason) = self.failure.load_full() {
            return Err(BrokerError::InitializationFailed(String::clone(&reason)));
        }

        let _guard = self.init_guard.lock();
        if let Some(state) = self.state.load_full() {
            return Ok(state);
        }
        if let Some(reason) = self.failure.load_full() {
            return Err(BrokerError::InitializationFailed(String::clone(&reason)));
        }

        match self.build_state() {
            Ok(state) => {
                let state = Arc::new(state);
                self.state.store(Some(Arc::clone(&state)));
                Ok(state)
            }
            Err(err) => {
                self.recorder.record_detail(
                    Severity::Critical,
                    Category::Initialization,
                    "Broker initialization failed",
                    err.to_string(),
                );
                self.failure.store(Some(Arc::new(err.to_string())));
                Err(err)
            }
        }
    }

    /// Build a complete state. Callers hold the init guard.
    fn build_state(&self) -> Result<BrokerState, BrokerError> {
        let start = Instant::now();
        let modules = self.runtime.list_modules().map_err(BrokerError::ModuleListing)?;

        let registry = Arc::new(TypeRegistry::new(
            NamingConvention::from_config(&self.config.naming),
            self.config.scan.clone(),
            Arc::clone(&self.recorder),
        ));
        registry.scan(self.runtime.as_ref(), &modules);

        let cache = Arc::new(TypeDescriptorCache::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.recorder),
        ));
        cache.warm_from(&registry.snapshot());

        let factory = InstanceFactory::new(
            Arc::clone(&cache),
            Arc::clone(&self.runtime),
            Arc::clone(&self.recorder),
        );

        let bridge = DispatchBridge::new(&self.config.dispatch, Arc::clone(&self.recorder));
        for entry in self.dispatch_fns.iter() {
            let (bus, command) = entry.key();
            bridge.register_fn(bus.clone(), command.clone(), Arc::clone(entry.value()));
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(
            "Broker generation {} ready: {} command types in {:?}",
            generation,
            registry.len(),
            start.elapsed()
        );
        self.recorder.record(
            Severity::Info,
            Category::Initialization,
            format!("Generation {} initialized with {} command types", generation, registry.len()),
        );

        Ok(BrokerState {
            generation,
            registry,
            cache,
            factory,
            bridge,
            initialized_at: Utc::now(),
        })
    }

    fn placeholder(
        &self,
        descriptor: Option<Arc<TypeDescriptor>>,
        name: &str,
        args: &[ForeignValue],
        failure: FailureKind,
        reason: String,
    ) -> Option<CommandHandle> {
        if !self.config.fallback_placeholders {
            return None;
        }
        tracing::debug!("Issuing placeholder for '{}': {}", name, reason);
        let fallback = FallbackCommand::new(name, args.to_vec(), failure, reason);
        Some(CommandHandle::placeholder(descriptor, fallback))
    }

    // -------------------------------------------------------------------
    // Component checks
    // -------------------------------------------------------------------

    fn probe_registry(&self, state: &BrokerState) -> ComponentHealth {
        let scan = state.registry.report();
        let count = state.registry.len();
        let mut health =
            ComponentHealth::healthy("registry").detail(format!("{} command types", count));
        if count == 0 {
            health.escalate(HealthStatus::Warning, "no command types discovered");
        }
        if scan.modules_partial + scan.modules_failed > 0 {
            health.details.push(format!(
                "{} module(s) partially enumerated, {} skipped on failure",
                scan.modules_partial, scan.modules_failed
            ));
        }
        health
    }

    fn probe_cache(&self, state: &BrokerState) -> ComponentHealth {
        let stats = state.cache.stats();
        let mut health = ComponentHealth::healthy("cache").detail(format!(
            "{} descriptors, {} constructor entries",
            stats.descriptors, stats.constructor_entries
        ));
        if stats.descriptors == 0 {
            health.escalate(HealthStatus::Warning, "cache is empty");
        }
        health
    }

    fn probe_factory(&self, state: &BrokerState) -> ComponentHealth {
        let sentinel = TypeHandle::new(self.config.sentinel_type.as_str());
        match state.factory.try_construct_discarded(&sentinel) {
            Ok(()) => ComponentHealth::healthy("factory")
                .detail(format!("constructed sentinel {}", sentinel)),
            Err(err) => ComponentHealth::new("factory", HealthStatus::Degraded)
                .detail(format!("sentinel {} could not be constructed: {}", sentinel, err)),
        }
    }

    fn probe_error_rate(&self) -> ComponentHealth {
        let window_secs = self.config.diagnostics.error_window_secs.min(MAX_ERROR_WINDOW_SECS);
        let window = Duration::seconds(i64::try_from(window_secs).unwrap_or(300));
        let sample = self.recorder.error_rate(window);
        let thresholds = ErrorRateThresholds::from_config(&self.config.diagnostics);
        let status = thresholds.classify(sample);

        ComponentHealth::new("error_rate", status).detail(format!(
            "{} failure(s) in {} operation(s) over {}s ({:.1}%)",
            sample.failures,
            sample.operations,
            window.num_seconds(),
            sample.rate() * 100.0
        ))
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("generation", &self.generation())
            .field("initialized", &self.is_initialized())
            .field("failure", &self.failure())
            .field("diagnostics", &self.recorder.len())
            .finish()
    }
}
