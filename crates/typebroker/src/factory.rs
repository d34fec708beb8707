// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance construction pipeline.
//!
//! Each call runs `validate -> fast path -> fallback -> verify`. Only a
//! construction error from the runtime is fatal; every softer anomaly lowers
//! confidence, is recorded, and lets the call continue.

use crate::cache::TypeDescriptorCache;
use crate::diagnostics::{Category, DiagnosticsRecorder, Severity};
use crate::registry::TypeDescriptor;
use crate::runtime::{ForeignObject, ForeignRuntime, ForeignValue, RuntimeError, TypeHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Hard construction failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("type {0} is unknown to the runtime")]
    UnknownType(String),

    #[error("construction of {type_name} failed: {source}")]
    Runtime {
        type_name: String,
        #[source]
        source: RuntimeError,
    },
}

/// Which path produced the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionPath {
    Fast,
    Fallback,
}

/// How much the pipeline trusts the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Reduced,
    High,
}

/// A constructed instance plus everything the pipeline noticed.
#[derive(Debug, Clone, PartialEq)]
pub struct Constructed {
    pub object: ForeignObject,
    pub path: ConstructionPath,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// Per-factory counters.
#[derive(Debug, Default)]
pub struct FactoryStats {
    pub fast_successes: AtomicU64,
    pub fallback_successes: AtomicU64,
    pub failures: AtomicU64,
    pub verify_warnings: AtomicU64,
}

impl FactoryStats {
    pub fn snapshot(&self) -> FactoryStatsSnapshot {
        FactoryStatsSnapshot {
            fast_successes: self.fast_successes.load(Ordering::Relaxed),
            fallback_successes: self.fallback_successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            verify_warnings: self.verify_warnings.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of factory statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactoryStatsSnapshot {
    pub fast_successes: u64,
    pub fallback_successes: u64,
    pub failures: u64,
    pub verify_warnings: u64,
}

impl FactoryStatsSnapshot {
    pub fn attempts(&self) -> u64 {
        self.fast_successes + self.fallback_successes + self.failures
    }
}

/// Builds instances through the cache, falling back to the runtime.
pub struct InstanceFactory {
    cache: Arc<TypeDescriptorCache>,
    runtime: Arc<dyn ForeignRuntime>,
    recorder: Arc<DiagnosticsRecorder>,
    stats: FactoryStats,
}

impl InstanceFactory {
    pub fn new(
        cache: Arc<TypeDescriptorCache>,
        runtime: Arc<dyn ForeignRuntime>,
        recorder: Arc<DiagnosticsRecorder>,
    ) -> Self {
        Self {
            cache,
            runtime,
            recorder,
            stats: FactoryStats::default(),
        }
    }

    /// Construct an instance of `ty`. `None` only on a hard failure.
    pub fn create(&self, ty: &TypeHandle, args: &[ForeignValue]) -> Option<ForeignObject> {
        self.create_detailed(ty, args).ok().map(|c| c.object)
    }

    /// Same as [`create`](Self::create), reporting path, confidence and warnings.
    pub fn create_detailed(
        &self,
        ty: &TypeHandle,
        args: &[ForeignValue],
    ) -> Result<Constructed, ConstructionError> {
        let mut warnings = Vec::new();
        let descriptor = self.cache.descriptor(ty);
        let mut confidence = match &descriptor {
            Some(d) => self.validate(d, args.len(), &mut warnings),
            None => Confidence::Reduced,
        };

        let (object, path) = match self.cache.create_fast(ty, args) {
            Some(object) => (object, ConstructionPath::Fast),
            None => match self.create_fallback(ty, descriptor.as_deref(), args) {
                Ok(object) => (object, ConstructionPath::Fallback),
                Err(err) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    self.recorder.record_outcome(false);
                    self.recorder.record_detail(
                        Severity::Error,
                        Category::Construction,
                        format!("Failed to construct {}", ty),
                        err.to_string(),
                    );
                    return Err(err);
                }
            },
        };

        if self.verify(ty, &object, &mut warnings) {
            confidence = Confidence::Reduced;
        }

        match path {
            ConstructionPath::Fast => self.stats.fast_successes.fetch_add(1, Ordering::Relaxed),
            ConstructionPath::Fallback => {
                self.stats.fallback_successes.fetch_add(1, Ordering::Relaxed)
            }
        };
        self.recorder.record_outcome(true);

        Ok(Constructed {
            object,
            path,
            confidence,
            warnings,
        })
    }

    /// Construct `ty` with no arguments and release the instance again.
    ///
    /// Touches neither factory stats nor the recorder.
    pub fn try_construct_discarded(&self, ty: &TypeHandle) -> Result<(), ConstructionError> {
        let descriptor = self.cache.descriptor(ty);
        let object = self.create_fallback(ty, descriptor.as_deref(), &[])?;
        self.runtime.release(&object);
        Ok(())
    }

    pub fn stats(&self) -> FactoryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Soft checks; never aborts.
    fn validate(
        &self,
        descriptor: &TypeDescriptor,
        arg_count: usize,
        warnings: &mut Vec<String>,
    ) -> Confidence {
        let mut confidence = Confidence::High;

        if !descriptor.has_public_constructor() {
            let message = format!("{} has no public constructor", descriptor.canonical_name());
            self.recorder.record(Severity::Debug, Category::Construction, message.clone());
            warnings.push(message);
            confidence = Confidence::Reduced;
        }
        if !descriptor.accepts_arity(arg_count) {
            let message = format!(
                "{} has no constructor taking {} argument(s)",
                descriptor.canonical_name(),
                arg_count
            );
            self.recorder.record(Severity::Debug, Category::Construction, message.clone());
            warnings.push(message);
            confidence = Confidence::Reduced;
        }

        confidence
    }

    fn create_fallback(
        &self,
        ty: &TypeHandle,
        descriptor: Option<&TypeDescriptor>,
        args: &[ForeignValue],
    ) -> Result<ForeignObject, ConstructionError> {
        let Some(descriptor) = descriptor else {
            return Err(ConstructionError::UnknownType(ty.to_string()));
        };

        let padded = pad_arguments(descriptor, args);
        if padded.len() != args.len() {
            tracing::debug!(
                "Padding {} argument(s) to {} for {}",
                args.len(),
                padded.len(),
                ty
            );
        }

        self.runtime
            .construct(ty, &padded)
            .map_err(|source| ConstructionError::Runtime {
                type_name: ty.to_string(),
                source,
            })
    }

    /// Returns true when any check failed.
    fn verify(&self, ty: &TypeHandle, object: &ForeignObject, warnings: &mut Vec<String>) -> bool {
        let mut flagged = false;

        if !self.runtime.is_instance_of(object, ty) {
            let message = format!(
                "Constructed {} is not an instance of {}",
                object.type_handle(),
                ty
            );
            self.recorder.record(Severity::Warning, Category::Construction, message.clone());
            warnings.push(message);
            flagged = true;
        }
        if self.runtime.display_string(object).is_none() {
            let message = format!("{} has no string representation (possible interop defect)", ty);
            self.recorder.record(Severity::Warning, Category::Construction, message.clone());
            warnings.push(message);
            flagged = true;
        }

        if flagged {
            self.stats.verify_warnings.fetch_add(1, Ordering::Relaxed);
        }
        flagged
    }
}

/// Pad missing trailing arguments with declared defaults (or null) up to the
/// arity of the best candidate constructor.
pub fn pad_arguments(descriptor: &TypeDescriptor, args: &[ForeignValue]) -> Vec<ForeignValue> {
    let mut padded = args.to_vec();
    if let Some(target) = descriptor.padding_target(args.len()) {
        padded.extend(
            target.params[args.len()..]
                .iter()
                .map(|p| p.default.clone().unwrap_or(ForeignValue::Null)),
        );
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ClassSpec, ConstructorSpec, InMemoryRuntime, ModuleSpec};

    fn setup() -> (Arc<InMemoryRuntime>, InstanceFactory, Arc<DiagnosticsRecorder>) {
        let runtime = Arc::new(
            InMemoryRuntime::builder()
                .module(
                    ModuleSpec::new("Game")
                        .class(
                            ClassSpec::new("Game.CmdMove").constructor(
                                ConstructorSpec::public()
                                    .param("x", TypeHandle::int())
                                    .param_with_default("label", TypeHandle::string(), "here"),
                            ),
                        )
                        .class(
                            ClassSpec::new("Game.CmdPing").constructor(
                                ConstructorSpec::public()
                                    .param("host", TypeHandle::string())
                                    .param("count", TypeHandle::int()),
                            ),
                        )
                        .class(
                            ClassSpec::new("Game.CmdSay").constructor(
                                ConstructorSpec::public()
                                    .param("text", TypeHandle::string())
                                    .param("target", TypeHandle::string()),
                            ),
                        )
                        .class(
                            ClassSpec::new("Game.CmdHidden")
                                .constructor(ConstructorSpec::non_public()),
                        )
                        .class(ClassSpec::new("Game.CmdGhost").opaque())
                        .class(ClassSpec::new("Game.CmdProxy").constructs_as("Game.Unit"))
                        .class(ClassSpec::new("Game.Unit"))
                        .class(ClassSpec::new("Game.CmdBoom").failing_constructor("kaboom")),
                )
                .build(),
        );
        let recorder = Arc::new(DiagnosticsRecorder::with_min_severity(100, Severity::Debug));
        let dyn_runtime: Arc<dyn ForeignRuntime> = runtime.clone();
        let cache = Arc::new(TypeDescriptorCache::new(dyn_runtime.clone(), Arc::clone(&recorder)));
        let factory = InstanceFactory::new(cache, dyn_runtime, Arc::clone(&recorder));
        (runtime, factory, recorder)
    }

    #[test]
    fn test_fast_path() {
        let (_, factory, _) = setup();
        let result = factory
            .create_detailed(
                &TypeHandle::new("Game.CmdMove"),
                &[ForeignValue::from(1), ForeignValue::from("there")],
            )
            .expect("created");
        assert_eq!(result.path, ConstructionPath::Fast);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.warnings.is_empty());
        assert_eq!(factory.stats().fast_successes, 1);
    }

    #[test]
    fn test_fallback_pads_declared_default() {
        let (runtime, factory, recorder) = setup();
        let result = factory
            .create_detailed(&TypeHandle::new("Game.CmdMove"), &[ForeignValue::from(5)])
            .expect("created");

        assert_eq!(result.path, ConstructionPath::Fallback);
        assert_eq!(result.confidence, Confidence::Reduced);
        assert_eq!(
            runtime.get_property(&result.object, "label").expect("label"),
            ForeignValue::from("here")
        );
        assert!(recorder
            .entries()
            .iter()
            .any(|e| e.severity == Severity::Debug && e.message.contains("taking 1 argument")));
        assert_eq!(factory.stats().fallback_successes, 1);
    }

    #[test]
    fn test_fallback_pads_null_without_default() {
        let (runtime, factory, _) = setup();
        let result = factory
            .create_detailed(&TypeHandle::new("Game.CmdSay"), &[ForeignValue::from("hi")])
            .expect("created");
        assert_eq!(result.path, ConstructionPath::Fallback);
        assert_eq!(
            runtime.get_property(&result.object, "target").expect("target"),
            ForeignValue::Null
        );

        // A null pad for a value-type parameter cannot be constructed.
        assert!(factory
            .create(&TypeHandle::new("Game.CmdPing"), &[ForeignValue::from("host")])
            .is_none());
    }

    #[test]
    fn test_fallback_coerces_arguments() {
        let (runtime, factory, _) = setup();
        let result = factory
            .create_detailed(
                &TypeHandle::new("Game.CmdPing"),
                &[ForeignValue::from(42), ForeignValue::from(3)],
            )
            .expect("created");
        assert_eq!(result.path, ConstructionPath::Fallback);
        assert_eq!(
            runtime.get_property(&result.object, "host").expect("host"),
            ForeignValue::from("42")
        );
    }

    #[test]
    fn test_never_panics_on_bad_arguments() {
        let (_, factory, _) = setup();
        let shapes: Vec<Vec<ForeignValue>> = vec![
            vec![],
            vec![ForeignValue::Null],
            vec![ForeignValue::Null, ForeignValue::Null],
            vec![ForeignValue::from(true); 5],
            vec![ForeignValue::from("x"), ForeignValue::from(1.5), ForeignValue::Null],
        ];
        let names = [
            "Game.CmdMove",
            "Game.CmdPing",
            "Game.CmdHidden",
            "Game.CmdBoom",
            "Game.Nope",
        ];
        for name in names {
            for args in &shapes {
                let _ = factory.create(&TypeHandle::new(name), args);
            }
        }
    }

    #[test]
    fn test_hard_failure_is_recorded() {
        let (_, factory, recorder) = setup();
        let err = factory
            .create_detailed(&TypeHandle::new("Game.CmdBoom"), &[])
            .unwrap_err();
        assert!(matches!(err, ConstructionError::Runtime { .. }));
        assert_eq!(factory.stats().failures, 1);

        let errors = recorder.recent_errors(chrono::Duration::minutes(5));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, Category::Construction);
    }

    #[test]
    fn test_unknown_type() {
        let (_, factory, _) = setup();
        assert!(matches!(
            factory.create_detailed(&TypeHandle::new("Game.Nope"), &[]),
            Err(ConstructionError::UnknownType(_))
        ));
    }

    #[test]
    fn test_verify_warnings_are_not_fatal() {
        let (_, factory, recorder) = setup();

        let ghost = factory
            .create_detailed(&TypeHandle::new("Game.CmdGhost"), &[])
            .expect("ghost");
        assert_eq!(ghost.confidence, Confidence::Reduced);
        assert!(ghost.warnings[0].contains("possible interop defect"));

        let proxy = factory
            .create_detailed(&TypeHandle::new("Game.CmdProxy"), &[])
            .expect("proxy");
        assert!(proxy.warnings[0].contains("is not an instance of"));

        assert_eq!(factory.stats().verify_warnings, 2);
        let warnings = recorder
            .entries()
            .into_iter()
            .filter(|e| e.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 2);
    }

    #[test]
    fn test_non_public_constructor_lowers_confidence() {
        let (_, factory, _) = setup();
        let result = factory
            .create_detailed(&TypeHandle::new("Game.CmdHidden"), &[])
            .expect("non-public constructors are still reachable");
        assert_eq!(result.confidence, Confidence::Reduced);
    }

    #[test]
    fn test_try_construct_discarded_leaves_no_trace() {
        let (runtime, factory, recorder) = setup();

        assert!(factory.try_construct_discarded(&TypeHandle::new("Game.Unit")).is_ok());
        assert!(matches!(
            factory.try_construct_discarded(&TypeHandle::new("Game.CmdBoom")),
            Err(ConstructionError::Runtime { .. })
        ));
        assert!(matches!(
            factory.try_construct_discarded(&TypeHandle::new("Game.Missing")),
            Err(ConstructionError::UnknownType(_))
        ));

        assert_eq!(factory.stats().attempts(), 0);
        assert!(recorder.is_empty());
        assert_eq!(recorder.error_rate(chrono::Duration::minutes(5)).operations, 0);
        assert_eq!(runtime.live_objects(), 0);
    }
}
