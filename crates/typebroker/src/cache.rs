// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent cache for per-type construction and member metadata.
//!
//! Constructor resolution is expensive (it walks type hierarchies through
//! the runtime), so every resolution is memoized by `(type, argument-type
//! signature)`. Failed resolutions go to a separate negative set, which makes
//! repeated misses as cheap as hits. Entries are append-only until `clear()`.

use crate::diagnostics::{Category, DiagnosticsRecorder, Severity};
use crate::registry::TypeDescriptor;
use crate::runtime::{
    ConstructorHandle, ForeignObject, ForeignRuntime, ForeignValue, MemberInfo, TypeHandle,
};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one constructor lookup. `None` stands for a null argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    ty: TypeHandle,
    args: Vec<Option<TypeHandle>>,
}

impl SignatureKey {
    pub fn new(ty: &TypeHandle, args: &[Option<TypeHandle>]) -> Self {
        Self {
            ty: ty.clone(),
            args: args.to_vec(),
        }
    }
}

/// Cache lookup statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Constructor lookups answered from a positive or negative entry.
    pub hits: u64,
    /// Constructor lookups that had to be resolved.
    pub resolutions: u64,
    pub descriptors: usize,
    pub constructor_entries: usize,
    pub negative_entries: usize,
    pub member_entries: usize,
    /// Resolved constructors that then failed to run.
    pub invoke_failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.resolutions;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Descriptor, constructor and member cache over one runtime.
pub struct TypeDescriptorCache {
    runtime: Arc<dyn ForeignRuntime>,
    recorder: Arc<DiagnosticsRecorder>,
    descriptors: DashMap<TypeHandle, Arc<TypeDescriptor>>,
    constructors: DashMap<SignatureKey, ConstructorHandle>,
    misses: DashSet<SignatureKey>,
    members: DashMap<TypeHandle, Arc<[MemberInfo]>>,
    hits: AtomicU64,
    resolutions: AtomicU64,
    invoke_failures: AtomicU64,
}

impl TypeDescriptorCache {
    pub fn new(runtime: Arc<dyn ForeignRuntime>, recorder: Arc<DiagnosticsRecorder>) -> Self {
        Self {
            runtime,
            recorder,
            descriptors: DashMap::new(),
            constructors: DashMap::new(),
            misses: DashSet::new(),
            members: DashMap::new(),
            hits: AtomicU64::new(0),
            resolutions: AtomicU64::new(0),
            invoke_failures: AtomicU64::new(0),
        }
    }

    /// Pre-populate descriptors from a registry snapshot.
    pub fn warm_from(&self, descriptors: &HashMap<String, Arc<TypeDescriptor>>) -> usize {
        for descriptor in descriptors.values() {
            self.descriptors
                .insert(descriptor.handle().clone(), Arc::clone(descriptor));
        }
        tracing::debug!("Cache warmed with {} descriptors", descriptors.len());
        descriptors.len()
    }

    /// Descriptor for `ty`, described through the runtime on first use.
    pub fn descriptor(&self, ty: &TypeHandle) -> Option<Arc<TypeDescriptor>> {
        if let Some(hit) = self.descriptors.get(ty) {
            return Some(Arc::clone(hit.value()));
        }
        let described = Arc::new(TypeDescriptor::describe(self.runtime.as_ref(), ty)?);
        let entry = self.descriptors.entry(ty.clone()).or_insert(described);
        Some(Arc::clone(entry.value()))
    }

    /// Resolve a constructor for an argument-type signature.
    ///
    /// Order: cached entry, exact parameter match, compatible match.
    pub fn get_constructor(
        &self,
        ty: &TypeHandle,
        arg_types: &[Option<TypeHandle>],
    ) -> Option<ConstructorHandle> {
        let key = SignatureKey::new(ty, arg_types);

        if let Some(hit) = self.constructors.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(hit.value()));
        }
        if self.misses.contains(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let resolved = self
            .descriptor(ty)
            .and_then(|descriptor| self.resolve(&descriptor, arg_types));

        match resolved {
            Some(ctor) => {
                let entry = self.constructors.entry(key).or_insert(ctor);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.insert(key);
                None
            }
        }
    }

    /// Members of `ty`, fetched once.
    pub fn get_members(&self, ty: &TypeHandle) -> Arc<[MemberInfo]> {
        if let Some(hit) = self.members.get(ty) {
            return Arc::clone(hit.value());
        }
        let fetched: Arc<[MemberInfo]> = self.runtime.members(ty).into();
        let entry = self.members.entry(ty.clone()).or_insert(fetched);
        Arc::clone(entry.value())
    }

    /// Resolve and invoke. Any failure yields `None`.
    pub fn create_fast(&self, ty: &TypeHandle, args: &[ForeignValue]) -> Option<ForeignObject> {
        let signature: Vec<Option<TypeHandle>> =
            args.iter().map(ForeignValue::type_handle).collect();
        let ctor = self.get_constructor(ty, &signature)?;

        match self.runtime.invoke_constructor(&ctor, args) {
            Ok(object) => Some(object),
            Err(err) => {
                self.invoke_failures.fetch_add(1, Ordering::Relaxed);
                self.recorder.record_detail(
                    Severity::Debug,
                    Category::Cache,
                    format!("Fast path failed for {}", ctor.signature()),
                    err.to_string(),
                );
                None
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            descriptors: self.descriptors.len(),
            constructor_entries: self.constructors.len(),
            negative_entries: self.misses.len(),
            member_entries: self.members.len(),
            invoke_failures: self.invoke_failures.load(Ordering::Relaxed),
        }
    }

    /// Number of known descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.descriptors.clear();
        self.constructors.clear();
        self.misses.clear();
        self.members.clear();
    }

    fn resolve(
        &self,
        descriptor: &TypeDescriptor,
        args: &[Option<TypeHandle>],
    ) -> Option<ConstructorHandle> {
        let arity = args.len();
        let same_arity = move || {
            descriptor
                .constructors()
                .iter()
                .filter(move |c| c.arity() == arity)
        };

        let exact = same_arity().find(|ctor| {
            ctor.params
                .iter()
                .zip(args)
                .all(|(p, a)| a.as_ref() == Some(&p.type_handle))
        });
        if let Some(ctor) = exact {
            return Some(Arc::clone(ctor));
        }

        same_arity()
            .find(|ctor| {
                ctor.params
                    .iter()
                    .zip(args)
                    .all(|(p, a)| self.is_compatible(&p.type_handle, a.as_ref()))
            })
            .map(Arc::clone)
    }

    fn is_compatible(&self, param: &TypeHandle, arg: Option<&TypeHandle>) -> bool {
        match arg {
            None => !param.is_value_type(),
            Some(actual) => {
                actual == param
                    || param.is_any_object()
                    || self.runtime.is_assignable(param, actual)
            }
        }
    }
}
