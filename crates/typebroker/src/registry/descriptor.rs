// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Immutable per-type records built during a scan.

use crate::runtime::{ConstructorHandle, ForeignRuntime, ForeignTypeInfo, ModuleRef, TypeHandle};
use std::sync::Arc;

/// Everything the broker knows about one foreign type.
///
/// Built once, never mutated; a re-scan replaces descriptors wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    canonical_name: String,
    name: String,
    handle: TypeHandle,
    aliases: Vec<String>,
    module: ModuleRef,
    /// Public first, then ascending arity.
    constructors: Vec<ConstructorHandle>,
    command: bool,
}

impl TypeDescriptor {
    /// Build from runtime metadata.
    ///
    /// `aliases` are the lookup names the registry will index; an empty list
    /// marks a descriptor that was described on demand rather than discovered.
    pub fn build(
        runtime: &dyn ForeignRuntime,
        info: &ForeignTypeInfo,
        aliases: Vec<String>,
    ) -> Self {
        let mut constructors: Vec<ConstructorHandle> = runtime
            .constructors(&info.handle)
            .into_iter()
            .map(Arc::new)
            .collect();
        constructors.sort_by_key(|c| (!c.is_public(), c.arity()));

        Self {
            canonical_name: info.handle.as_str().to_string(),
            name: info.name().to_string(),
            handle: info.handle.clone(),
            command: !aliases.is_empty(),
            aliases,
            module: info.module.clone(),
            constructors,
        }
    }

    /// Describe a type that was not discovered by a scan.
    pub fn describe(runtime: &dyn ForeignRuntime, ty: &TypeHandle) -> Option<Self> {
        let info = runtime.describe(ty)?;
        Some(Self::build(runtime, &info, Vec::new()))
    }

    /// Namespace-qualified name.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Bare (short) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &TypeHandle {
        &self.handle
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    pub fn constructors(&self) -> &[ConstructorHandle] {
        &self.constructors
    }

    /// Discovered as a command type (as opposed to described on demand).
    pub fn is_command(&self) -> bool {
        self.command
    }

    pub fn has_public_constructor(&self) -> bool {
        self.constructors.iter().any(|c| c.is_public())
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        self.constructors.iter().any(|c| c.arity() == arity)
    }

    /// Best candidate for argument padding: the smallest arity that is at
    /// least `arg_count`, public constructors preferred on ties.
    pub fn padding_target(&self, arg_count: usize) -> Option<&ConstructorHandle> {
        self.constructors
            .iter()
            .filter(|c| c.arity() >= arg_count)
            .min_by_key(|c| (c.arity(), !c.is_public()))
    }
}
