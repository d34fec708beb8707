// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory reference implementation of [`ForeignRuntime`].
//!
//! Types are declared up front with a fluent builder:
//!
//! ```
//! use typebroker::runtime::{ClassSpec, ConstructorSpec, InMemoryRuntime, ModuleSpec, TypeHandle};
//!
//! let runtime = InMemoryRuntime::builder()
//!     .module(
//!         ModuleSpec::new("Game.Core")
//!             .primary()
//!             .class(
//!                 ClassSpec::new("Game.Commands.CmdMove")
//!                     .constructor(ConstructorSpec::public().param("x", TypeHandle::int())),
//!             ),
//!     )
//!     .build();
//! assert_eq!(runtime.class_count(), 1);
//! ```
//!
//! Classes without an explicit constructor get an implicit public
//! zero-argument one. Constructor parameters become readable/writable
//! properties on the constructed object.

use super::{
    ConstructorInfo, EnumerationError, ForeignObject, ForeignRuntime, ForeignTypeInfo, ForeignValue,
    MemberInfo, MemberKind, ModuleRef, ObjectId, ParamInfo, RuntimeError, TypeHandle, Visibility,
    MAX_ANCESTOR_DEPTH,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the built-in module holding `object` and the primitive types.
/// It is never listed by [`ForeignRuntime::list_modules`].
const CORE_MODULE: &str = "runtime.core";

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Declaration of one constructor.
#[derive(Debug, Clone)]
pub struct ConstructorSpec {
    visibility: Visibility,
    params: Vec<ParamInfo>,
}

impl ConstructorSpec {
    pub fn public() -> Self {
        Self {
            visibility: Visibility::Public,
            params: Vec::new(),
        }
    }

    pub fn non_public() -> Self {
        Self {
            visibility: Visibility::NonPublic,
            params: Vec::new(),
        }
    }

    /// Add a required parameter.
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeHandle>) -> Self {
        self.params.push(ParamInfo {
            name: name.into(),
            type_handle: ty.into(),
            default: None,
        });
        self
    }

    /// Add an optional parameter with a declared default.
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeHandle>,
        default: impl Into<ForeignValue>,
    ) -> Self {
        self.params.push(ParamInfo {
            name: name.into(),
            type_handle: ty.into(),
            default: Some(default.into()),
        });
        self
    }
}

/// Declaration of one class.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    handle: TypeHandle,
    bases: Vec<TypeHandle>,
    is_abstract: bool,
    is_interface: bool,
    constructors: Vec<ConstructorSpec>,
    members: Vec<MemberInfo>,
    returns: HashMap<String, ForeignValue>,
    broken: bool,
    failing_constructor: Option<String>,
    opaque: bool,
    constructs_as: Option<TypeHandle>,
}

impl ClassSpec {
    pub fn new(name: impl Into<TypeHandle>) -> Self {
        Self {
            handle: name.into(),
            bases: Vec::new(),
            is_abstract: false,
            is_interface: false,
            constructors: Vec::new(),
            members: Vec::new(),
            returns: HashMap::new(),
            broken: false,
            failing_constructor: None,
            opaque: false,
            constructs_as: None,
        }
    }

    /// Add a base type or implemented interface.
    pub fn base(mut self, base: impl Into<TypeHandle>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn constructor(mut self, ctor: ConstructorSpec) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Declare a readable and writable property.
    pub fn property(mut self, name: impl Into<String>, ty: impl Into<TypeHandle>) -> Self {
        self.members.push(MemberInfo {
            name: name.into(),
            kind: MemberKind::Property {
                readable: true,
                writable: true,
            },
            value_type: ty.into(),
        });
        self
    }

    /// Declare a read-only property.
    pub fn readonly_property(mut self, name: impl Into<String>, ty: impl Into<TypeHandle>) -> Self {
        self.members.push(MemberInfo {
            name: name.into(),
            kind: MemberKind::Property {
                readable: true,
                writable: false,
            },
            value_type: ty.into(),
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeHandle>) -> Self {
        self.members.push(MemberInfo {
            name: name.into(),
            kind: MemberKind::Field,
            value_type: ty.into(),
        });
        self
    }

    /// Declare a method returning null.
    pub fn method(mut self, name: impl Into<String>, arity: usize) -> Self {
        self.members.push(MemberInfo {
            name: name.into(),
            kind: MemberKind::Method { arity },
            value_type: TypeHandle::any_object(),
        });
        self
    }

    /// Declare a method returning a fixed value.
    pub fn method_returning(
        mut self,
        name: impl Into<String>,
        arity: usize,
        value: impl Into<ForeignValue>,
    ) -> Self {
        let name = name.into();
        let value = value.into();
        self.members.push(MemberInfo {
            name: name.clone(),
            kind: MemberKind::Method { arity },
            value_type: value.type_handle().unwrap_or_else(TypeHandle::any_object),
        });
        self.returns.insert(name, value);
        self
    }

    /// The type fails to load: it is left out of enumeration, which then
    /// reports a partial failure for its module.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Every construction of this type fails with the given message.
    pub fn failing_constructor(mut self, message: impl Into<String>) -> Self {
        self.failing_constructor = Some(message.into());
        self
    }

    /// Instances have no string representation.
    pub fn opaque(mut self) -> Self {
        self.opaque = true;
        self
    }

    /// Construction yields an instance of another type (proxying runtimes).
    pub fn constructs_as(mut self, other: impl Into<TypeHandle>) -> Self {
        self.constructs_as = Some(other.into());
        self
    }
}

/// Declaration of one module.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    name: String,
    primary: bool,
    unavailable: Option<String>,
    classes: Vec<ClassSpec>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: false,
            unavailable: None,
            classes: Vec::new(),
        }
    }

    /// Flag as the host application's own module.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Enumeration of this module fails outright.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    pub fn class(mut self, class: ClassSpec) -> Self {
        self.classes.push(class);
        self
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ClassDef {
    info: ForeignTypeInfo,
    constructors: Vec<ConstructorInfo>,
    members: Vec<MemberInfo>,
    returns: HashMap<String, ForeignValue>,
    broken: bool,
    failing_constructor: Option<String>,
    opaque: bool,
    constructs_as: Option<TypeHandle>,
}

#[derive(Debug)]
struct ModuleDef {
    module: ModuleRef,
    unavailable: Option<String>,
    classes: Vec<TypeHandle>,
}

#[derive(Debug, Default)]
struct State {
    modules: Vec<ModuleDef>,
    classes: HashMap<TypeHandle, ClassDef>,
    listing_failure: Option<String>,
}

impl State {
    fn insert_module(&mut self, spec: ModuleSpec) {
        let module = ModuleRef {
            name: spec.name.into(),
            primary: spec.primary,
        };
        let mut handles = Vec::with_capacity(spec.classes.len());
        for class in spec.classes {
            handles.push(class.handle.clone());
            self.insert_class(&module, class);
        }
        self.modules.push(ModuleDef {
            module,
            unavailable: spec.unavailable,
            classes: handles,
        });
    }

    fn insert_class(&mut self, module: &ModuleRef, spec: ClassSpec) {
        let mut ctor_specs = spec.constructors;
        if ctor_specs.is_empty() && !spec.is_abstract && !spec.is_interface {
            ctor_specs.push(ConstructorSpec::public());
        }

        let constructors = ctor_specs
            .into_iter()
            .enumerate()
            .map(|(token, c)| ConstructorInfo {
                declaring_type: spec.handle.clone(),
                params: c.params,
                visibility: c.visibility,
                token: u32::try_from(token).unwrap_or(u32::MAX),
            })
            .collect();

        let info = ForeignTypeInfo {
            handle: spec.handle.clone(),
            module: module.clone(),
            is_abstract: spec.is_abstract,
            is_interface: spec.is_interface,
            bases: spec.bases,
        };

        self.classes.insert(
            spec.handle,
            ClassDef {
                info,
                constructors,
                members: spec.members,
                returns: spec.returns,
                broken: spec.broken,
                failing_constructor: spec.failing_constructor,
                opaque: spec.opaque,
                constructs_as: spec.constructs_as,
            },
        );
    }
}

#[derive(Debug)]
struct ConstructionTarget {
    produced: TypeHandle,
    constructors: Vec<ConstructorInfo>,
}

#[derive(Debug)]
struct LiveObject {
    type_handle: TypeHandle,
    properties: HashMap<String, ForeignValue>,
}

/// Builder for [`InMemoryRuntime`].
#[derive(Debug, Default)]
pub struct InMemoryRuntimeBuilder {
    modules: Vec<ModuleSpec>,
    listing_failure: Option<String>,
}

impl InMemoryRuntimeBuilder {
    pub fn module(mut self, module: ModuleSpec) -> Self {
        self.modules.push(module);
        self
    }

    /// Module listing fails from the start.
    pub fn listing_failure(mut self, reason: impl Into<String>) -> Self {
        self.listing_failure = Some(reason.into());
        self
    }

    pub fn build(self) -> InMemoryRuntime {
        let mut state = State {
            listing_failure: self.listing_failure,
            ..State::default()
        };

        let core = ModuleRef::new(CORE_MODULE);
        state.insert_class(&core, ClassSpec::new(TypeHandle::any_object()));
        for primitive in [
            TypeHandle::bool_type(),
            TypeHandle::int(),
            TypeHandle::float(),
            TypeHandle::string(),
        ] {
            // Primitives are values, never constructed through the broker.
            state.insert_class(&core, ClassSpec::new(primitive).abstract_class());
        }

        for module in self.modules {
            state.insert_module(module);
        }

        InMemoryRuntime {
            state: RwLock::new(state),
            objects: DashMap::new(),
            next_id: AtomicU64::new(1),
            list_calls: AtomicU64::new(0),
            constructions: AtomicU64::new(0),
        }
    }
}

/// Thread-safe in-memory foreign runtime.
#[derive(Debug)]
pub struct InMemoryRuntime {
    state: RwLock<State>,
    objects: DashMap<u64, LiveObject>,
    next_id: AtomicU64,
    list_calls: AtomicU64,
    constructions: AtomicU64,
}

impl InMemoryRuntime {
    pub fn builder() -> InMemoryRuntimeBuilder {
        InMemoryRuntimeBuilder::default()
    }

    /// Load an additional module after construction.
    pub fn load_module(&self, module: ModuleSpec) {
        self.state.write().insert_module(module);
    }

    /// Make module listing fail (or succeed again with `None`).
    pub fn set_listing_failure(&self, reason: Option<String>) {
        self.state.write().listing_failure = reason;
    }

    /// Number of user-declared classes (built-ins excluded).
    pub fn class_count(&self) -> usize {
        self.state
            .read()
            .classes
            .values()
            .filter(|c| &*c.info.module.name != CORE_MODULE)
            .count()
    }

    /// Number of `list_modules` calls so far.
    pub fn list_modules_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of successful constructions so far.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Number of live objects.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Copy out what construction needs so no lock is held while
    /// arguments are checked against the type graph.
    fn construction_target(&self, ty: &TypeHandle) -> Result<ConstructionTarget, RuntimeError> {
        let state = self.state.read();
        let class = state
            .classes
            .get(ty)
            .filter(|c| !c.broken)
            .ok_or_else(|| RuntimeError::TypeNotFound(ty.to_string()))?;

        if !class.info.is_instantiable() {
            return Err(RuntimeError::Invocation {
                target: ty.to_string(),
                message: "type is not instantiable".to_string(),
            });
        }
        if let Some(message) = &class.failing_constructor {
            return Err(RuntimeError::Invocation {
                target: ty.to_string(),
                message: message.clone(),
            });
        }

        Ok(ConstructionTarget {
            produced: class
                .constructs_as
                .clone()
                .unwrap_or_else(|| class.info.handle.clone()),
            constructors: class.constructors.clone(),
        })
    }

    fn allocate(
        &self,
        type_handle: TypeHandle,
        params: &[ParamInfo],
        args: Vec<ForeignValue>,
    ) -> ForeignObject {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let properties = params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();

        self.objects.insert(
            id,
            LiveObject {
                type_handle: type_handle.clone(),
                properties,
            },
        );
        self.constructions.fetch_add(1, Ordering::Relaxed);
        ForeignObject::new(ObjectId(id), type_handle)
    }

    /// Whether `value` may be passed for `param` without conversion.
    fn accepts(&self, param: &TypeHandle, value: &ForeignValue) -> bool {
        match value.type_handle() {
            None => !param.is_value_type(),
            Some(actual) => self.is_assignable(param, &actual),
        }
    }

    /// Loose conversion used by the untyped construction path.
    fn coerce(&self, param: &TypeHandle, value: &ForeignValue) -> Option<ForeignValue> {
        if self.accepts(param, value) {
            return Some(value.clone());
        }
        match (param.as_str(), value) {
            (TypeHandle::FLOAT, ForeignValue::Int(_)) => value.as_float().map(ForeignValue::Float),
            (TypeHandle::STRING, ForeignValue::Int(v)) => Some(ForeignValue::Str(v.to_string())),
            _ => None,
        }
    }

    /// Own members, constructor parameters as properties, then inherited members.
    fn collect_members(state: &State, ty: &TypeHandle) -> Vec<MemberInfo> {
        let mut out: Vec<MemberInfo> = Vec::new();
        let mut push = |m: MemberInfo| {
            if !out.iter().any(|e| e.name == m.name) {
                out.push(m);
            }
        };

        let mut chain = vec![ty.clone()];
        let mut i = 0;
        while i < chain.len() && i <= MAX_ANCESTOR_DEPTH {
            if let Some(class) = state.classes.get(&chain[i]) {
                class.members.iter().cloned().for_each(&mut push);
                for ctor in &class.constructors {
                    for p in &ctor.params {
                        push(MemberInfo {
                            name: p.name.clone(),
                            kind: MemberKind::Property {
                                readable: true,
                                writable: true,
                            },
                            value_type: p.type_handle.clone(),
                        });
                    }
                }
                for base in &class.info.bases {
                    if !chain.contains(base) {
                        chain.push(base.clone());
                    }
                }
            }
            i += 1;
        }
        out
    }

    fn find_member(&self, ty: &TypeHandle, name: &str) -> Option<MemberInfo> {
        let state = self.state.read();
        Self::collect_members(&state, ty)
            .into_iter()
            .find(|m| m.name == name)
    }

    fn object_type(&self, object: &ForeignObject) -> Result<TypeHandle, RuntimeError> {
        self.objects
            .get(&object.id().0)
            .map(|o| o.type_handle.clone())
            .ok_or(RuntimeError::DeadObject(object.id().0))
    }
}

impl ForeignRuntime for InMemoryRuntime {
    fn list_modules(&self) -> Result<Vec<ModuleRef>, RuntimeError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        if let Some(reason) = &state.listing_failure {
            return Err(RuntimeError::Unavailable(reason.clone()));
        }
        Ok(state.modules.iter().map(|m| m.module.clone()).collect())
    }

    fn enumerate_types(
        &self,
        module: &ModuleRef,
    ) -> Result<Vec<ForeignTypeInfo>, EnumerationError> {
        let state = self.state.read();
        let Some(def) = state.modules.iter().find(|m| m.module.name == module.name) else {
            return Err(EnumerationError::Unavailable {
                module: module.name.to_string(),
                reason: "module not loaded".to_string(),
            });
        };

        if let Some(reason) = &def.unavailable {
            return Err(EnumerationError::Unavailable {
                module: module.name.to_string(),
                reason: reason.clone(),
            });
        }

        let mut loaded = Vec::with_capacity(def.classes.len());
        let mut failed = Vec::new();
        for handle in &def.classes {
            match state.classes.get(handle) {
                Some(class) if !class.broken => loaded.push(class.info.clone()),
                _ => failed.push(handle.to_string()),
            }
        }

        if failed.is_empty() {
            Ok(loaded)
        } else {
            Err(EnumerationError::Partial {
                module: module.name.to_string(),
                loaded,
                reason: format!("failed to load {}", failed.join(", ")),
            })
        }
    }

    fn describe(&self, ty: &TypeHandle) -> Option<ForeignTypeInfo> {
        let state = self.state.read();
        state
            .classes
            .get(ty)
            .filter(|c| !c.broken)
            .map(|c| c.info.clone())
    }

    fn constructors(&self, ty: &TypeHandle) -> Vec<ConstructorInfo> {
        let state = self.state.read();
        state
            .classes
            .get(ty)
            .filter(|c| !c.broken)
            .map(|c| c.constructors.clone())
            .unwrap_or_default()
    }

    fn members(&self, ty: &TypeHandle) -> Vec<MemberInfo> {
        let state = self.state.read();
        Self::collect_members(&state, ty)
    }

    fn invoke_constructor(
        &self,
        ctor: &ConstructorInfo,
        args: &[ForeignValue],
    ) -> Result<ForeignObject, RuntimeError> {
        let target = self.construction_target(&ctor.declaring_type)?;

        if ctor.arity() != args.len() {
            return Err(RuntimeError::NoMatchingConstructor {
                type_name: ctor.declaring_type.to_string(),
                arity: args.len(),
            });
        }
        for (index, (param, arg)) in ctor.params.iter().zip(args).enumerate() {
            if !self.accepts(&param.type_handle, arg) {
                return Err(RuntimeError::ArgumentMismatch {
                    target: ctor.signature(),
                    index,
                    expected: param.type_handle.to_string(),
                    actual: arg
                        .type_handle()
                        .map_or_else(|| "null".to_string(), |t| t.to_string()),
                });
            }
        }

        Ok(self.allocate(target.produced, &ctor.params, args.to_vec()))
    }

    fn construct(
        &self,
        ty: &TypeHandle,
        args: &[ForeignValue],
    ) -> Result<ForeignObject, RuntimeError> {
        let target = self.construction_target(ty)?;

        // Public constructors first, then non-public, first coercible wins.
        let mut candidates: Vec<&ConstructorInfo> = target
            .constructors
            .iter()
            .filter(|c| c.arity() == args.len())
            .collect();
        candidates.sort_by_key(|c| !c.is_public());

        for ctor in candidates {
            let coerced: Option<Vec<ForeignValue>> = ctor
                .params
                .iter()
                .zip(args)
                .map(|(p, a)| self.coerce(&p.type_handle, a))
                .collect();
            if let Some(coerced) = coerced {
                return Ok(self.allocate(target.produced.clone(), &ctor.params, coerced));
            }
        }

        Err(RuntimeError::NoMatchingConstructor {
            type_name: ty.to_string(),
            arity: args.len(),
        })
    }

    fn display_string(&self, object: &ForeignObject) -> Option<String> {
        let ty = self.object_type(object).ok()?;
        let state = self.state.read();
        if state.classes.get(&ty).is_some_and(|c| c.opaque) {
            return None;
        }
        Some(format!("{}#{}", ty.short_name(), object.id().0))
    }

    fn get_property(
        &self,
        object: &ForeignObject,
        name: &str,
    ) -> Result<ForeignValue, RuntimeError> {
        let ty = self.object_type(object)?;
        if let Some(value) = self
            .objects
            .get(&object.id().0)
            .and_then(|o| o.properties.get(name).cloned())
        {
            return Ok(value);
        }
        match self.find_member(&ty, name).map(|m| m.kind) {
            Some(MemberKind::Property { readable: true, .. } | MemberKind::Field) => {
                Ok(ForeignValue::Null)
            }
            _ => Err(RuntimeError::MemberNotFound {
                type_name: ty.to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn set_property(
        &self,
        object: &ForeignObject,
        name: &str,
        value: ForeignValue,
    ) -> Result<(), RuntimeError> {
        let ty = self.object_type(object)?;
        let member = self
            .find_member(&ty, name)
            .ok_or_else(|| RuntimeError::MemberNotFound {
                type_name: ty.to_string(),
                member: name.to_string(),
            })?;

        match member.kind {
            MemberKind::Property { writable: true, .. } | MemberKind::Field => {}
            _ => {
                return Err(RuntimeError::Invocation {
                    target: format!("{}.{}", ty, name),
                    message: "member is not writable".to_string(),
                })
            }
        }
        if !self.accepts(&member.value_type, &value) {
            return Err(RuntimeError::ArgumentMismatch {
                target: format!("{}.{}", ty, name),
                index: 0,
                expected: member.value_type.to_string(),
                actual: value
                    .type_handle()
                    .map_or_else(|| "null".to_string(), |t| t.to_string()),
            });
        }

        if let Some(mut live) = self.objects.get_mut(&object.id().0) {
            live.properties.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn invoke_method(
        &self,
        object: &ForeignObject,
        name: &str,
        args: &[ForeignValue],
    ) -> Result<ForeignValue, RuntimeError> {
        let ty = self.object_type(object)?;
        let state = self.state.read();
        let members = Self::collect_members(&state, &ty);

        let method = members.iter().find(|m| {
            m.name == name && matches!(m.kind, MemberKind::Method { arity } if arity == args.len())
        });
        if method.is_none() {
            return Err(RuntimeError::MemberNotFound {
                type_name: ty.to_string(),
                member: format!("{}/{}", name, args.len()),
            });
        }

        // Walk the declaring chain for a fixed return value.
        let mut current = Some(ty);
        let mut depth = 0;
        while let Some(t) = current.take() {
            let Some(class) = state.classes.get(&t) else {
                break;
            };
            if let Some(value) = class.returns.get(name) {
                return Ok(value.clone());
            }
            depth += 1;
            if depth <= MAX_ANCESTOR_DEPTH {
                current = class.info.bases.first().cloned();
            }
        }
        Ok(ForeignValue::Null)
    }

    fn release(&self, object: &ForeignObject) {
        self.objects.remove(&object.id().0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> InMemoryRuntime {
        InMemoryRuntime::builder()
            .module(
                ModuleSpec::new("Game.Core")
                    .primary()
                    .class(
                        ClassSpec::new("Game.Commands.CmdMove")
                            .constructor(
                                ConstructorSpec::public()
                                    .param("x", TypeHandle::int())
                                    .param_with_default("speed", TypeHandle::float(), 1.5),
                            )
                            .method_returning("Describe", 0, "move"),
                    )
                    .class(ClassSpec::new("Game.Commands.Broken").broken()),
            )
            .module(ModuleSpec::new("Vendor.Audio").unavailable("bad image"))
            .build()
    }

    #[test]
    fn test_enumeration_modes() {
        let rt = runtime();
        let modules = rt.list_modules().expect("listing");
        assert_eq!(modules.len(), 2);
        assert!(modules[0].primary);

        match rt.enumerate_types(&modules[0]) {
            Err(EnumerationError::Partial { loaded, .. }) => {
                assert_eq!(loaded.len(), 1);
                assert_eq!(loaded[0].name(), "CmdMove");
            }
            other => panic!("expected partial enumeration, got {:?}", other),
        }
        assert!(matches!(
            rt.enumerate_types(&modules[1]),
            Err(EnumerationError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_typed_construction_is_strict() {
        let rt = runtime();
        let ctor = rt.constructors(&TypeHandle::new("Game.Commands.CmdMove"))[0].clone();

        let err = rt
            .invoke_constructor(&ctor, &[ForeignValue::from(1), ForeignValue::from(2)])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentMismatch { index: 1, .. }));

        let obj = rt
            .invoke_constructor(&ctor, &[ForeignValue::from(1), ForeignValue::from(2.0)])
            .expect("construct");
        assert_eq!(rt.get_property(&obj, "x").expect("x"), ForeignValue::Int(1));
    }

    #[test]
    fn test_untyped_construction_coerces() {
        let rt = runtime();
        let obj = rt
            .construct(
                &TypeHandle::new("Game.Commands.CmdMove"),
                &[ForeignValue::from(1), ForeignValue::from(2)],
            )
            .expect("construct");
        assert_eq!(rt.get_property(&obj, "speed").expect("speed"), ForeignValue::Float(2.0));
        assert_eq!(rt.display_string(&obj), Some(format!("CmdMove#{}", obj.id().0)));
        assert_eq!(rt.constructions(), 1);
    }

    #[test]
    fn test_members_and_methods() {
        let rt = runtime();
        let ty = TypeHandle::new("Game.Commands.CmdMove");
        let names: Vec<String> = rt.members(&ty).into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Describe", "x", "speed"]);

        let obj = rt
            .construct(&ty, &[ForeignValue::from(3), ForeignValue::from(1.0)])
            .expect("construct");
        assert_eq!(
            rt.invoke_method(&obj, "Describe", &[]).expect("invoke"),
            ForeignValue::from("move")
        );
        assert!(rt.invoke_method(&obj, "Describe", &[ForeignValue::Null]).is_err());

        rt.set_property(&obj, "x", ForeignValue::from(9)).expect("set");
        assert_eq!(rt.get_property(&obj, "x").expect("get"), ForeignValue::Int(9));
        assert!(rt.set_property(&obj, "x", ForeignValue::from("nine")).is_err());
        assert!(rt.get_property(&obj, "missing").is_err());
    }

    #[test]
    fn test_listing_failure_toggle() {
        let rt = runtime();
        rt.set_listing_failure(Some("host shutting down".to_string()));
        assert!(rt.list_modules().is_err());
        rt.set_listing_failure(None);
        assert!(rt.list_modules().is_ok());
        assert_eq!(rt.list_modules_calls(), 2);
    }

    #[test]
    fn test_builtin_object_constructs() {
        let rt = runtime();
        let obj = rt.construct(&TypeHandle::any_object(), &[]).expect("object");
        assert!(rt.is_instance_of(&obj, &TypeHandle::any_object()));
        assert!(rt.construct(&TypeHandle::int(), &[]).is_err());
    }

    #[test]
    fn test_release_drops_instance() {
        let rt = runtime();
        let obj = rt.construct(&TypeHandle::any_object(), &[]).expect("object");
        assert_eq!(rt.live_objects(), 1);

        rt.release(&obj);
        assert_eq!(rt.live_objects(), 0);
        assert!(matches!(
            rt.get_property(&obj, "anything"),
            Err(RuntimeError::DeadObject(_))
        ));
    }
}
