// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Foreign runtime boundary.
//!
//! The broker never sees foreign types directly. Everything it knows comes
//! through two collaborator traits:
//!
//! - [`ForeignRuntime`]: module listing, type enumeration, constructor and
//!   member introspection, construction, instance checks and member access
//! - [`ForeignBus`]: the generic dispatch entry point of an external bus
//!
//! Both are treated as fallible, partial and possibly slow. Foreign types are
//! opaque [`TypeHandle`]s and members are described by the small
//! [`MemberKind`] enum rather than open-ended introspection.
//!
//! [`InMemoryRuntime`] and [`InMemoryBus`] are complete reference
//! implementations used by the test suite and benchmarks.

mod bus;
mod memory;
mod value;

pub use bus::{DispatchRecord, InMemoryBus};
pub use memory::{ClassSpec, ConstructorSpec, InMemoryRuntime, InMemoryRuntimeBuilder, ModuleSpec};
pub use value::ForeignValue;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default bound for ancestor walks over `describe` base links.
pub const MAX_ANCESTOR_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque identity of a foreign type: its namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(Arc<str>);

impl TypeHandle {
    /// Name of the universal "any object" type.
    pub const ANY_OBJECT: &'static str = "object";
    pub const BOOL: &'static str = "bool";
    pub const INT: &'static str = "int";
    pub const FLOAT: &'static str = "float";
    pub const STRING: &'static str = "string";

    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn any_object() -> Self {
        Self::new(Self::ANY_OBJECT)
    }

    pub fn bool_type() -> Self {
        Self::new(Self::BOOL)
    }

    pub fn int() -> Self {
        Self::new(Self::INT)
    }

    pub fn float() -> Self {
        Self::new(Self::FLOAT)
    }

    pub fn string() -> Self {
        Self::new(Self::STRING)
    }

    /// Fully-qualified name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_any_object(&self) -> bool {
        &*self.0 == Self::ANY_OBJECT
    }

    /// Value types never accept a null argument.
    pub fn is_value_type(&self) -> bool {
        matches!(&*self.0, Self::BOOL | Self::INT | Self::FLOAT)
    }

    /// Last path segment (`Game.Commands.CmdFoo` -> `CmdFoo`).
    ///
    /// Nested-type (`+`) and `::` separators are honoured as well.
    pub fn short_name(&self) -> &str {
        self.0
            .rsplit(['.', '+', ':'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.0)
    }

    /// Everything before the short name, empty for global types.
    pub fn namespace(&self) -> &str {
        let short = self.short_name().len();
        self.0[..self.0.len() - short].trim_end_matches(['.', '+', ':'])
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeHandle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeHandle {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A loaded foreign module (assembly, library, package).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub name: Arc<str>,
    /// Set by the runtime for the host application's own module.
    pub primary: bool,
}

impl ModuleRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            primary: false,
        }
    }

    pub fn primary(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            primary: true,
        }
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Runtime-assigned identity of a live foreign instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Reference to a live foreign instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignObject {
    id: ObjectId,
    type_handle: TypeHandle,
}

impl ForeignObject {
    pub fn new(id: ObjectId, type_handle: TypeHandle) -> Self {
        Self { id, type_handle }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Runtime type of the instance.
    pub fn type_handle(&self) -> &TypeHandle {
        &self.type_handle
    }
}

// ---------------------------------------------------------------------------
// Introspection records
// ---------------------------------------------------------------------------

/// Constructor visibility as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// A constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub type_handle: TypeHandle,
    /// Declared default value, if the parameter is optional.
    pub default: Option<ForeignValue>,
}

/// A constructor signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    pub declaring_type: TypeHandle,
    pub params: Vec<ParamInfo>,
    pub visibility: Visibility,
    /// Runtime token identifying the constructor within its type.
    pub token: u32,
}

impl ConstructorInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Human-readable signature, e.g. `CmdFoo(int, string)`.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.type_handle.as_str()).collect();
        format!("{}({})", self.declaring_type.short_name(), params.join(", "))
    }
}

/// Resolved constructor, compared by identity in the construction cache.
pub type ConstructorHandle = Arc<ConstructorInfo>;

/// Kinds of members the broker knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property { readable: bool, writable: bool },
    Field,
    Method { arity: usize },
}

/// A named member of a foreign type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    /// Property/field type, or method return type.
    pub value_type: TypeHandle,
}

/// What the runtime reports about one type.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignTypeInfo {
    pub handle: TypeHandle,
    pub module: ModuleRef,
    pub is_abstract: bool,
    pub is_interface: bool,
    /// Direct base type and implemented interfaces.
    pub bases: Vec<TypeHandle>,
}

impl ForeignTypeInfo {
    pub fn name(&self) -> &str {
        self.handle.short_name()
    }

    /// Abstract types and interfaces can never be instantiated.
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract && !self.is_interface
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by the foreign runtime or bus.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("member not found: {type_name}.{member}")]
    MemberNotFound { type_name: String, member: String },

    #[error("no constructor of {type_name} accepts {arity} argument(s)")]
    NoMatchingConstructor { type_name: String, arity: usize },

    #[error("argument {index} of {target}: expected {expected}, got {actual}")]
    ArgumentMismatch {
        target: String,
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("invocation of {target} failed: {message}")]
    Invocation { target: String, message: String },

    #[error("object #{0} is not alive")]
    DeadObject(u64),
}

/// Type enumeration failure for a single module.
#[derive(Debug, Clone, Error)]
pub enum EnumerationError {
    /// Some types failed to load; `loaded` holds the ones that did.
    #[error("module {module} enumerated partially: {reason}")]
    Partial {
        module: String,
        loaded: Vec<ForeignTypeInfo>,
        reason: String,
    },

    /// Nothing could be enumerated.
    #[error("module {module} could not be enumerated: {reason}")]
    Unavailable { module: String, reason: String },
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Capability set consumed from the host runtime's type system.
pub trait ForeignRuntime: Send + Sync {
    /// List loaded modules. Failure here is fatal to broker initialization.
    fn list_modules(&self) -> Result<Vec<ModuleRef>, RuntimeError>;

    /// Enumerate the types declared by one module.
    fn enumerate_types(&self, module: &ModuleRef) -> Result<Vec<ForeignTypeInfo>, EnumerationError>;

    /// Describe a type by handle, wherever it lives.
    fn describe(&self, ty: &TypeHandle) -> Option<ForeignTypeInfo>;

    /// Constructors declared by a type, in runtime order.
    fn constructors(&self, ty: &TypeHandle) -> Vec<ConstructorInfo>;

    /// Properties, fields and methods reachable on a type.
    fn members(&self, ty: &TypeHandle) -> Vec<MemberInfo>;

    /// Invoke one specific, pre-resolved constructor.
    fn invoke_constructor(
        &self,
        ctor: &ConstructorInfo,
        args: &[ForeignValue],
    ) -> Result<ForeignObject, RuntimeError>;

    /// The runtime's untyped "construct by type + args" facility.
    ///
    /// Picks a constructor itself and may coerce arguments.
    fn construct(
        &self,
        ty: &TypeHandle,
        args: &[ForeignValue],
    ) -> Result<ForeignObject, RuntimeError>;

    /// Generic string representation; `None` signals an interop defect.
    fn display_string(&self, object: &ForeignObject) -> Option<String>;

    fn get_property(
        &self,
        object: &ForeignObject,
        name: &str,
    ) -> Result<ForeignValue, RuntimeError>;

    fn set_property(
        &self,
        object: &ForeignObject,
        name: &str,
        value: ForeignValue,
    ) -> Result<(), RuntimeError>;

    fn invoke_method(
        &self,
        object: &ForeignObject,
        name: &str,
        args: &[ForeignValue],
    ) -> Result<ForeignValue, RuntimeError>;

    /// Drop the runtime's reference to an instance nobody will use again.
    fn release(&self, _object: &ForeignObject) {}

    /// Whether a value of type `source` can be passed where `target` is expected.
    fn is_assignable(&self, target: &TypeHandle, source: &TypeHandle) -> bool {
        if target == source || target.is_any_object() {
            return true;
        }
        ancestors(self, source, MAX_ANCESTOR_DEPTH)
            .iter()
            .any(|a| a == target)
    }

    /// Whether `object` is an instance of `ty` (exact or derived).
    fn is_instance_of(&self, object: &ForeignObject, ty: &TypeHandle) -> bool {
        self.is_assignable(ty, object.type_handle())
    }
}

/// Every ancestor reachable from `ty` through `describe` base links,
/// breadth-first, at most `max_depth` levels up.
pub fn ancestors<R>(runtime: &R, ty: &TypeHandle, max_depth: usize) -> Vec<TypeHandle>
where
    R: ForeignRuntime + ?Sized,
{
    match runtime.describe(ty) {
        Some(info) => ancestors_from(runtime, &info.bases, max_depth),
        None => Vec::new(),
    }
}

/// Same as [`ancestors`], starting from already-known direct bases.
pub fn ancestors_from<R>(runtime: &R, bases: &[TypeHandle], max_depth: usize) -> Vec<TypeHandle>
where
    R: ForeignRuntime + ?Sized,
{
    let mut seen: HashSet<TypeHandle> = HashSet::new();
    let mut out = Vec::new();
    let mut queue: VecDeque<(TypeHandle, usize)> = bases.iter().cloned().map(|b| (b, 1)).collect();

    while let Some((current, depth)) = queue.pop_front() {
        if depth > max_depth || !seen.insert(current.clone()) {
            continue;
        }
        if let Some(info) = runtime.describe(&current) {
            queue.extend(info.bases.into_iter().map(|b| (b, depth + 1)));
        }
        out.push(current);
    }

    out
}

/// A generic method exposed by a bus type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericMethodInfo {
    pub name: String,
    /// Number of generic type parameters.
    pub type_params: usize,
    /// Number of value parameters.
    pub params: usize,
}

/// A generic method closed over one concrete type argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecializedMethod {
    pub name: String,
    pub type_argument: TypeHandle,
    /// Runtime token for the specialization.
    pub token: u64,
}

/// External bus with a generic dispatch capability.
pub trait ForeignBus: Send + Sync {
    fn bus_type(&self) -> TypeHandle;

    fn generic_methods(&self) -> Vec<GenericMethodInfo>;

    fn specialize(
        &self,
        method: &GenericMethodInfo,
        type_argument: &TypeHandle,
    ) -> Result<SpecializedMethod, RuntimeError>;

    fn invoke(
        &self,
        method: &SpecializedMethod,
        argument: &ForeignObject,
    ) -> Result<(), RuntimeError>;
}
