// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Caller-owned command handles.

use crate::diagnostics::Category;
use crate::registry::TypeDescriptor;
use crate::runtime::{ForeignObject, ForeignRuntime, ForeignValue, RuntimeError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Member access failures on a handle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandleError {
    #[error("'{0}' is a placeholder; no foreign instance exists")]
    Placeholder(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Why a placeholder was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Construction,
}

impl FailureKind {
    pub fn category(&self) -> Category {
        match self {
            Self::NotFound => Category::NotFound,
            Self::Construction => Category::Construction,
        }
    }
}

/// Record of a creation request that could not be satisfied.
///
/// Carries enough to trace the call and replay it later.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackCommand {
    pub requested_name: String,
    pub args: Vec<ForeignValue>,
    pub created_at: DateTime<Utc>,
    pub failure: FailureKind,
    pub reason: String,
}

impl FallbackCommand {
    pub fn new(
        requested_name: impl Into<String>,
        args: Vec<ForeignValue>,
        failure: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            requested_name: requested_name.into(),
            args,
            created_at: Utc::now(),
            failure,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FallbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{}({}) [{:?} at {}: {}]",
            self.requested_name,
            args.join(", "),
            self.failure,
            self.created_at.to_rfc3339(),
            self.reason
        )
    }
}

enum Body {
    Live {
        object: ForeignObject,
        runtime: Arc<dyn ForeignRuntime>,
    },
    Placeholder(FallbackCommand),
}

/// Wrapper owning one foreign instance (or a placeholder) plus its descriptor.
///
/// Handles hold their own descriptor and runtime references, so they stay
/// usable across a broker reinitialization.
pub struct CommandHandle {
    descriptor: Option<Arc<TypeDescriptor>>,
    body: Body,
}

impl CommandHandle {
    pub fn live(
        descriptor: Arc<TypeDescriptor>,
        object: ForeignObject,
        runtime: Arc<dyn ForeignRuntime>,
    ) -> Self {
        Self {
            descriptor: Some(descriptor),
            body: Body::Live { object, runtime },
        }
    }

    /// `descriptor` is present when the name resolved but construction failed.
    pub fn placeholder(descriptor: Option<Arc<TypeDescriptor>>, fallback: FallbackCommand) -> Self {
        Self {
            descriptor,
            body: Body::Placeholder(fallback),
        }
    }

    /// Bare type name, or the requested name for unresolved placeholders.
    pub fn name(&self) -> &str {
        match (&self.descriptor, &self.body) {
            (Some(d), _) => d.name(),
            (None, Body::Placeholder(p)) => &p.requested_name,
            (None, Body::Live { object, .. }) => object.type_handle().short_name(),
        }
    }

    pub fn descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.descriptor.as_ref()
    }

    /// Live, and the instance still is what the descriptor says it is.
    pub fn is_valid(&self) -> bool {
        match (&self.body, &self.descriptor) {
            (Body::Live { object, runtime }, Some(d)) => runtime.is_instance_of(object, d.handle()),
            _ => false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.body, Body::Placeholder(_))
    }

    pub fn object(&self) -> Option<&ForeignObject> {
        match &self.body {
            Body::Live { object, .. } => Some(object),
            Body::Placeholder(_) => None,
        }
    }

    pub fn fallback(&self) -> Option<&FallbackCommand> {
        match &self.body {
            Body::Placeholder(p) => Some(p),
            Body::Live { .. } => None,
        }
    }

    pub fn get(&self, property: &str) -> Result<ForeignValue, HandleError> {
        let (object, runtime) = self.live_parts()?;
        Ok(runtime.get_property(object, property)?)
    }

    pub fn set(&self, property: &str, value: impl Into<ForeignValue>) -> Result<(), HandleError> {
        let (object, runtime) = self.live_parts()?;
        Ok(runtime.set_property(object, property, value.into())?)
    }

    pub fn invoke(&self, method: &str, args: &[ForeignValue]) -> Result<ForeignValue, HandleError> {
        let (object, runtime) = self.live_parts()?;
        Ok(runtime.invoke_method(object, method, args)?)
    }

    fn live_parts(&self) -> Result<(&ForeignObject, &dyn ForeignRuntime), HandleError> {
        match &self.body {
            Body::Live { object, runtime } => Ok((object, runtime.as_ref())),
            Body::Placeholder(p) => Err(HandleError::Placeholder(p.requested_name.clone())),
        }
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CommandHandle");
        s.field("name", &self.name());
        match &self.body {
            Body::Live { object, .. } => s.field("object", object),
            Body::Placeholder(p) => s.field("placeholder", p),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ClassSpec, ConstructorSpec, InMemoryRuntime, ModuleSpec, TypeHandle};

    fn live_handle() -> CommandHandle {
        let runtime: Arc<dyn ForeignRuntime> = Arc::new(
            InMemoryRuntime::builder()
                .module(
                    ModuleSpec::new("Game").class(
                        ClassSpec::new("Game.CmdHeal")
                            .constructor(
                                ConstructorSpec::public().param("amount", TypeHandle::int()),
                            )
                            .method_returning("Preview", 0, "heal 10"),
                    ),
                )
                .build(),
        );
        let ty = TypeHandle::new("Game.CmdHeal");
        let descriptor =
            Arc::new(TypeDescriptor::describe(runtime.as_ref(), &ty).expect("describe"));
        let object = runtime
            .construct(&ty, &[ForeignValue::from(10)])
            .expect("construct");
        CommandHandle::live(descriptor, object, runtime)
    }

    #[test]
    fn test_live_handle_access() {
        let handle = live_handle();
        assert_eq!(handle.name(), "CmdHeal");
        assert!(handle.is_valid());
        assert!(!handle.is_placeholder());

        assert_eq!(handle.get("amount").expect("get"), ForeignValue::Int(10));
        handle.set("amount", 25).expect("set");
        assert_eq!(handle.get("amount").expect("get"), ForeignValue::Int(25));
        assert_eq!(handle.invoke("Preview", &[]).expect("invoke"), ForeignValue::from("heal 10"));

        assert!(matches!(
            handle.get("missing"),
            Err(HandleError::Runtime(RuntimeError::MemberNotFound { .. }))
        ));
    }

    #[test]
    fn test_placeholder_handle() {
        let fallback = FallbackCommand::new(
            "Teleport",
            vec![ForeignValue::from(1), ForeignValue::from(2)],
            FailureKind::NotFound,
            "no type named Teleport",
        );
        let handle = CommandHandle::placeholder(None, fallback);

        assert_eq!(handle.name(), "Teleport");
        assert!(handle.is_placeholder());
        assert!(!handle.is_valid());
        assert!(handle.object().is_none());
        assert_eq!(handle.fallback().map(|f| f.args.len()), Some(2));
        assert!(matches!(handle.get("x"), Err(HandleError::Placeholder(_))));
        assert!(format!("{:?}", handle).contains("placeholder"));
        assert_eq!(FailureKind::NotFound.category(), Category::NotFound);
    }

    #[test]
    fn test_fallback_display() {
        let fallback = FallbackCommand::new(
            "CmdMove",
            vec![ForeignValue::from(3)],
            FailureKind::Construction,
            "constructor threw",
        );
        let text = fallback.to_string();
        assert!(text.starts_with("CmdMove(3) [Construction at "));
        assert!(text.ends_with("constructor threw]"));
    }
}
