// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory reference implementation of [`ForeignBus`].

use super::{
    ForeignBus, ForeignObject, GenericMethodInfo, RuntimeError, SpecializedMethod, TypeHandle,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub method: String,
    pub type_argument: TypeHandle,
    pub object: ForeignObject,
}

/// Bus that records every dispatched command.
#[derive(Debug)]
pub struct InMemoryBus {
    bus_type: TypeHandle,
    methods: Vec<GenericMethodInfo>,
    rejected: HashSet<TypeHandle>,
    invocation_failure: Option<String>,
    dispatched: Mutex<Vec<DispatchRecord>>,
    specializations: AtomicU64,
}

impl InMemoryBus {
    /// A bus with no generic methods at all.
    pub fn new(bus_type: impl Into<TypeHandle>) -> Self {
        Self {
            bus_type: bus_type.into(),
            methods: Vec::new(),
            rejected: HashSet::new(),
            invocation_failure: None,
            dispatched: Mutex::new(Vec::new()),
            specializations: AtomicU64::new(0),
        }
    }

    /// A bus exposing the conventional `Dispatch<T>(T)` entry point.
    pub fn with_dispatch(bus_type: impl Into<TypeHandle>) -> Self {
        Self::new(bus_type).with_generic_method("Dispatch", 1, 1)
    }

    pub fn with_generic_method(
        mut self,
        name: impl Into<String>,
        type_params: usize,
        params: usize,
    ) -> Self {
        self.methods.push(GenericMethodInfo {
            name: name.into(),
            type_params,
            params,
        });
        self
    }

    /// Specialization for `ty` fails (constraint violation).
    pub fn rejecting(mut self, ty: impl Into<TypeHandle>) -> Self {
        self.rejected.insert(ty.into());
        self
    }

    /// Every invocation fails with the given message.
    pub fn failing_invocation(mut self, message: impl Into<String>) -> Self {
        self.invocation_failure = Some(message.into());
        self
    }

    /// Snapshot of everything dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.dispatched.lock().clone()
    }

    /// Number of `specialize` calls so far.
    pub fn specializations(&self) -> u64 {
        self.specializations.load(Ordering::Relaxed)
    }
}

impl ForeignBus for InMemoryBus {
    fn bus_type(&self) -> TypeHandle {
        self.bus_type.clone()
    }

    fn generic_methods(&self) -> Vec<GenericMethodInfo> {
        self.methods.clone()
    }

    fn specialize(
        &self,
        method: &GenericMethodInfo,
        type_argument: &TypeHandle,
    ) -> Result<SpecializedMethod, RuntimeError> {
        let token = self.specializations.fetch_add(1, Ordering::Relaxed) + 1;
        if self.rejected.contains(type_argument) {
            return Err(RuntimeError::Invocation {
                target: format!("{}.{}<{}>", self.bus_type, method.name, type_argument),
                message: "type argument violates constraints".to_string(),
            });
        }
        if !self.methods.contains(method) {
            return Err(RuntimeError::MemberNotFound {
                type_name: self.bus_type.to_string(),
                member: method.name.clone(),
            });
        }
        Ok(SpecializedMethod {
            name: method.name.clone(),
            type_argument: type_argument.clone(),
            token,
        })
    }

    fn invoke(
        &self,
        method: &SpecializedMethod,
        argument: &ForeignObject,
    ) -> Result<(), RuntimeError> {
        if let Some(message) = &self.invocation_failure {
            return Err(RuntimeError::Invocation {
                target: format!("{}.{}<{}>", self.bus_type, method.name, method.type_argument),
                message: message.clone(),
            });
        }
        self.dispatched.lock().push(DispatchRecord {
            method: method.name.clone(),
            type_argument: method.type_argument.clone(),
            object: argument.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ObjectId;

    #[test]
    fn test_records_invocations() {
        let bus = InMemoryBus::with_dispatch("Game.Bus");
        let method = bus.generic_methods()[0].clone();
        let ty = TypeHandle::new("Game.CmdFoo");
        let spec = bus.specialize(&method, &ty).expect("specialize");

        let obj = ForeignObject::new(ObjectId(1), ty.clone());
        bus.invoke(&spec, &obj).expect("invoke");

        let records = bus.dispatched();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].type_argument, ty);
        assert_eq!(bus.specializations(), 1);
    }

    #[test]
    fn test_rejected_type_argument() {
        let bus = InMemoryBus::with_dispatch("Game.Bus").rejecting("Game.CmdBad");
        let method = bus.generic_methods()[0].clone();
        assert!(bus.specialize(&method, &TypeHandle::new("Game.CmdBad")).is_err());
    }
}
