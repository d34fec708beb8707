// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Values exchanged with the foreign runtime.

use super::{ForeignObject, TypeHandle};
use std::fmt;

/// A value that can cross the foreign boundary as an argument, property
/// value or method result.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ForeignObject),
}

impl ForeignValue {
    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Foreign type of this value, `None` for null.
    pub fn type_handle(&self) -> Option<TypeHandle> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeHandle::bool_type()),
            Self::Int(_) => Some(TypeHandle::int()),
            Self::Float(_) => Some(TypeHandle::float()),
            Self::Str(_) => Some(TypeHandle::string()),
            Self::Object(obj) => Some(obj.type_handle().clone()),
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as object reference.
    pub fn as_object(&self) -> Option<&ForeignObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl fmt::Display for ForeignValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{:?}", v),
            Self::Object(obj) => write!(f, "<{} #{}>", obj.type_handle(), obj.id().0),
        }
    }
}

impl From<bool> for ForeignValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ForeignValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ForeignValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ForeignValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ForeignValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ForeignValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<ForeignObject> for ForeignValue {
    fn from(v: ForeignObject) -> Self {
        Self::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ObjectId;

    #[test]
    fn test_type_handles() {
        assert_eq!(ForeignValue::Null.type_handle(), None);
        assert_eq!(ForeignValue::from(3).type_handle(), Some(TypeHandle::int()));
        assert_eq!(ForeignValue::from("x").type_handle(), Some(TypeHandle::string()));

        let obj = ForeignObject::new(ObjectId(7), TypeHandle::new("Game.Unit"));
        assert_eq!(
            ForeignValue::from(obj).type_handle(),
            Some(TypeHandle::new("Game.Unit"))
        );
    }

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(ForeignValue::Int(2).as_float(), Some(2.0));
        assert_eq!(ForeignValue::Str("2".into()).as_float(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ForeignValue::Null.to_string(), "null");
        assert_eq!(ForeignValue::from("a").to_string(), "\"a\"");
    }
}
