//! The closed set of leaf kinds a structured value may contain.

use std::fmt;

use dynamic_path::Path;

use crate::cell::ScalarCell;
use crate::meta::{MetaType, Reflect};
use crate::value::ValueRef;

mod sealed {
    pub trait Sealed {}
}

/// Discriminant of a [`ScalarKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    String,
    Path,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Path => "path",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarType::Bool | ScalarType::String | ScalarType::Path)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A leaf type that can live in a [`ScalarCell`].
///
/// Implemented for `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `bool`,
/// `String` and [`Path`]; the set is closed.
pub trait ScalarKind: sealed::Sealed + Reflect {
    const TYPE: ScalarType;

    /// Change detection used by setters. Exact equality except for floats,
    /// which compare within machine epsilon.
    fn same_as(&self, other: &Self) -> bool {
        self == other
    }

    fn as_value_ref(&self) -> ValueRef<'_>;

    /// Recover `&Self` from an erased reference of the matching kind.
    fn from_value_ref<'a>(value: ValueRef<'a>) -> Option<&'a Self>;
}

macro_rules! scalar_kind {
    ($ty:ty, $variant:ident) => {
        scalar_kind!($ty, $variant, |a: &$ty, b: &$ty| a == b);
    };
    ($ty:ty, $variant:ident, $same:expr) => {
        impl sealed::Sealed for $ty {}

        impl ScalarKind for $ty {
            const TYPE: ScalarType = ScalarType::$variant;

            fn same_as(&self, other: &Self) -> bool {
                ($same)(self, other)
            }

            fn as_value_ref(&self) -> ValueRef<'_> {
                ValueRef::$variant(self)
            }

            fn from_value_ref<'a>(value: ValueRef<'a>) -> Option<&'a Self> {
                match value {
                    ValueRef::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl Reflect for $ty {
            type Node = ScalarCell<$ty>;

            fn describe() -> MetaType {
                MetaType::scalar::<$ty>()
            }
        }
    };
}

scalar_kind!(i8, I8);
scalar_kind!(i16, I16);
scalar_kind!(i32, I32);
scalar_kind!(i64, I64);
scalar_kind!(f32, F32, |a: &f32, b: &f32| (a - b).abs() <= f32::EPSILON);
scalar_kind!(f64, F64, |a: &f64, b: &f64| (a - b).abs() <= f64::EPSILON);
scalar_kind!(bool, Bool);
scalar_kind!(String, String);
scalar_kind!(Path, Path);
