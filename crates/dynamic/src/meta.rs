//! Runtime type descriptors.
//!
//! Every reflectable type has exactly one [`MetaType`] per process, handed
//! out by [`MetaType::of`]. Descriptors are interned on first use and never
//! freed, so comparing two `&'static MetaType` by address is a valid
//! same-type check.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::array::DynamicArray;
use crate::cell::ScalarCell;
use crate::map::DynamicMap;
use crate::record::{Aggregate, Record};
use crate::scalar::{ScalarKind, ScalarType};
use crate::value::{TypeIdentity, Value};

/// A plain Rust type with a node representation in a value tree.
///
/// Implemented for the scalar kinds, for every aggregate declared with
/// [`record!`](crate::record!), and for [`DynamicArray`] / [`DynamicMap`].
pub trait Reflect: Clone + PartialEq + Default + fmt::Debug + 'static {
    /// Node type that stores a `Self` inside a tree.
    type Node: TypedNode<Plain = Self>;

    fn describe() -> MetaType;
}

/// A node that stores a plain [`Reflect`] value.
pub trait TypedNode: Value + Clone + PartialEq + Default {
    type Plain: Reflect;

    fn from_plain(plain: Self::Plain) -> Self;

    fn to_plain(&self) -> Self::Plain;

    /// Replace the stored value, notifying like a setter.
    fn set_plain(&mut self, plain: Self::Plain);

    /// A copy that shares this node's link and listener registries, so it
    /// notifies the same listeners. Edit guards hold one to restore nodes
    /// replaced wholesale.
    #[doc(hidden)]
    fn twin(&self) -> Self;

    /// Whether `other` is this node or one of its twins.
    #[doc(hidden)]
    fn is_same_node(&self, other: &Self) -> bool;

    /// Undo a wholesale replacement of `self`.
    ///
    /// `held` is a twin taken before `self` was handed out mutably. If the
    /// slot now holds a different node, `held` goes back in and the
    /// replacement is assigned into it, which notifies like a setter and
    /// keeps every listener registered on the original.
    #[doc(hidden)]
    fn settle(&mut self, held: Self) {
        if self.is_same_node(&held) {
            return;
        }
        tracing::debug!(field = %held.field_name(), "replaced node restored");
        let replacement = std::mem::replace(self, held);
        self.assign(&replacement);
    }
}

/// Overall shape of a described type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A scalar, or the `Invalid` sentinel.
    Opaque,
    Record,
    Array,
    Map,
}

/// Name and lazily resolved type of one record field.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    name: &'static str,
    meta: fn() -> &'static MetaType,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, meta: fn() -> &'static MetaType) -> Self {
        Self { name, meta }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn meta_type(&self) -> &'static MetaType {
        (self.meta)()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct MetaType {
    identity: TypeIdentity,
    shape: Shape,
    scalar: Option<ScalarType>,
    fields: Vec<FieldDescriptor>,
    element: Option<fn() -> &'static MetaType>,
    factory: Option<fn() -> Box<dyn Value>>,
}

fn construct_default<N: Value + Default>() -> Box<dyn Value> {
    Box::new(N::default())
}

fn registry() -> &'static Mutex<HashMap<TypeId, &'static MetaType>> {
    static REGISTRY: OnceLock<Mutex<HashMap<TypeId, &'static MetaType>>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

impl MetaType {
    /// The descriptor of `T`.
    ///
    /// ```
    /// use dynamic::MetaType;
    ///
    /// assert!(std::ptr::eq(MetaType::of::<f32>(), MetaType::of::<f32>()));
    /// assert!(MetaType::of::<f32>().is_opaque());
    /// ```
    pub fn of<T: Reflect>() -> &'static MetaType {
        let id = TypeId::of::<T>();
        if let Some(meta) = registry()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
        {
            return meta;
        }

        // `describe` runs unlocked; it may ask for other descriptors.
        let described = T::describe();
        let mut interned = registry().lock().unwrap_or_else(PoisonError::into_inner);
        *interned.entry(id).or_insert_with(|| {
            tracing::trace!(type_name = described.identity.name(), "registered meta type");
            Box::leak(Box::new(described))
        })
    }

    /// The descriptor of the `Invalid` sentinel.
    pub fn invalid() -> &'static MetaType {
        static INVALID: OnceLock<MetaType> = OnceLock::new();
        INVALID.get_or_init(|| MetaType {
            identity: TypeIdentity::void(),
            shape: Shape::Opaque,
            scalar: None,
            fields: Vec::new(),
            element: None,
            factory: None,
        })
    }

    pub fn scalar<T: ScalarKind>() -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            shape: Shape::Opaque,
            scalar: Some(T::TYPE),
            fields: Vec::new(),
            element: None,
            factory: Some(construct_default::<ScalarCell<T>>),
        }
    }

    pub fn record<T: Aggregate>() -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            shape: Shape::Record,
            scalar: None,
            fields: T::field_descriptors(),
            element: None,
            factory: Some(construct_default::<Record<T>>),
        }
    }

    pub fn array<T: Reflect>() -> Self {
        Self {
            identity: TypeIdentity::of::<DynamicArray<T>>(),
            shape: Shape::Array,
            scalar: None,
            fields: Vec::new(),
            element: Some(MetaType::of::<T>),
            factory: Some(construct_default::<DynamicArray<T>>),
        }
    }

    pub fn map<T: Reflect>() -> Self {
        Self {
            identity: TypeIdentity::of::<DynamicMap<T>>(),
            shape: Shape::Map,
            scalar: None,
            fields: Vec::new(),
            element: Some(MetaType::of::<T>),
            factory: Some(construct_default::<DynamicMap<T>>),
        }
    }

    pub fn type_identity(&self) -> TypeIdentity {
        self.identity
    }

    pub fn type_name(&self) -> &'static str {
        self.identity.name()
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Scalars and the `Invalid` sentinel.
    pub fn is_opaque(&self) -> bool {
        self.shape == Shape::Opaque
    }

    pub fn is_record(&self) -> bool {
        self.shape == Shape::Record
    }

    pub fn is_array(&self) -> bool {
        self.shape == Shape::Array
    }

    pub fn is_map(&self) -> bool {
        self.shape == Shape::Map
    }

    pub fn is_map_or_array(&self) -> bool {
        matches!(self.shape, Shape::Array | Shape::Map)
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.scalar
    }

    /// Record fields in declaration order; empty for other shapes.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Element descriptor of arrays and maps.
    pub fn element_meta_type(&self) -> Option<&'static MetaType> {
        self.element.map(|element| element())
    }

    /// A fresh default value of the described type, or `None` for the
    /// `Invalid` descriptor.
    pub fn construct(&self) -> Option<Box<dyn Value>> {
        self.factory.map(|factory| factory())
    }
}

impl PartialEq for MetaType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for MetaType {}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaType")
            .field("type", &self.identity)
            .field("shape", &self.shape)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Shorthand for [`MetaType::of`].
pub fn meta_type_of<T: Reflect>() -> &'static MetaType {
    MetaType::of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamic_path::Path;

    #[test]
    fn test_scalar_singletons() {
        assert!(std::ptr::eq(MetaType::of::<i32>(), MetaType::of::<i32>()));
        assert_ne!(MetaType::of::<i32>(), MetaType::of::<i64>());
        assert_eq!(MetaType::of::<Path>().scalar_type(), Some(ScalarType::Path));
    }

    #[test]
    fn test_scalar_shape() {
        let meta = MetaType::of::<bool>();
        assert!(meta.is_opaque());
        assert!(!meta.is_record());
        assert!(!meta.is_map_or_array());
        assert!(meta.fields().is_empty());
        assert!(meta.element_meta_type().is_none());
        assert_eq!(meta.type_identity(), TypeIdentity::of::<bool>());
    }

    #[test]
    fn test_construct_scalar() {
        let value = MetaType::of::<String>().construct().unwrap();
        assert!(std::ptr::eq(value.meta_type(), MetaType::of::<String>()));
        assert_eq!(value.type_identity(), TypeIdentity::of::<String>());
    }

    #[test]
    fn test_invalid_descriptor() {
        let meta = MetaType::invalid();
        assert!(meta.is_opaque());
        assert!(meta.type_identity().is_void());
        assert!(meta.construct().is_none());
        assert!(meta.scalar_type().is_none());
    }

    #[test]
    fn test_array_descriptor() {
        let meta = MetaType::of::<DynamicArray<f64>>();
        assert!(meta.is_array());
        assert!(meta.is_map_or_array());
        assert_eq!(meta.element_meta_type(), Some(MetaType::of::<f64>()));
        assert!(MetaType::of::<DynamicMap<i8>>().is_map());
    }
}
