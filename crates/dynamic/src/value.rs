//! Type-erased values and the `Invalid` sentinel.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use dynamic_path::Path;

use crate::meta::{MetaType, TypedNode};
use crate::node::{Link, NodeMut, StructuredNode};
use crate::scalar::ScalarKind;

/// Identity of a concrete type, comparable at runtime.
///
/// Records report the identity of their plain aggregate, scalar cells the
/// identity of their scalar, containers their own type.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Identity reported by the `Invalid` sentinel.
    pub fn void() -> Self {
        Self {
            id: TypeId::of::<()>(),
            name: "void",
        }
    }

    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Borrowed view of a value, one variant per kind.
#[derive(Clone, Copy, Debug)]
pub enum ValueRef<'a> {
    Invalid,
    Structured(&'a dyn StructuredNode),
    I8(&'a i8),
    I16(&'a i16),
    I32(&'a i32),
    I64(&'a i64),
    F32(&'a f32),
    F64(&'a f64),
    Bool(&'a bool),
    String(&'a String),
    Path(&'a Path),
}

impl ValueRef<'_> {
    pub fn is_invalid(&self) -> bool {
        matches!(self, ValueRef::Invalid)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ValueRef::Structured(_))
    }
}

/// Object-safe interface shared by every node of a value tree.
///
/// A value's [`type_identity`](Value::type_identity) never changes.
/// Lookups that miss hand out the [`Invalid`] sentinel rather than an
/// `Option`, so chained access stays total.
pub trait Value: Any + fmt::Debug {
    fn type_identity(&self) -> TypeIdentity;

    fn meta_type(&self) -> &'static MetaType;

    fn is_valid(&self) -> bool {
        true
    }

    fn is_structured(&self) -> bool {
        false
    }

    /// Name under which this value is reachable from its parent; empty for
    /// roots and detached values.
    fn field_name(&self) -> String;

    fn value_ref(&self) -> ValueRef<'_>;

    /// Copy the contents of `other` into `self`, notifying like a setter.
    /// Fails without side effects when the types differ.
    fn assign(&mut self, other: &dyn Value) -> bool;

    /// Deep equality against a value of possibly different type.
    fn equals(&self, other: &dyn Value) -> bool;

    /// Detached deep copy: same contents, no listeners, no parent.
    fn clone_value(&self) -> Box<dyn Value>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_structured(&self) -> Option<&dyn StructuredNode> {
        None
    }

    fn as_structured_mut(&mut self) -> Option<&mut dyn StructuredNode> {
        None
    }

    #[doc(hidden)]
    fn relink(&mut self, link: Option<Link>);
}

/// Placeholder returned by lookups that found nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalid;

/// The shared `Invalid` sentinel.
pub static INVALID: Invalid = Invalid;

pub fn invalid() -> &'static Invalid {
    &INVALID
}

/// A mutable sentinel. `Invalid` has no state, so leaking one allocates
/// nothing.
pub(crate) fn invalid_mut() -> &'static mut Invalid {
    Box::leak(Box::new(Invalid))
}

impl Value for Invalid {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::void()
    }

    fn meta_type(&self) -> &'static MetaType {
        MetaType::invalid()
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn field_name(&self) -> String {
        String::new()
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Invalid
    }

    fn assign(&mut self, _other: &dyn Value) -> bool {
        false
    }

    fn equals(&self, other: &dyn Value) -> bool {
        !other.is_valid()
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(Invalid)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn relink(&mut self, _link: Option<Link>) {}
}

/// Kinds a [`ValueExt::visit`] callback can receive.
///
/// Implemented for every [`ScalarKind`], for `dyn StructuredNode` and for
/// [`Invalid`]. Asking for anything else does not compile.
pub trait Visitable: 'static {
    fn project(value: &dyn Value) -> Option<&Self>;
}

impl<K: ScalarKind> Visitable for K {
    fn project(value: &dyn Value) -> Option<&Self> {
        K::from_value_ref(value.value_ref())
    }
}

impl Visitable for dyn StructuredNode {
    fn project(value: &dyn Value) -> Option<&Self> {
        value.as_structured()
    }
}

impl Visitable for Invalid {
    fn project(value: &dyn Value) -> Option<&Self> {
        if value.is_valid() {
            None
        } else {
            Some(&INVALID)
        }
    }
}

/// Typed access to erased values.
pub trait ValueExt: Value {
    /// Call `f` with the value viewed as `K`.
    ///
    /// Returns `None` when the runtime kind is not `K`. Structured and
    /// invalid receivers match `dyn StructuredNode` and [`Invalid`].
    ///
    /// ```
    /// use dynamic::{ScalarCell, Value, ValueExt};
    ///
    /// let cell = ScalarCell::new(2.5f32);
    /// let erased: &dyn Value = &cell;
    /// assert_eq!(erased.visit(|v: &f32| *v * 2.0), Some(5.0));
    /// assert_eq!(erased.visit(|_: &i32| ()), None);
    /// ```
    fn visit<K: Visitable + ?Sized, R>(&self, f: impl FnOnce(&K) -> R) -> Option<R> {
        let erased: &dyn Value = self.as_dyn();
        K::project(erased).map(f)
    }

    /// Mutate a scalar through the erased view. `f` works on a copy that is
    /// written back through the cell's setter, so listeners fire once and
    /// only if the value changed.
    fn visit_mut<K: ScalarKind, R>(&mut self, f: impl FnOnce(&mut K) -> R) -> Option<R> {
        self.as_any_mut()
            .downcast_mut::<crate::cell::ScalarCell<K>>()
            .map(|cell| cell.mutate(f))
    }

    fn downcast_ref<N: Value>(&self) -> Option<&N> {
        self.as_any().downcast_ref::<N>()
    }

    /// Typed mutable access, guarded like [`NodeMut`](crate::NodeMut).
    fn downcast_mut<N: TypedNode>(&mut self) -> Option<NodeMut<'_, N>> {
        self.as_any_mut().downcast_mut::<N>().map(NodeMut::new)
    }

    #[doc(hidden)]
    fn as_dyn(&self) -> &dyn Value;
}

impl<V: Value> ValueExt for V {
    fn as_dyn(&self) -> &dyn Value {
        self
    }
}

impl ValueExt for dyn Value {
    fn as_dyn(&self) -> &dyn Value {
        self
    }
}

impl ValueExt for dyn StructuredNode {
    fn as_dyn(&self) -> &dyn Value {
        self.as_value()
    }
}
