//! Observable scalar fields.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use dynamic_path::Path;

use crate::listener::{ListenerSet, ListenerToken};
use crate::meta::{MetaType, TypedNode};
use crate::node::{Anchor, Link, Operation};
use crate::scalar::ScalarKind;
use crate::suppress::{notifications_enabled, NotifyGuard};
use crate::value::{TypeIdentity, Value, ValueRef};

/// Signature of a direct listener: the cell before the write, and the value
/// about to be stored.
pub type CellListener<T> = dyn Fn(&ScalarCell<T>, &T);

/// A scalar that tells its listeners, and its parent, about every change.
///
/// # Invariants
///
/// 1. Setting a value equal to the current one (within epsilon for floats)
///    does nothing.
/// 2. Direct listeners run before parent listeners, and both run before the
///    new value is stored.
/// 3. Writes made while another notification is in progress are stored
///    without notifying.
pub struct ScalarCell<T: ScalarKind> {
    value: T,
    link: Option<Link>,
    listeners: ListenerSet<CellListener<T>>,
}

impl<T: ScalarKind> ScalarCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            link: None,
            listeners: ListenerSet::new(),
        }
    }

    pub fn meta() -> &'static MetaType {
        MetaType::of::<T>()
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        if self.value.same_as(&value) {
            return;
        }
        if !notifications_enabled() {
            tracing::trace!(field = self.name(), "nested write applied silently");
            self.value = value;
            return;
        }

        let _guard = NotifyGuard::enter();
        for listener in self.listeners.snapshot() {
            listener(self, &value);
        }
        let target = self
            .link
            .as_ref()
            .and_then(|link| Some((link.parent()?, link.name())));
        if let Some((parent, name)) = target {
            let detached = ScalarCell::new(value.clone());
            parent.call_child_listeners(
                Path::from_segment(name),
                Operation::Modify,
                &parent,
                &detached,
            );
        }
        self.value = value;
    }

    /// Edit a copy of the value and store it with [`set`](Self::set).
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut copy = self.value.clone();
        let result = f(&mut copy);
        self.set(copy);
        result
    }

    pub fn add_listener(&self, listener: impl Fn(&ScalarCell<T>, &T) + 'static) -> ListenerToken {
        self.listeners.add(Rc::new(listener))
    }

    /// Register a listener that stays active while `context` is alive.
    pub fn add_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(&ScalarCell<T>, &T) + 'static,
    ) {
        self.listeners.add_bound(context, Rc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Anchor of the enclosing record or container.
    pub fn parent(&self) -> Option<Rc<Anchor>> {
        self.link.as_ref().and_then(Link::parent)
    }

    fn name(&self) -> &str {
        self.link.as_ref().map_or("", Link::name)
    }
}

impl<T: ScalarKind> Deref for ScalarCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: ScalarKind> Default for ScalarCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ScalarKind> Clone for ScalarCell<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: ScalarKind> PartialEq for ScalarCell<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value.same_as(&other.value)
    }
}

impl<T: ScalarKind> From<T> for ScalarCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ScalarKind> fmt::Debug for ScalarCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScalarCell").field(&self.value).finish()
    }
}

impl<T: ScalarKind + fmt::Display> fmt::Display for ScalarCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<T: ScalarKind> Value for ScalarCell<T> {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    fn meta_type(&self) -> &'static MetaType {
        MetaType::of::<T>()
    }

    fn field_name(&self) -> String {
        self.name().to_string()
    }

    fn value_ref(&self) -> ValueRef<'_> {
        self.value.as_value_ref()
    }

    fn assign(&mut self, other: &dyn Value) -> bool {
        match other.as_any().downcast_ref::<ScalarCell<T>>() {
            Some(other) => {
                self.set(other.value.clone());
                true
            }
            None => {
                tracing::debug!(
                    expected = T::TYPE.name(),
                    found = other.type_identity().name(),
                    "scalar assign rejected"
                );
                false
            }
        }
    }

    fn equals(&self, other: &dyn Value) -> bool {
        other
            .as_any()
            .downcast_ref::<ScalarCell<T>>()
            .is_some_and(|other| self == other)
    }

    fn clone_value(&self) -> Box<dyn Value> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn relink(&mut self, link: Option<Link>) {
        self.link = link;
    }
}

impl<T: ScalarKind> TypedNode for ScalarCell<T> {
    type Plain = T;

    fn from_plain(plain: T) -> Self {
        Self::new(plain)
    }

    fn to_plain(&self) -> T {
        self.value.clone()
    }

    fn set_plain(&mut self, plain: T) {
        self.set(plain);
    }

    fn twin(&self) -> Self {
        Self {
            value: self.value.clone(),
            link: self.link.clone(),
            listeners: self.listeners.share(),
        }
    }

    fn is_same_node(&self, other: &Self) -> bool {
        self.listeners.same_registry(&other.listeners)
    }
}
