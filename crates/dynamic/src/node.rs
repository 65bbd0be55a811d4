//! Structured nodes, parent links and upward change propagation.
//!
//! Every record, array and map owns an [`Anchor`]: a small heap object that
//! stays put while the node itself is moved around. Children point at their
//! parent's anchor through a [`Link`] (a `Weak` plus the child's name), so a
//! change deep in the tree can walk up and tell every ancestor about it.
//!
//! # Propagation
//!
//! A change at a child named `name` of anchor `A` calls `A`'s subtree
//! listeners with path `[name]`. Then `A` prepends its own name and hands the
//! path to its parent, and so on up to the root. Each listener sees the
//! path relative to the node it was registered on, the anchor of the node
//! whose direct child changed, and the new value.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

use dynamic_path::Path;

use crate::error::{assign_checked, ChildError, ResolveError};
use crate::listener::{ListenerSet, ListenerToken};
use crate::meta::{MetaType, TypedNode};
use crate::value::{invalid, invalid_mut, Value};

/// Kind of change reported to subtree listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Remove,
    Modify,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::Modify => "modify",
        })
    }
}

/// Signature of a subtree listener: path relative to the listening node,
/// the operation, the anchor of the container whose child changed, and the
/// new (or added, or removed) value.
pub type ChildListener = dyn Fn(&Path, Operation, &Anchor, &dyn Value);

/// Non-owning reference from a child to its parent.
#[derive(Clone)]
pub struct Link {
    parent: Weak<Anchor>,
    name: String,
}

impl Link {
    pub(crate) fn new(parent: &Rc<Anchor>, name: impl Into<String>) -> Self {
        Self {
            parent: Rc::downgrade(parent),
            name: name.into(),
        }
    }

    pub(crate) fn parent(&self) -> Option<Rc<Anchor>> {
        self.parent.upgrade()
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("name", &self.name)
            .field("attached", &(self.parent.strong_count() > 0))
            .finish()
    }
}

/// Heap identity of a structured node.
pub struct Anchor {
    meta: fn() -> &'static MetaType,
    link: RefCell<Option<Link>>,
    listeners: ListenerSet<ChildListener>,
}

impl Anchor {
    pub(crate) fn new(meta: fn() -> &'static MetaType) -> Rc<Self> {
        Rc::new(Self {
            meta,
            link: RefCell::new(None),
            listeners: ListenerSet::new(),
        })
    }

    pub fn meta_type(&self) -> &'static MetaType {
        (self.meta)()
    }

    /// Name of the node within its parent; empty for roots.
    pub fn field_name(&self) -> String {
        self.link
            .borrow()
            .as_ref()
            .map(|link| link.name.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<Rc<Anchor>> {
        self.link.borrow().as_ref().and_then(Link::parent)
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Path from the root of the tree down to this node.
    pub fn path(&self) -> Path {
        let mut path = Path::new();
        let mut next = self.link();
        while let Some(link) = next {
            let Some(parent) = link.parent() else {
                break;
            };
            path.prepend(link.name);
            next = parent.link();
        }
        path
    }

    pub fn add_child_listener(
        &self,
        listener: impl Fn(&Path, Operation, &Anchor, &dyn Value) + 'static,
    ) -> ListenerToken {
        self.listeners.add(Rc::new(listener))
    }

    pub fn add_child_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(&Path, Operation, &Anchor, &dyn Value) + 'static,
    ) {
        self.listeners.add_bound(context, Rc::new(listener));
    }

    pub fn child_listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn link(&self) -> Option<Link> {
        self.link.borrow().clone()
    }

    pub(crate) fn set_link(&self, link: Option<Link>) {
        *self.link.borrow_mut() = link;
    }

    /// Report a change at `path` (relative to this node) here and at every
    /// ancestor.
    pub(crate) fn call_child_listeners(
        &self,
        mut path: Path,
        operation: Operation,
        origin: &Anchor,
        value: &dyn Value,
    ) {
        tracing::trace!(%path, %operation, "propagating child change");
        self.notify_local(&path, operation, origin, value);

        let mut next = self.link();
        while let Some(link) = next {
            let Some(parent) = link.parent() else {
                break;
            };
            path.prepend(link.name);
            parent.notify_local(&path, operation, origin, value);
            next = parent.link();
        }
    }

    fn notify_local(&self, path: &Path, operation: Operation, origin: &Anchor, value: &dyn Value) {
        for listener in self.listeners.snapshot() {
            listener(path, operation, origin, value);
        }
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("type", &self.meta_type().type_identity())
            .field("link", &self.link.borrow())
            .finish_non_exhaustive()
    }
}

/// A record, array or map: a value with named children.
pub trait StructuredNode: Value {
    fn anchor(&self) -> &Rc<Anchor>;

    fn as_value(&self) -> &dyn Value;

    fn as_value_mut(&mut self) -> &mut dyn Value;

    fn children(&self) -> Vec<&dyn Value>;

    fn children_mut(&mut self) -> Vec<&mut dyn Value>;

    /// The child called `name`, or the `Invalid` sentinel.
    fn child(&self, name: &str) -> &dyn Value;

    fn child_mut(&mut self, name: &str) -> &mut dyn Value;

    fn child_names(&self) -> Vec<String> {
        self.children()
            .into_iter()
            .map(|child| child.field_name())
            .collect()
    }

    fn try_assign_child(&mut self, name: &str, value: &dyn Value) -> Result<(), ChildError>;

    fn try_remove_child(&mut self, name: &str) -> Result<(), ChildError>;

    /// Assign into the child called `name`. Arrays grow and maps insert as
    /// needed; records only accept existing fields.
    fn assign_child(&mut self, name: &str, value: &dyn Value) -> bool {
        match self.try_assign_child(name, value) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(name, %error, "assign_child failed");
                false
            }
        }
    }

    fn remove_child(&mut self, name: &str) -> bool {
        match self.try_remove_child(name) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(name, %error, "remove_child failed");
                false
            }
        }
    }

    fn is_map_or_array(&self) -> bool {
        false
    }

    fn element_meta_type(&self) -> Option<&'static MetaType> {
        None
    }
}

/// Path-based access and subtree listeners for every structured node.
pub trait NodeExt: StructuredNode {
    /// The descendant at `path`, or the `Invalid` sentinel if any segment is
    /// missing. The empty path is the node itself.
    fn get_child(&self, path: &Path) -> &dyn Value {
        match self.resolve(path) {
            Ok(value) => value,
            Err(_) => invalid(),
        }
    }

    fn get_child_mut(&mut self, path: &Path) -> &mut dyn Value {
        match self.resolve_mut(path) {
            Ok(value) => value,
            Err(_) => invalid_mut(),
        }
    }

    /// Like [`get_child`](Self::get_child), reporting which segment failed.
    fn resolve(&self, path: &Path) -> Result<&dyn Value, ResolveError> {
        let mut current: &dyn Value = self.as_value();
        for (depth, segment) in path.iter().enumerate() {
            let Some(node) = current.as_structured() else {
                return Err(ResolveError::NotStructured {
                    segment: segment.clone(),
                    depth,
                });
            };
            let child = node.child(segment);
            if !child.is_valid() {
                return Err(ResolveError::NotFound {
                    segment: segment.clone(),
                    depth,
                });
            }
            current = child;
        }
        Ok(current)
    }

    fn resolve_mut(&mut self, path: &Path) -> Result<&mut dyn Value, ResolveError> {
        let mut current: &mut dyn Value = self.as_value_mut();
        for (depth, segment) in path.iter().enumerate() {
            let Some(node) = current.as_structured_mut() else {
                return Err(ResolveError::NotStructured {
                    segment: segment.clone(),
                    depth,
                });
            };
            let child = node.child_mut(segment);
            if !child.is_valid() {
                return Err(ResolveError::NotFound {
                    segment: segment.clone(),
                    depth,
                });
            }
            current = child;
        }
        Ok(current)
    }

    /// Assign `value` at `path`. The empty path assigns the node itself; any
    /// other path assigns into the last segment's container, which may grow
    /// an array or insert a map entry.
    fn assign_at(&mut self, path: &Path, value: &dyn Value) -> Result<(), ResolveError> {
        let Some((parent, name)) = path.split_last() else {
            return assign_checked(self.as_value_mut(), value).map_err(ResolveError::from);
        };
        let depth = parent.len();
        let container = self.resolve_mut(&parent)?;
        let Some(node) = container.as_structured_mut() else {
            return Err(ResolveError::NotStructured {
                segment: name.to_string(),
                depth,
            });
        };
        node.try_assign_child(name, value)
            .map_err(ResolveError::from)
    }

    /// Remove the child at `path` from its array or map.
    fn remove_at(&mut self, path: &Path) -> Result<(), ResolveError> {
        let (parent, name) = path.split_last().ok_or(ResolveError::EmptyPath)?;
        let depth = parent.len();
        let container = self.resolve_mut(&parent)?;
        let Some(node) = container.as_structured_mut() else {
            return Err(ResolveError::NotStructured {
                segment: name.to_string(),
                depth,
            });
        };
        node.try_remove_child(name).map_err(ResolveError::from)
    }

    /// Listen to every change below this node.
    fn add_child_listener(
        &self,
        listener: impl Fn(&Path, Operation, &Anchor, &dyn Value) + 'static,
    ) -> ListenerToken {
        self.anchor().add_child_listener(listener)
    }

    fn add_child_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(&Path, Operation, &Anchor, &dyn Value) + 'static,
    ) {
        self.anchor().add_child_listener_with_context(context, listener);
    }
}

impl<N: StructuredNode + ?Sized> NodeExt for N {}

/// Mutable access to one element of an array or map.
///
/// An element replaced wholesale (`*guard = node`) is put back when the
/// guard drops and the replacement is assigned into it, so it notifies
/// like a setter and keeps its listeners and its link.
pub struct NodeMut<'a, N: TypedNode> {
    node: &'a mut N,
    held: Option<N>,
}

impl<'a, N: TypedNode> NodeMut<'a, N> {
    pub(crate) fn new(node: &'a mut N) -> Self {
        let held = node.twin();
        Self {
            node,
            held: Some(held),
        }
    }
}

impl<N: TypedNode> Deref for NodeMut<'_, N> {
    type Target = N;

    fn deref(&self) -> &N {
        &*self.node
    }
}

impl<N: TypedNode> DerefMut for NodeMut<'_, N> {
    fn deref_mut(&mut self) -> &mut N {
        &mut *self.node
    }
}

impl<N: TypedNode> Drop for NodeMut<'_, N> {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            self.node.settle(held);
        }
    }
}

impl<N: TypedNode> fmt::Debug for NodeMut<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.node, f)
    }
}
