//! Key-addressed dynamic maps.

use std::any::Any;
use std::fmt;
use std::ops::Index;
use std::rc::Rc;

use dynamic_path::Path;
use indexmap::IndexMap;

use crate::error::{assign_checked, ChildError};
use crate::listener::{ListenerSet, ListenerToken};
use crate::meta::{MetaType, Reflect, TypedNode};
use crate::node::{Anchor, Link, NodeMut, Operation, StructuredNode};
use crate::suppress::{notifications_enabled, NotifyGuard};
use crate::value::{invalid, invalid_mut, TypeIdentity, Value, ValueRef};

/// Signature of a map listener: the operation, the map before the change,
/// the element, and its key.
pub type MapListener<T> = dyn Fn(Operation, &DynamicMap<T>, &<T as Reflect>::Node, &str);

/// String-keyed nodes kept in insertion order. The key is the child name.
///
/// Adding under an existing key updates that entry in place without any
/// notification. Equality ignores order.
pub struct DynamicMap<T: Reflect> {
    entries: IndexMap<String, T::Node>,
    anchor: Rc<Anchor>,
    listeners: ListenerSet<MapListener<T>>,
}

impl<T: Reflect> DynamicMap<T> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            anchor: Anchor::new(MetaType::of::<DynamicMap<T>>),
            listeners: ListenerSet::new(),
        }
    }

    pub fn meta() -> &'static MetaType {
        MetaType::of::<DynamicMap<T>>()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T::Node> {
        self.entries.get(key)
    }

    /// Mutable access to one entry. See [`NodeMut`].
    pub fn get_mut(&mut self, key: &str) -> Option<NodeMut<'_, T::Node>> {
        self.entries.get_mut(key).map(NodeMut::new)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, T::Node> {
        self.entries.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, T::Node> {
        self.entries.iter()
    }

    /// Insert `value` under `key`.
    ///
    /// A new key is reported as an `Add` before insertion and yields `true`.
    /// An existing key is overwritten silently, keeps its position, and
    /// yields `false`.
    pub fn add_element(&mut self, key: impl Into<String>, value: T) -> bool {
        let key = key.into();
        if let Some(existing) = self.entries.get_mut(&key) {
            let _guard = NotifyGuard::enter();
            existing.set_plain(value);
            return false;
        }
        self.insert_node(key, T::Node::from_plain(value));
        true
    }

    /// Remove the entry under `key`, reporting a `Remove` first. Remaining
    /// entries keep their order.
    pub fn remove_element(&mut self, key: &str) -> Option<T::Node> {
        let index = self.entries.get_index_of(key)?;
        if notifications_enabled() {
            let _guard = NotifyGuard::enter();
            if let Some((key, node)) = self.entries.get_index(index) {
                self.notify(Operation::Remove, node, key);
            }
        }
        let mut removed = self.entries.shift_remove_index(index)?.1;
        removed.relink(None);
        Some(removed)
    }

    /// Make this map equal to `other`: keys missing from `other` are removed,
    /// shared keys assigned, new keys inserted at the end. Each step notifies
    /// as usual.
    pub fn replace_with(&mut self, other: &Self) {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !other.entries.contains_key(key.as_str()))
            .cloned()
            .collect();
        for key in stale {
            self.remove_element(&key);
        }
        for (key, node) in &other.entries {
            match self.entries.get_mut(key) {
                Some(mine) => {
                    mine.assign(node);
                }
                None => self.insert_node(key.clone(), node.clone()),
            }
        }
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(Operation, &DynamicMap<T>, &T::Node, &str) + 'static,
    ) -> ListenerToken {
        self.listeners.add(Rc::new(listener))
    }

    pub fn add_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(Operation, &DynamicMap<T>, &T::Node, &str) + 'static,
    ) {
        self.listeners.add_bound(context, Rc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn insert_node(&mut self, key: String, mut node: T::Node) {
        node.relink(Some(Link::new(&self.anchor, key.as_str())));
        if notifications_enabled() {
            let _guard = NotifyGuard::enter();
            self.notify(Operation::Add, &node, &key);
        }
        self.entries.insert(key, node);
    }

    fn notify(&self, operation: Operation, node: &T::Node, key: &str) {
        for listener in self.listeners.snapshot() {
            listener(operation, self, node, key);
        }
        self.anchor
            .call_child_listeners(Path::from_segment(key), operation, &self.anchor, node);
    }
}

impl<T: Reflect> Default for DynamicMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reflect> Clone for DynamicMap<T> {
    fn clone(&self) -> Self {
        self.entries
            .iter()
            .map(|(key, node)| (key.clone(), node.to_plain()))
            .collect()
    }
}

impl<T: Reflect> PartialEq for DynamicMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T: Reflect> fmt::Debug for DynamicMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(&self.entries).finish()
    }
}

impl<T: Reflect> Index<&str> for DynamicMap<T> {
    type Output = T::Node;

    fn index(&self, key: &str) -> &T::Node {
        &self.entries[key]
    }
}

impl<T: Reflect, K: Into<String>> FromIterator<(K, T)> for DynamicMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            let key = key.into();
            let mut node = T::Node::from_plain(value);
            node.relink(Some(Link::new(&map.anchor, key.as_str())));
            map.entries.insert(key, node);
        }
        map
    }
}

impl<'a, T: Reflect> IntoIterator for &'a DynamicMap<T> {
    type Item = (&'a String, &'a T::Node);
    type IntoIter = indexmap::map::Iter<'a, String, T::Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T: Reflect> Value for DynamicMap<T> {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::of::<Self>()
    }

    fn meta_type(&self) -> &'static MetaType {
        Self::meta()
    }

    fn is_structured(&self) -> bool {
        true
    }

    fn field_name(&self) -> String {
        self.anchor.field_name()
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Structured(self)
    }

    fn assign(&mut self, other: &dyn Value) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => {
                self.replace_with(other);
                true
            }
            None => false,
        }
    }

    fn equals(&self, other: &dyn Value) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
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

    fn as_structured(&self) -> Option<&dyn StructuredNode> {
        Some(self)
    }

    fn as_structured_mut(&mut self) -> Option<&mut dyn StructuredNode> {
        Some(self)
    }

    fn relink(&mut self, link: Option<Link>) {
        self.anchor.set_link(link);
    }
}

impl<T: Reflect> StructuredNode for DynamicMap<T> {
    fn anchor(&self) -> &Rc<Anchor> {
        &self.anchor
    }

    fn as_value(&self) -> &dyn Value {
        self
    }

    fn as_value_mut(&mut self) -> &mut dyn Value {
        self
    }

    fn children(&self) -> Vec<&dyn Value> {
        self.entries.values().map(|node| node as &dyn Value).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Value> {
        self.entries
            .values_mut()
            .map(|node| node as &mut dyn Value)
            .collect()
    }

    fn child(&self, name: &str) -> &dyn Value {
        match self.entries.get(name) {
            Some(node) => node,
            None => invalid(),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut dyn Value {
        match self.entries.get_mut(name) {
            Some(node) => node,
            None => invalid_mut(),
        }
    }

    fn child_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Existing keys assign into their entry; new keys are inserted.
    fn try_assign_child(&mut self, name: &str, value: &dyn Value) -> Result<(), ChildError> {
        if let Some(node) = self.entries.get_mut(name) {
            return assign_checked(node, value);
        }
        let mut node = T::Node::default();
        assign_checked(&mut node, value)?;
        self.insert_node(name.to_string(), node);
        Ok(())
    }

    fn try_remove_child(&mut self, name: &str) -> Result<(), ChildError> {
        self.remove_element(name)
            .map(|_| ())
            .ok_or_else(|| ChildError::NotFound(name.to_string()))
    }

    fn is_map_or_array(&self) -> bool {
        true
    }

    fn element_meta_type(&self) -> Option<&'static MetaType> {
        Some(MetaType::of::<T>())
    }
}

impl<T: Reflect> Reflect for DynamicMap<T> {
    type Node = DynamicMap<T>;

    fn describe() -> MetaType {
        MetaType::map::<T>()
    }
}

impl<T: Reflect> TypedNode for DynamicMap<T> {
    type Plain = DynamicMap<T>;

    fn from_plain(plain: Self) -> Self {
        plain
    }

    fn to_plain(&self) -> Self {
        self.clone()
    }

    fn set_plain(&mut self, plain: Self) {
        self.replace_with(&plain);
    }

    fn twin(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(key, node)| (key.clone(), node.twin()))
                .collect(),
            anchor: Rc::clone(&self.anchor),
            listeners: self.listeners.share(),
        }
    }

    fn is_same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.anchor, &other.anchor)
    }
}
