//! Index-addressed dynamic arrays.

use std::any::Any;
use std::fmt;
use std::ops::Index;
use std::rc::Rc;

use dynamic_path::{parse_index, Path};

use crate::error::{assign_checked, ChildError};
use crate::listener::{ListenerSet, ListenerToken};
use crate::meta::{MetaType, Reflect, TypedNode};
use crate::node::{Anchor, Link, NodeMut, Operation, StructuredNode};
use crate::suppress::{notifications_enabled, NotifyGuard};
use crate::value::{invalid, invalid_mut, TypeIdentity, Value, ValueRef};

/// Signature of an array listener: the operation, the array before the
/// change, the element, and its index.
pub type ArrayListener<T> = dyn Fn(Operation, &DynamicArray<T>, &<T as Reflect>::Node, usize);

/// A growable sequence of nodes whose child names are their indices.
///
/// `Add` and `Remove` are reported before the array changes: an `Add`
/// listener sees the old length, a `Remove` listener can still read the
/// element at its old index. Removing an element renames every later one.
pub struct DynamicArray<T: Reflect> {
    elements: Vec<T::Node>,
    anchor: Rc<Anchor>,
    listeners: ListenerSet<ArrayListener<T>>,
}

impl<T: Reflect> DynamicArray<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            anchor: Anchor::new(MetaType::of::<DynamicArray<T>>),
            listeners: ListenerSet::new(),
        }
    }

    pub fn meta() -> &'static MetaType {
        MetaType::of::<DynamicArray<T>>()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T::Node> {
        self.elements.get(index)
    }

    /// Mutable access to one element. See [`NodeMut`].
    pub fn get_mut(&mut self, index: usize) -> Option<NodeMut<'_, T::Node>> {
        self.elements.get_mut(index).map(NodeMut::new)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T::Node> {
        self.elements.iter()
    }

    /// Plain copies of every element.
    pub fn to_vec(&self) -> Vec<T> {
        self.elements.iter().map(TypedNode::to_plain).collect()
    }

    /// Append `value`, reporting an `Add` at the new index first.
    pub fn add_element(&mut self, value: T) {
        self.push_node(T::Node::from_plain(value));
    }

    pub fn push_node(&mut self, mut node: T::Node) {
        let index = self.elements.len();
        node.relink(Some(Link::new(&self.anchor, index.to_string())));
        if notifications_enabled() {
            let _guard = NotifyGuard::enter();
            self.notify(Operation::Add, &node, index);
        }
        self.elements.push(node);
    }

    /// Remove the element at `index`, reporting a `Remove` first. Returns the
    /// detached element, or `None` when out of bounds.
    pub fn remove_element(&mut self, index: usize) -> Option<T::Node> {
        if index >= self.elements.len() {
            return None;
        }
        if notifications_enabled() {
            let _guard = NotifyGuard::enter();
            self.notify(Operation::Remove, &self.elements[index], index);
        }
        let mut removed = self.elements.remove(index);
        removed.relink(None);
        self.relabel_from(index);
        Some(removed)
    }

    /// Remove every element, last first.
    pub fn clear(&mut self) {
        while let Some(last) = self.elements.len().checked_sub(1) {
            self.remove_element(last);
        }
    }

    /// Make this array equal to `other` through ordinary element operations:
    /// shared indices are assigned, surplus elements removed from the end and
    /// missing ones appended. Each step notifies as usual.
    pub fn replace_with(&mut self, other: &Self) {
        for (mine, theirs) in self.elements.iter_mut().zip(&other.elements) {
            mine.assign(theirs);
        }
        while self.elements.len() > other.elements.len() {
            self.remove_element(self.elements.len() - 1);
        }
        for node in &other.elements[self.elements.len()..] {
            self.push_node(node.clone());
        }
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(Operation, &DynamicArray<T>, &T::Node, usize) + 'static,
    ) -> ListenerToken {
        self.listeners.add(Rc::new(listener))
    }

    pub fn add_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(Operation, &DynamicArray<T>, &T::Node, usize) + 'static,
    ) {
        self.listeners.add_bound(context, Rc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn from_nodes(nodes: impl IntoIterator<Item = T::Node>) -> Self {
        let mut array = Self::new();
        array.elements = nodes.into_iter().collect();
        array.relabel_from(0);
        array
    }

    fn notify(&self, operation: Operation, node: &T::Node, index: usize) {
        for listener in self.listeners.snapshot() {
            listener(operation, self, node, index);
        }
        self.anchor.call_child_listeners(
            Path::from_segment(index.to_string()),
            operation,
            &self.anchor,
            node,
        );
    }

    fn relabel_from(&mut self, start: usize) {
        let anchor = &self.anchor;
        for (index, node) in self.elements.iter_mut().enumerate().skip(start) {
            node.relink(Some(Link::new(anchor, index.to_string())));
        }
    }
}

impl<T: Reflect> Default for DynamicArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reflect> Clone for DynamicArray<T> {
    fn clone(&self) -> Self {
        Self::from_nodes(self.elements.iter().cloned())
    }
}

impl<T: Reflect> PartialEq for DynamicArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<T: Reflect> fmt::Debug for DynamicArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.elements).finish()
    }
}

impl<T: Reflect> Index<usize> for DynamicArray<T> {
    type Output = T::Node;

    fn index(&self, index: usize) -> &T::Node {
        &self.elements[index]
    }
}

impl<T: Reflect> FromIterator<T> for DynamicArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_nodes(iter.into_iter().map(T::Node::from_plain))
    }
}

impl<T: Reflect> From<Vec<T>> for DynamicArray<T> {
    fn from(values: Vec<T>) -> Self {
        values.into_iter().collect()
    }
}

impl<'a, T: Reflect> IntoIterator for &'a DynamicArray<T> {
    type Item = &'a T::Node;
    type IntoIter = std::slice::Iter<'a, T::Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Reflect> Value for DynamicArray<T> {
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

impl<T: Reflect> StructuredNode for DynamicArray<T> {
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
        self.elements.iter().map(|node| node as &dyn Value).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Value> {
        self.elements
            .iter_mut()
            .map(|node| node as &mut dyn Value)
            .collect()
    }

    fn child(&self, name: &str) -> &dyn Value {
        match parse_index(name).and_then(|index| self.elements.get(index)) {
            Some(node) => node,
            None => invalid(),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut dyn Value {
        let Some(index) = parse_index(name) else {
            return invalid_mut();
        };
        match self.elements.get_mut(index) {
            Some(node) => node,
            None => invalid_mut(),
        }
    }

    fn child_names(&self) -> Vec<String> {
        (0..self.elements.len()).map(|index| index.to_string()).collect()
    }

    /// In-bounds indices assign into the element; an index past the end first
    /// appends default elements up to it.
    fn try_assign_child(&mut self, name: &str, value: &dyn Value) -> Result<(), ChildError> {
        let index = parse_index(name).ok_or_else(|| ChildError::InvalidIndex(name.to_string()))?;
        let expected = MetaType::of::<T>().type_identity();
        let found = value.type_identity();
        if expected != found {
            return Err(ChildError::TypeMismatch {
                expected: expected.name(),
                found: found.name(),
            });
        }
        while self.elements.len() <= index {
            self.push_node(T::Node::default());
        }
        assign_checked(&mut self.elements[index], value)
    }

    fn try_remove_child(&mut self, name: &str) -> Result<(), ChildError> {
        let index = parse_index(name).ok_or_else(|| ChildError::InvalidIndex(name.to_string()))?;
        self.remove_element(index)
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

impl<T: Reflect> Reflect for DynamicArray<T> {
    type Node = DynamicArray<T>;

    fn describe() -> MetaType {
        MetaType::array::<T>()
    }
}

impl<T: Reflect> TypedNode for DynamicArray<T> {
    type Plain = DynamicArray<T>;

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
            elements: self.elements.iter().map(TypedNode::twin).collect(),
            anchor: Rc::clone(&self.anchor),
            listeners: self.listeners.share(),
        }
    }

    fn is_same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.anchor, &other.anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ScalarCell;
    use crate::node::NodeExt;
    use crate::value::ValueExt;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<(Operation, usize, usize)>>>;

    fn watch(array: &DynamicArray<i32>) -> (Log, ListenerToken) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let token = {
            let log = log.clone();
            array.add_listener(move |op, array, _, index| {
                log.borrow_mut().push((op, index, array.len()))
            })
        };
        (log, token)
    }

    #[test]
    fn test_add_reports_old_length() {
        let mut array = DynamicArray::<i32>::new();
        let (log, _token) = watch(&array);
        array.add_element(10);
        array.add_element(20);
        assert_eq!(
            *log.borrow(),
            vec![(Operation::Add, 0, 0), (Operation::Add, 1, 1)]
        );
        assert_eq!(array.to_vec(), vec![10, 20]);
    }

    #[test]
    fn test_remove_reports_before_erase_and_relabels() {
        let mut array: DynamicArray<i32> = vec![1, 2, 3].into();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let seen = seen.clone();
            array.add_listener(move |op, array, node, index| {
                seen.borrow_mut()
                    .push((op, index, **node, *array[index], array.len()))
            })
        };
        let removed = array.remove_element(0).unwrap();
        assert_eq!(*removed, 1);
        assert_eq!(removed.field_name(), "");
        assert_eq!(*seen.borrow(), vec![(Operation::Remove, 0, 1, 1, 3)]);

        assert_eq!(array.len(), 2);
        assert_eq!(array[0].field_name(), "0");
        assert_eq!(*array[0], 2);
        assert_eq!(array[1].field_name(), "1");
        assert_eq!(*array[1], 3);
        assert!(array.remove_element(5).is_none());
    }

    #[test]
    fn test_child_listener_paths() {
        let mut array = DynamicArray::<i32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let seen = seen.clone();
            array.add_child_listener(move |path, op, _, _| {
                seen.borrow_mut().push(format!("{op} {path}"))
            })
        };
        array.add_element(1);
        array.add_element(2);
        array.get_mut(1).unwrap().set(5);
        array.remove_element(0);
        assert_eq!(*seen.borrow(), vec!["add 0", "add 1", "modify 1", "remove 0"]);
    }

    #[test]
    fn test_replaced_element_notifies_in_place() {
        let mut array: DynamicArray<i32> = vec![1, 2].into();
        let element_hits = Rc::new(RefCell::new(0));
        let _element_token = {
            let hits = element_hits.clone();
            array[1].add_listener(move |_, _| *hits.borrow_mut() += 1)
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let seen = seen.clone();
            array.add_child_listener(move |path, op, _, value| {
                seen.borrow_mut()
                    .push(format!("{op} {path} {:?}", value.visit(|v: &i32| *v)))
            })
        };
        let (log, _array_token) = watch(&array);

        *array.get_mut(1).unwrap() = ScalarCell::new(9);
        *array.get_mut(0).unwrap() = ScalarCell::new(1);

        assert_eq!(array[1].field_name(), "1");
        assert_eq!(*array[1], 9);
        assert_eq!(array[1].listener_count(), 1);
        assert_eq!(*element_hits.borrow(), 1);
        assert_eq!(*seen.borrow(), vec!["modify 1 Some(9)"]);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_replaced_nested_array_keeps_listeners() {
        let mut grid: DynamicArray<DynamicArray<i32>> = vec![DynamicArray::from(vec![1])].into();
        let inner_hits = Rc::new(RefCell::new(0));
        let _inner_token = {
            let hits = inner_hits.clone();
            grid[0].add_child_listener(move |_, _, _, _| *hits.borrow_mut() += 1)
        };

        *grid.get_mut(0).unwrap() = DynamicArray::from(vec![4, 5]);
        assert_eq!(grid[0].to_vec(), vec![4, 5]);
        assert_eq!(grid[0].field_name(), "0");
        assert_eq!(*inner_hits.borrow(), 2);

        grid.get_mut(0).unwrap().get_mut(1).unwrap().set(6);
        assert_eq!(*inner_hits.borrow(), 3);
        assert_eq!(
            grid[0][1].parent().map(|anchor| anchor.path().to_string()),
            Some("0".to_string())
        );
    }

    #[test]
    fn test_runtime_child_access() {
        let mut array: DynamicArray<f64> = vec![0.5, 1.5].into();
        assert!(array.is_map_or_array());
        assert_eq!(array.child("1").visit(|v: &f64| *v), Some(1.5));
        assert!(!array.child("2").is_valid());
        assert!(!array.child("01").is_valid());
        assert!(!array.child("x").is_valid());
        assert_eq!(array.child_names(), ["0", "1"]);

        array.child_mut("0").visit_mut(|v: &mut f64| *v = 2.5);
        assert_eq!(*array[0], 2.5);
    }

    #[test]
    fn test_assign_child_extends() {
        let mut array = DynamicArray::<i32>::new();
        let (log, _token) = watch(&array);
        assert!(array.assign_child("2", &ScalarCell::new(7)));
        assert_eq!(array.to_vec(), vec![0, 0, 7]);
        assert_eq!(
            *log.borrow(),
            vec![
                (Operation::Add, 0, 0),
                (Operation::Add, 1, 1),
                (Operation::Add, 2, 2)
            ]
        );

        assert!(array.assign_child("0", &ScalarCell::new(4)));
        assert_eq!(*array[0], 4);
    }

    #[test]
    fn test_assign_child_rejects_before_growing() {
        let mut array = DynamicArray::<i32>::new();
        assert_eq!(
            array.try_assign_child("3", &ScalarCell::new(1.0f32)),
            Err(ChildError::TypeMismatch {
                expected: "i32",
                found: "f32"
            })
        );
        assert!(array.is_empty());
        assert_eq!(
            array.try_assign_child("-1", &ScalarCell::new(1)),
            Err(ChildError::InvalidIndex("-1".to_string()))
        );
    }

    #[test]
    fn test_remove_child() {
        let mut array: DynamicArray<i32> = vec![1, 2].into();
        assert!(array.remove_child("0"));
        assert!(!array.remove_child("1"));
        assert!(!array.remove_child("zero"));
        assert_eq!(array.to_vec(), vec![2]);
    }

    #[test]
    fn test_replace_with_makes_equal() {
        let mut a: DynamicArray<i32> = vec![1, 2, 3].into();
        let b: DynamicArray<i32> = vec![1, 5].into();
        let (log, _token) = watch(&a);
        assert!(a.assign(&b));
        assert_eq!(a, b);
        assert_eq!(*log.borrow(), vec![(Operation::Remove, 2, 3)]);

        let c: DynamicArray<i32> = vec![1, 5, 8, 9].into();
        a.replace_with(&c);
        assert_eq!(a, c);
        assert_eq!(a[3].field_name(), "3");
    }

    #[test]
    fn test_clone_and_equality() {
        let a: DynamicArray<String> = vec!["x".to_string(), "y".to_string()].into();
        let _token = a.add_listener(|_, _, _, _| {});
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.listener_count(), 0);
        assert!(a.equals(&b));

        let shorter: DynamicArray<String> = vec!["x".to_string()].into();
        assert_ne!(a, shorter);
        assert!(!a.equals(&ScalarCell::new(1i32)));
    }

    #[test]
    fn test_clear() {
        let mut array: DynamicArray<bool> = vec![true, false, true].into();
        let removed = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let removed = removed.clone();
            array.add_listener(move |_, _, _, index| removed.borrow_mut().push(index))
        };
        array.clear();
        assert!(array.is_empty());
        assert_eq!(*removed.borrow(), vec![2, 1, 0]);
    }
}
