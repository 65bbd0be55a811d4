//! Records: fixed sets of named fields.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use dynamic_path::Path;

use crate::error::{assign_checked, ChildError};
use crate::listener::{ListenerSet, ListenerToken};
use crate::meta::{FieldDescriptor, MetaType, Reflect, TypedNode};
use crate::node::{Anchor, Link, Operation, StructuredNode};
use crate::suppress::{notifications_enabled, NotifyGuard};
use crate::value::{invalid, invalid_mut, TypeIdentity, Value, ValueExt, ValueRef, Visitable};

/// The field list of a plain aggregate.
///
/// `fields` and `fields_mut` must yield the fields in the order of
/// `FIELD_NAMES`. Use [`record!`](crate::record!) rather than implementing
/// this by hand.
pub trait Aggregate: Reflect {
    const FIELD_NAMES: &'static [&'static str];

    fn field_descriptors() -> Vec<FieldDescriptor>;

    fn fields(&self) -> Vec<&dyn Value>;

    fn fields_mut(&mut self) -> Vec<&mut dyn Value>;

    /// Field-wise [`TypedNode::twin`].
    #[doc(hidden)]
    fn twin(&self) -> Self;

    /// Field-wise [`TypedNode::settle`].
    #[doc(hidden)]
    fn settle(&mut self, held: Self);
}

/// Signature of a whole-record listener: the record before the write and the
/// value about to be stored.
pub type RecordListener<T> = dyn Fn(&Record<T>, &T);

/// A structured node wrapping an [`Aggregate`].
///
/// Fields are reachable both statically (`record.x`) and by name
/// (`record.field("x")`). Field changes propagate to the record's subtree
/// listeners and further up.
pub struct Record<T: Aggregate> {
    value: T,
    anchor: Rc<Anchor>,
    listeners: ListenerSet<RecordListener<T>>,
}

impl<T: Aggregate> Record<T> {
    pub fn new(value: T) -> Self {
        let mut record = Self {
            value,
            anchor: Anchor::new(MetaType::of::<T>),
            listeners: ListenerSet::new(),
        };
        record.attach_fields();
        record
    }

    pub fn meta() -> &'static MetaType {
        MetaType::of::<T>()
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Detach the aggregate from this record.
    pub fn into_inner(self) -> T {
        let mut value = self.value;
        for field in value.fields_mut() {
            field.relink(None);
        }
        value
    }

    /// Mutable access to the fields.
    ///
    /// Fields keep notifying through the guard. A field replaced wholesale
    /// (`edit.x = ScalarCell::new(..)`) is put back when the guard drops and
    /// the replacement is assigned into it, so it notifies like a setter and
    /// keeps its listeners. The guard copies the fields when created.
    pub fn edit(&mut self) -> RecordEdit<'_, T> {
        let held = Aggregate::twin(&self.value);
        RecordEdit {
            record: self,
            held: Some(held),
        }
    }

    /// Replace every field at once.
    ///
    /// Record listeners and subtree listeners above this record see a single
    /// `Modify`; the fields are then written silently, keeping any listeners
    /// registered on them.
    pub fn set(&mut self, value: T) {
        if self.value == value {
            return;
        }
        if !notifications_enabled() {
            self.write_fields(&value);
            return;
        }

        let _guard = NotifyGuard::enter();
        for listener in self.listeners.snapshot() {
            listener(self, &value);
        }
        if let Some(link) = self.anchor.link() {
            if let Some(parent) = link.parent() {
                let detached = Record::new(value.clone());
                parent.call_child_listeners(
                    Path::from_segment(link.name()),
                    Operation::Modify,
                    &parent,
                    &detached,
                );
            }
        }
        self.write_fields(&value);
    }

    /// Edit a copy of the aggregate and store it with [`set`](Self::set).
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut copy = self.value.clone();
        let result = f(&mut copy);
        self.set(copy);
        result
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        T::FIELD_NAMES
    }

    /// The field called `name`, or the `Invalid` sentinel.
    pub fn field(&self, name: &str) -> &dyn Value {
        self.child(name)
    }

    pub fn field_mut(&mut self, name: &str) -> &mut dyn Value {
        self.child_mut(name)
    }

    /// Call `f` with every field name and value, in declaration order.
    pub fn visit_fields(&self, mut f: impl FnMut(&str, &dyn Value)) {
        for (name, field) in T::FIELD_NAMES.iter().zip(self.value.fields()) {
            f(name, field);
        }
    }

    pub fn visit_fields_mut(&mut self, mut f: impl FnMut(&str, &mut dyn Value)) {
        for (name, field) in T::FIELD_NAMES.iter().zip(self.value.fields_mut()) {
            f(name, field);
        }
    }

    /// Visit one field by name; `None` if it is missing or not a `K`.
    pub fn visit_field<K: Visitable + ?Sized, R>(
        &self,
        name: &str,
        f: impl FnOnce(&K) -> R,
    ) -> Option<R> {
        self.field(name).visit(f)
    }

    pub fn add_listener(&self, listener: impl Fn(&Record<T>, &T) + 'static) -> ListenerToken {
        self.listeners.add(Rc::new(listener))
    }

    pub fn add_listener_with_context<C: 'static>(
        &self,
        context: &Rc<C>,
        listener: impl Fn(&Record<T>, &T) + 'static,
    ) {
        self.listeners.add_bound(context, Rc::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn attach_fields(&mut self) {
        let anchor = &self.anchor;
        for (name, field) in T::FIELD_NAMES.iter().zip(self.value.fields_mut()) {
            field.relink(Some(Link::new(anchor, *name)));
        }
    }

    fn write_fields(&mut self, value: &T) {
        let _guard = NotifyGuard::enter();
        for (field, source) in self.value.fields_mut().into_iter().zip(value.fields()) {
            field.assign(source);
        }
    }

    fn field_index(name: &str) -> Option<usize> {
        T::FIELD_NAMES.iter().position(|field| *field == name)
    }
}

/// Mutable view of a record's fields. See [`Record::edit`].
pub struct RecordEdit<'a, T: Aggregate> {
    record: &'a mut Record<T>,
    held: Option<T>,
}

impl<T: Aggregate> Deref for RecordEdit<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record.value
    }
}

impl<T: Aggregate> DerefMut for RecordEdit<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record.value
    }
}

impl<T: Aggregate> Drop for RecordEdit<'_, T> {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            self.record.value.settle(held);
        }
        self.record.attach_fields();
    }
}

impl<T: Aggregate> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Aggregate> Default for Record<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Aggregate> Clone for Record<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: Aggregate> PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Aggregate> From<T> for Record<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Aggregate> fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl<T: Aggregate> Value for Record<T> {
    fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }

    fn meta_type(&self) -> &'static MetaType {
        MetaType::of::<T>()
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
        match other.as_any().downcast_ref::<Record<T>>() {
            Some(other) => {
                self.set(other.value.clone());
                true
            }
            None => false,
        }
    }

    fn equals(&self, other: &dyn Value) -> bool {
        other
            .as_any()
            .downcast_ref::<Record<T>>()
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

impl<T: Aggregate> StructuredNode for Record<T> {
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
        self.value.fields()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Value> {
        self.value.fields_mut()
    }

    fn child(&self, name: &str) -> &dyn Value {
        let Some(index) = Self::field_index(name) else {
            return invalid();
        };
        match self.value.fields().into_iter().nth(index) {
            Some(field) => field,
            None => invalid(),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut dyn Value {
        let Some(index) = Self::field_index(name) else {
            return invalid_mut();
        };
        match self.value.fields_mut().into_iter().nth(index) {
            Some(field) => field,
            None => invalid_mut(),
        }
    }

    fn child_names(&self) -> Vec<String> {
        T::FIELD_NAMES.iter().map(|name| name.to_string()).collect()
    }

    fn try_assign_child(&mut self, name: &str, value: &dyn Value) -> Result<(), ChildError> {
        let field = self.child_mut(name);
        if !field.is_valid() {
            return Err(ChildError::NotFound(name.to_string()));
        }
        assign_checked(field, value)
    }

    fn try_remove_child(&mut self, _name: &str) -> Result<(), ChildError> {
        Err(ChildError::FixedShape)
    }
}

impl<T: Aggregate> TypedNode for Record<T> {
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
            value: Aggregate::twin(&self.value),
            anchor: Rc::clone(&self.anchor),
            listeners: self.listeners.share(),
        }
    }

    fn is_same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.anchor, &other.anchor)
    }
}

/// Declare a plain aggregate usable as a [`Record`].
///
/// Field types are written as plain reflectable types; each is stored as its
/// node type (`f32` as `ScalarCell<f32>`, a nested aggregate as `Record<_>`,
/// `DynamicArray<_>` as itself).
///
/// ```
/// use dynamic::{record, NodeExt, Record, Value, ValueExt};
/// use dynamic_path::Path;
///
/// record! {
///     pub struct Point {
///         pub x: f32,
///         pub y: f32,
///     }
/// }
///
/// let mut point = Record::new(Point::default());
/// point.edit().x.set(3.0);
/// assert_eq!(point.field_names(), ["x", "y"]);
/// assert_eq!(point.get_child(&Path::parse("x")).visit(|x: &f32| *x), Some(3.0));
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: <$ty as $crate::Reflect>::Node,
            )+
        }

        impl $crate::Aggregate for $name {
            const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            fn field_descriptors() -> ::std::vec::Vec<$crate::FieldDescriptor> {
                ::std::vec![
                    $($crate::FieldDescriptor::new(stringify!($field), $crate::MetaType::of::<$ty>)),+
                ]
            }

            fn fields(&self) -> ::std::vec::Vec<&dyn $crate::Value> {
                ::std::vec![$(&self.$field as &dyn $crate::Value),+]
            }

            fn fields_mut(&mut self) -> ::std::vec::Vec<&mut dyn $crate::Value> {
                ::std::vec![$(&mut self.$field as &mut dyn $crate::Value),+]
            }

            fn twin(&self) -> Self {
                $name {
                    $($field: $crate::TypedNode::twin(&self.$field)),+
                }
            }

            fn settle(&mut self, held: Self) {
                $($crate::TypedNode::settle(&mut self.$field, held.$field);)+
            }
        }

        impl $crate::Reflect for $name {
            type Node = $crate::Record<$name>;

            fn describe() -> $crate::MetaType {
                $crate::MetaType::record::<$name>()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ScalarCell;
    use crate::node::NodeExt;
    use std::cell::{Cell, RefCell};

    crate::record! {
        struct Point {
            x: f32,
            y: f32,
        }
    }

    crate::record! {
        struct Line {
            start: Point,
            finish: Point,
            label: String,
        }
    }

    fn point(x: f32, y: f32) -> Point {
        Point {
            x: ScalarCell::new(x),
            y: ScalarCell::new(y),
        }
    }

    #[test]
    fn test_static_and_runtime_access_agree() {
        let mut record = Record::new(point(1.0, 2.0));
        assert_eq!(*record.x, 1.0);
        assert_eq!(record.field("y").visit(|y: &f32| *y), Some(2.0));
        assert_eq!(record.field("x").field_name(), "x");

        record.field_mut("x").visit_mut(|x: &mut f32| *x = 5.0);
        assert_eq!(*record.x, 5.0);
    }

    #[test]
    fn test_missing_field_is_invalid() {
        let record = Record::new(point(0.0, 0.0));
        assert!(!record.field("z").is_valid());
        assert!(record.visit_field("z", |_: &f32| ()).is_none());
    }

    #[test]
    fn test_field_names_and_visit_fields() {
        let record = Record::<Line>::default();
        assert_eq!(record.field_names(), ["start", "finish", "label"]);
        assert_eq!(record.child_names(), ["start", "finish", "label"]);

        let mut structured = Vec::new();
        record.visit_fields(|name, value| {
            if value.is_structured() {
                structured.push(name.to_string());
            }
        });
        assert_eq!(structured, ["start", "finish"]);
    }

    #[test]
    fn test_nested_field_names() {
        let line = Record::<Line>::default();
        assert_eq!(line.start.field_name(), "start");
        assert_eq!(line.start.x.field_name(), "x");
        assert_eq!(line.get_child(&Path::parse("finish/y")).field_name(), "y");
    }

    #[test]
    fn test_field_change_reaches_record() {
        let mut record = Record::new(point(0.0, 0.0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let seen = seen.clone();
            record.add_child_listener(move |path, op, _, value| {
                seen.borrow_mut()
                    .push((path.to_string(), op, value.visit(|v: &f32| *v)));
            })
        };
        record.edit().y.set(4.0);
        assert_eq!(
            *seen.borrow(),
            vec![("y".to_string(), Operation::Modify, Some(4.0))]
        );
    }

    #[test]
    fn test_replaced_field_notifies_and_keeps_listeners() {
        let mut record = Record::new(point(0.0, 0.0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _token = {
            let seen = seen.clone();
            record.add_child_listener(move |path, op, _, value| {
                seen.borrow_mut()
                    .push((path.to_string(), op, value.visit(|v: &f32| *v)))
            })
        };
        let field_hits = Rc::new(Cell::new(0));
        let _field_token = {
            let hits = field_hits.clone();
            record.x.add_listener(move |_, _| hits.set(hits.get() + 1))
        };

        record.edit().x = ScalarCell::new(7.0);
        assert_eq!(record.x.field_name(), "x");
        assert_eq!(*record.x, 7.0);
        assert_eq!(record.x.listener_count(), 1);
        assert_eq!(field_hits.get(), 1);

        record.edit().x.set(8.0);
        record.edit().y = ScalarCell::new(0.0);
        assert_eq!(field_hits.get(), 2);
        assert_eq!(
            *seen.borrow(),
            vec![
                ("x".to_string(), Operation::Modify, Some(7.0)),
                ("x".to_string(), Operation::Modify, Some(8.0)),
            ]
        );
    }

    #[test]
    fn test_replaced_nested_record_keeps_its_anchor() {
        let mut line = Record::<Line>::default();
        let start_paths = Rc::new(RefCell::new(Vec::new()));
        let _start_token = {
            let paths = start_paths.clone();
            line.start
                .add_child_listener(move |path, _, _, _| paths.borrow_mut().push(path.to_string()))
        };
        let start_anchor = Rc::clone(line.start.anchor());
        let line_hits = Rc::new(Cell::new(0));
        let _line_token = {
            let hits = line_hits.clone();
            line.add_child_listener(move |_, _, _, _| hits.set(hits.get() + 1))
        };

        line.edit().finish = Record::new(point(1.0, 2.0));
        assert_eq!(line_hits.get(), 1);
        assert_eq!(*line.finish.y, 2.0);

        line.edit().start = Record::new(point(5.0, 0.0));
        assert!(Rc::ptr_eq(line.start.anchor(), &start_anchor));
        assert_eq!(line_hits.get(), 2);

        line.edit().start.edit().x.set(3.0);
        assert_eq!(*start_paths.borrow(), ["x"]);
        assert_eq!(line_hits.get(), 3);
        assert_eq!(line.start.anchor().path().to_string(), "start");
    }

    #[test]
    fn test_whole_set_notifies_once_and_keeps_field_listeners() {
        let mut record = Record::new(point(0.0, 0.0));
        let record_hits = Rc::new(Cell::new(0));
        let field_hits = Rc::new(Cell::new(0));
        let _record_token = {
            let hits = record_hits.clone();
            record.add_listener(move |old, new| {
                assert_eq!(*old.x, 0.0);
                assert_eq!(*new.x, 1.0);
                hits.set(hits.get() + 1);
            })
        };
        let _field_token = {
            let hits = field_hits.clone();
            record.x.add_listener(move |_, _| hits.set(hits.get() + 1))
        };

        record.set(point(1.0, 1.0));
        assert_eq!(record_hits.get(), 1);
        assert_eq!(field_hits.get(), 0);
        assert_eq!(*record.y, 1.0);

        record.set(point(1.0, 1.0));
        assert_eq!(record_hits.get(), 1);

        record.edit().x.set(2.0);
        assert_eq!(field_hits.get(), 1);
    }

    #[test]
    fn test_copy_does_not_copy_listeners() {
        let record = Record::new(point(1.0, 2.0));
        let _token = record.add_listener(|_, _| {});
        let _child_token = record.add_child_listener(|_, _, _, _| {});
        let copy = record.clone();
        assert_eq!(copy, record);
        assert_eq!(copy.listener_count(), 0);
        assert_eq!(copy.anchor().child_listener_count(), 0);
        assert_eq!(copy.x.field_name(), "x");
    }

    #[test]
    fn test_assign_and_remove_child() {
        let mut record = Record::<Line>::default();
        assert!(record.assign_child("label", &ScalarCell::new("main".to_string())));
        assert_eq!(record.label.get(), "main");

        assert!(!record.assign_child("label", &ScalarCell::new(3i32)));
        assert!(!record.assign_child("missing", &ScalarCell::new(3i32)));
        assert_eq!(
            record.try_assign_child("missing", &ScalarCell::new(3i32)),
            Err(ChildError::NotFound("missing".to_string()))
        );

        assert!(record.assign_child("start", &Record::new(point(4.0, 5.0))));
        assert_eq!(*record.start.y, 5.0);

        assert!(!record.remove_child("label"));
        assert_eq!(record.try_remove_child("label"), Err(ChildError::FixedShape));
    }

    #[test]
    fn test_meta_type_describes_fields() {
        let meta = Record::<Line>::meta();
        assert!(meta.is_record());
        let names: Vec<_> = meta.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["start", "finish", "label"]);
        assert_eq!(meta.field("start").map(|f| f.meta_type()), Some(Record::<Point>::meta()));
        assert_eq!(meta.field("label").map(|f| f.meta_type()), Some(MetaType::of::<String>()));

        let built = meta.construct().unwrap();
        assert!(std::ptr::eq(built.meta_type(), meta));
        assert!(built.is_structured());
    }

    #[test]
    fn test_into_inner_detaches() {
        let record = Record::new(point(1.0, 2.0));
        let plain = record.into_inner();
        assert_eq!(plain.x.field_name(), "");
    }
}
