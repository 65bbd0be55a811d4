//! Reflective, observable structured values.
//!
//! A tree is built from four kinds of node:
//!
//! - [`ScalarCell`] holds one primitive (integers, floats, `bool`, `String`,
//!   [`Path`]) and notifies on change.
//! - [`Record`] wraps a fixed-shape aggregate declared with [`record!`].
//! - [`DynamicArray`] holds an ordered, index-addressed sequence.
//! - [`DynamicMap`] holds string-keyed entries in insertion order.
//!
//! Every node can be handled uniformly as a [`Value`]. Structured nodes
//! ([`StructuredNode`]) expose their children by name and resolve
//! [`Path`]s. Changes anywhere below a node reach that node's child
//! listeners with the path relative to it.
//!
//! Each reflectable type has one interned [`MetaType`] that names its
//! shape, its fields or element type, and can construct a default instance.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use dynamic::{record, NodeExt, Record, ScalarCell, Value, ValueExt};
//! use dynamic_path::Path;
//!
//! record! {
//!     pub struct Point {
//!         pub x: f32,
//!         pub y: f32,
//!     }
//! }
//!
//! record! {
//!     pub struct Line {
//!         pub start: Point,
//!         pub end: Point,
//!     }
//! }
//!
//! let mut line = Record::new(Line::default());
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let _token = {
//!     let seen = seen.clone();
//!     line.add_child_listener(move |path, _, _, value| {
//!         seen.borrow_mut().push((path.to_string(), value.visit(|x: &f32| *x)))
//!     })
//! };
//!
//! line.edit().start.edit().x.set(1.5);
//! assert_eq!(*seen.borrow(), [("start/x".to_string(), Some(1.5))]);
//!
//! let x = line.get_child(&Path::parse("start/x"));
//! assert_eq!(x.visit(|x: &f32| *x), Some(1.5));
//! assert!(line.assign_at(&Path::parse("end/y"), &ScalarCell::new(2.0f32)).is_ok());
//! assert_eq!(*line.end.y, 2.0);
//! ```

#![forbid(unsafe_code)]

mod array;
mod cell;
mod error;
mod listener;
mod map;
mod meta;
mod node;
mod record;
mod scalar;
mod suppress;
mod value;

pub use array::{ArrayListener, DynamicArray};
pub use cell::{CellListener, ScalarCell};
pub use error::{ChildError, ResolveError};
pub use listener::{ListenerToken, Subscriptions};
pub use map::{DynamicMap, MapListener};
pub use meta::{meta_type_of, FieldDescriptor, MetaType, Reflect, Shape, TypedNode};
pub use node::{Anchor, ChildListener, Link, NodeExt, NodeMut, Operation, StructuredNode};
pub use record::{Aggregate, Record, RecordEdit, RecordListener};
pub use scalar::{ScalarKind, ScalarType};
pub use suppress::{notifications_enabled, silently, NotifyGuard};
pub use value::{invalid, Invalid, TypeIdentity, Value, ValueExt, ValueRef, Visitable, INVALID};

pub use dynamic_path::Path;
