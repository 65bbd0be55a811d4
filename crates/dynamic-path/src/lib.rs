//! Field paths for addressing nodes inside a dynamic value tree.
//!
//! A [`Path`] is an ordered list of segments. Each segment names one child
//! on the way down from some node: a record field name, an array index, or
//! a map key. The empty path addresses the node itself.
//!
//! The textual form joins segments with `/` and has no leading separator.
//!
//! # Example
//!
//! ```
//! use dynamic_path::Path;
//!
//! let path = Path::parse("line/start/x");
//! assert_eq!(path.len(), 3);
//! assert_eq!(path[1], "start");
//! assert_eq!(path.to_string(), "line/start/x");
//!
//! let mut up = Path::from_segment("x");
//! up.prepend("start");
//! up.prepend("line");
//! assert_eq!(up, path);
//! ```

mod path;
pub mod util;
pub mod validate;

pub use path::Path;
pub use util::{is_valid_index, parse_index};
pub use validate::{validate_path, PathError, MAX_DEPTH};

/// Separator between segments in the textual form of a [`Path`].
pub const SEPARATOR: char = '/';
