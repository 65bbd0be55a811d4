use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::validate::{validate_path, PathError};
use crate::SEPARATOR;

/// Ordered list of segments addressing a node relative to some other node.
///
/// The empty path addresses the node itself. Segments are compared
/// byte-wise; there is no escaping, so a segment containing `/` cannot be
/// written out and parsed back (see [`Path::validate`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-segment path.
    pub fn from_segment(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// Parse the textual form without validation.
    ///
    /// The empty string yields the empty path. Otherwise the string is split
    /// on every `/`, so empty segments are kept. That includes a trailing
    /// separator, which is not dropped: `"a/"` has two segments, the second
    /// empty. Use [`parse_strict`](Self::parse_strict) to reject such input.
    ///
    /// ```
    /// use dynamic_path::Path;
    ///
    /// assert!(Path::parse("").is_empty());
    /// assert_eq!(Path::parse("a//b").segments(), ["a", "", "b"]);
    /// assert_eq!(Path::parse("a/").segments(), ["a", ""]);
    /// assert!(Path::parse_strict("a/").is_err());
    /// ```
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::new();
        }
        text.split(SEPARATOR).collect()
    }

    /// Parse the textual form and [`validate`](Path::validate) the result.
    pub fn parse_strict(text: &str) -> Result<Self, PathError> {
        let path = Self::parse(text);
        path.validate()?;
        Ok(path)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    /// Whether this path addresses the node itself.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Insert a segment in front. Used while a change walks up the tree and
    /// each ancestor adds its own name.
    pub fn prepend(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut joined = self.clone();
        joined.push(segment);
        joined
    }

    /// Get the parent path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::NoParent`] for the empty path.
    pub fn parent(&self) -> Result<Self, PathError> {
        match self.split_last() {
            Some((parent, _)) => Ok(parent),
            None => Err(PathError::NoParent),
        }
    }

    /// Split into the parent path and the last segment.
    pub fn split_last(&self) -> Option<(Self, &str)> {
        let (last, rest) = self.segments.split_last()?;
        Some((rest.iter().cloned().collect(), last.as_str()))
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Check if this path lies strictly below `parent`.
    pub fn is_child_of(&self, parent: &Path) -> bool {
        self.segments.len() > parent.segments.len() && self.starts_with(parent)
    }

    /// The remainder of this path below `prefix`.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Self> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| rest.iter().cloned().collect())
    }

    /// Check that the path survives a text round trip and is not too deep.
    pub fn validate(&self) -> Result<(), PathError> {
        validate_path(&self.segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(text)
    }
}

impl Deref for Path {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.segments
    }
}

impl AsRef<[String]> for Path {
    fn as_ref(&self) -> &[String] {
        &self.segments
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        segments.iter().copied().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for Path {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.segments.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for Path {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
