//! Validation of paths and path strings.

use thiserror::Error;

use crate::SEPARATOR;

/// Maximum allowed path depth.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty segment at position {index}")]
    EmptySegment { index: usize },
    #[error("segment at position {index} contains the separator")]
    SeparatorInSegment { index: usize },
    #[error("path depth {depth} exceeds the maximum of {max}")]
    TooDeep { depth: usize, max: usize },
    #[error("the empty path has no parent")]
    NoParent,
}

/// Validate a list of path segments.
///
/// # Errors
///
/// Returns an error if:
/// - The path is deeper than [`MAX_DEPTH`]
/// - Any segment is empty
/// - Any segment contains `/`, which would not survive a text round trip
///
/// # Example
///
/// ```
/// use dynamic_path::validate_path;
///
/// validate_path(&["line".to_string(), "start".to_string()]).unwrap();
/// validate_path(&["a".to_string(), String::new()]).unwrap_err();
/// validate_path(&(0..300).map(|i| i.to_string()).collect::<Vec<_>>()).unwrap_err();
/// ```
pub fn validate_path(segments: &[String]) -> Result<(), PathError> {
    if segments.len() > MAX_DEPTH {
        return Err(PathError::TooDeep {
            depth: segments.len(),
            max: MAX_DEPTH,
        });
    }
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(PathError::EmptySegment { index });
        }
        if segment.contains(SEPARATOR) {
            return Err(PathError::SeparatorInSegment { index });
        }
    }
    Ok(())
}
