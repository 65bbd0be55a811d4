//! Helpers for segments that address array elements.

/// Check if a segment is a canonical non-negative element index.
///
/// Canonical means ASCII digits only and no leading zero, so every index
/// has exactly one spelling.
///
/// # Example
///
/// ```
/// use dynamic_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("42"));
/// assert!(!is_valid_index("007"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index(""));
/// ```
pub fn is_valid_index(segment: &str) -> bool {
    match segment.as_bytes() {
        [b'0'] => true,
        [b'1'..=b'9', rest @ ..] => rest.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Parse a canonical element index, returning `None` for anything else
/// (including indices that overflow `usize`).
pub fn parse_index(segment: &str) -> Option<usize> {
    if !is_valid_index(segment) {
        return None;
    }
    segment.parse().ok()
}
