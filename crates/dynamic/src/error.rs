//! Errors for child and path operations.

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChildError {
    #[error("no child named `{0}`")]
    NotFound(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("`{0}` is not a valid element index")]
    InvalidIndex(String),
    #[error("record fields cannot be removed")]
    FixedShape,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no child `{segment}` at depth {depth}")]
    NotFound { segment: String, depth: usize },
    #[error("cannot descend into `{segment}` at depth {depth}: parent is not structured")]
    NotStructured { segment: String, depth: usize },
    #[error("the empty path does not name a child")]
    EmptyPath,
    #[error(transparent)]
    Child(#[from] ChildError),
}

/// Assign `value` into `target` if both have the same type.
pub(crate) fn assign_checked(target: &mut dyn Value, value: &dyn Value) -> Result<(), ChildError> {
    let expected = target.type_identity();
    let found = value.type_identity();
    if expected != found || !target.assign(value) {
        return Err(ChildError::TypeMismatch {
            expected: expected.name(),
            found: found.name(),
        });
    }
    Ok(())
}
