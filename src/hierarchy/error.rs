use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Errors raised while validating or persisting a nested tree
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Invalid node at {path}: {message}")]
    InvalidNode { path: String, message: String },

    #[error("Tree depth exceeds maximum of {max} at {path}")]
    DepthExceeded { path: String, max: usize },

    #[error("Tree exceeds maximum of {max} nodes")]
    TooManyNodes { max: usize },

    #[error("Tree creation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}
