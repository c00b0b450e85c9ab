//! Error types for patch operations.

use thiserror::Error;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors that can occur while parsing pointers or applying patches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// A JSON pointer string is malformed.
    #[error("invalid pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// The offending pointer text.
        pointer: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The addressed location does not exist in the document.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The pointer that failed to resolve.
        path: String,
    },

    /// A token used to address an array element is not a valid index.
    #[error("invalid array index {token:?} in {path}")]
    InvalidIndex {
        /// The pointer containing the token.
        path: String,
        /// The offending token.
        token: String,
    },

    /// An array index lies outside the array.
    #[error("index {index} out of bounds for array of length {len} at {path}")]
    IndexOutOfBounds {
        /// The pointer containing the index.
        path: String,
        /// The requested index.
        index: usize,
        /// The array length at the time of the edit.
        len: usize,
    },

    /// A path walks through a scalar value.
    #[error("value at {path} is not an object or array")]
    NotAContainer {
        /// The pointer that hit a scalar.
        path: String,
    },

    /// Removing the whole document is not a patch edit.
    #[error("cannot remove the document root")]
    RemoveRoot,
}

impl PatchError {
    /// Create an invalid pointer error.
    pub fn invalid_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// Create a path not found error.
    pub fn path_not_found(path: impl ToString) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }

    /// Create an invalid index error.
    pub fn invalid_index(path: impl ToString, token: impl Into<String>) -> Self {
        Self::InvalidIndex {
            path: path.to_string(),
            token: token.into(),
        }
    }
}
