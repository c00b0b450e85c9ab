//! Error types for revdb core.

use thiserror::Error;

use crate::document::Document;
use crate::validate::ValidationErrors;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in revdb core operations.
///
/// A lost concurrency race is not an error: writes report it as
/// [`WriteOutcome::Conflict`](crate::WriteOutcome::Conflict).
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document failed validation. Never retried.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The caller asserted a version the document has not reached.
    #[error("invalid version for {id}: expected {expected}, current is {current}")]
    InvalidVersion {
        /// Document id.
        id: String,
        /// Version the caller asserted.
        expected: u64,
        /// Version in the store.
        current: u64,
    },

    /// No document with this id exists.
    #[error("document not found: {id}")]
    NotFound {
        /// The id looked up.
        id: String,
    },

    /// The operation needs a document id and none was given.
    #[error("document has no id")]
    MissingId,

    /// A value is not a well-formed document.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// What is wrong with it.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },

    /// A replica received an operation that skips versions.
    #[error("version gap on {id}: replica at {expected}, operation at {found}")]
    VersionGap {
        /// Document id.
        id: String,
        /// Version the replica holds.
        expected: u64,
        /// Version the operation was applied against.
        found: u64,
    },

    /// The document was written but its operation log entry was not.
    ///
    /// The store holds `document`; its history is one entry short.
    #[error("document {} written but operation log append failed: {source}", .document.id().unwrap_or("?"))]
    PartialWrite {
        /// The committed document.
        document: Box<Document>,
        /// Why the append failed.
        #[source]
        source: Box<CoreError>,
    },

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] revdb_store::StoreError),

    /// A patch could not be applied.
    #[error("patch error: {0}")]
    Patch(#[from] revdb_patch::PatchError),

    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Returns true if the caller's input caused the error.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidVersion { .. }
                | Self::NotFound { .. }
                | Self::MissingId
                | Self::InvalidDocument { .. }
                | Self::Patch(_)
        )
    }
}
