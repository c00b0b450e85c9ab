//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The table has not been created.
    #[error("table not found: {table}")]
    TableNotFound {
        /// The missing table.
        table: String,
    },

    /// The query named an index the table does not have.
    #[error("index {index} not found on table {table}")]
    IndexNotFound {
        /// The table queried.
        table: String,
        /// The missing index.
        index: String,
    },

    /// An insert collided with an existing primary key.
    #[error("duplicate primary key {id} in table {table}")]
    DuplicatePrimaryKey {
        /// The table written.
        table: String,
        /// The colliding id.
        id: String,
    },

    /// A row was rejected before it reached the table.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A changefeed consumer fell behind and events were dropped.
    #[error("changefeed lagged, {skipped} events skipped")]
    Lagged {
        /// Number of events that were never delivered.
        skipped: u64,
    },

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store or changefeed has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Create a table not found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Create an invalid row error.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow(message.into())
    }

    /// Returns true if repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Lagged { .. })
    }
}
