//! The document store interface.

use std::future::Future;

use crate::changefeed::{Changefeed, RawChange};
use crate::error::StoreResult;
use crate::query::{Query, Row, TableSpec, VersionGuard};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResult {
    /// Number of rows written (0 or 1 for the guarded writes revdb issues).
    pub affected: usize,
    /// Old and new snapshots of every row written.
    pub changes: Vec<RawChange>,
}

impl WriteResult {
    /// Returns true if no row matched the guard.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.affected == 0
    }
}

/// A persistent JSON document store with indexed queries and changefeeds.
///
/// revdb owns no durability of its own; everything it knows lives behind
/// this trait. Implementations must provide:
///
/// - Atomic conditional writes: `replace_where` and `delete_where` compare
///   the guard and write in one step, so at most one caller wins a given
///   `(id, version)` transition.
/// - Changefeeds that deliver changes to any single row in commit order.
///
/// # Implementors
///
/// - [`super::MemoryStore`] - In-process reference store
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Creates a table and any of its indexes that do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot create the table.
    fn create_table(&self, spec: &TableSpec) -> impl Future<Output = StoreResult<()>> + Send;

    /// Returns true if the table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn table_exists(&self, table: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Lists the table's secondary index names, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotFound`](crate::StoreError::TableNotFound)
    /// for an unknown table.
    fn index_list(&self, table: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Reads one row by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the read fails.
    fn get(&self, table: &str, id: &str) -> impl Future<Output = StoreResult<Option<Row>>> + Send;

    /// Inserts a row, assigning an `id` if it has none, and returns the
    /// stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The table does not exist
    /// - A row with the same `id` exists
    /// - The `id` is not a string
    fn insert(&self, table: &str, row: Row) -> impl Future<Output = StoreResult<Row>> + Send;

    /// Replaces the row matching `guard` with `row`.
    ///
    /// A row that does not satisfy the guard is left untouched and the
    /// result reports zero rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the write fails.
    fn replace_where(
        &self,
        table: &str,
        guard: &VersionGuard,
        row: Row,
    ) -> impl Future<Output = StoreResult<WriteResult>> + Send;

    /// Deletes the row matching `guard`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the write fails.
    fn delete_where(
        &self,
        table: &str,
        guard: &VersionGuard,
    ) -> impl Future<Output = StoreResult<WriteResult>> + Send;

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the table or index does not exist.
    fn query(&self, query: &Query) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;

    /// Subscribes to changes of rows selected by `query`.
    ///
    /// The feed is live once this returns: every write committed afterwards
    /// is delivered. Each event carries the side(s) of the change that fall
    /// inside the selection, so a row leaving the view arrives as old-only
    /// and a row entering it as new-only. `order_by`, `limit` and `skip`
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the table or index does not exist.
    fn changes(&self, query: &Query) -> impl Future<Output = StoreResult<Changefeed>> + Send;
}
