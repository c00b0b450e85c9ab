//! Append-only operation log.
//!
//! Every versioned table `T` has a companion table `T_ops` holding one
//! row per committed mutation. Versions restart at 1 when a deleted id is
//! created again, so each row also carries the `incarnation` it belongs to:
//! the `created` timestamp of the document it was written against. Rows
//! are keyed `"{docid}:{incarnation}:{version}"` and indexed by `docid` and
//! by `[docid, incarnation, version]`.

use chrono::{DateTime, Utc};
use revdb_store::{BoundKind, DocumentStore, IndexSpec, Key, Query, Row, TableSpec};
use serde_json::Value;
use tracing::debug;

use crate::change_stream::Subscription;
use crate::error::CoreResult;
use crate::operation::Operation;

/// Index on the document id.
pub const DOCID_INDEX: &str = "docid";

/// Compound index on `[docid, incarnation, version]`.
pub const DOCID_VERSION_INDEX: &str = "docid_incarnation_version";

const INCARNATION: &str = "incarnation";

/// The operation log of one versioned table.
#[derive(Debug, Clone)]
pub struct OperationLog<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> OperationLog<S> {
    pub(crate) fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// The table and indexes backing a log named `table`.
    #[must_use]
    pub fn table_spec(table: &str) -> TableSpec {
        TableSpec::new(table)
            .index(IndexSpec::field(DOCID_INDEX))
            .index(IndexSpec::compound(
                DOCID_VERSION_INDEX,
                ["docid", INCARNATION, "version"],
            ))
    }

    /// Name of the log table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Appends one record to the history of the document incarnation
    /// created at `incarnation`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the insert fails, including when a record
    /// for the same `(docid, incarnation, version)` already exists.
    pub async fn append(&self, op: &Operation, incarnation: &str) -> CoreResult<()> {
        let mut row = op.to_row()?;
        row.insert(
            "id".to_string(),
            Value::String(format!("{}:{incarnation}:{}", op.docid, op.version)),
        );
        row.insert(INCARNATION.to_string(), Value::String(incarnation.to_string()));
        self.store.insert(&self.table, row).await?;
        debug!(log = %self.table, docid = %op.docid, incarnation, version = op.version, "appended operation");
        Ok(())
    }

    /// All records for the latest incarnation of `docid`, ascending by
    /// version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn for_document(&self, docid: &str) -> CoreResult<Vec<Operation>> {
        self.since(docid, 0).await
    }

    /// Records for the latest incarnation of `docid` with
    /// `version >= from`, ascending by version.
    ///
    /// Records left behind by an earlier document with the same id are
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn since(&self, docid: &str, from: u64) -> CoreResult<Vec<Operation>> {
        match self.latest_incarnation(docid).await? {
            Some(incarnation) => self.since_in(docid, &incarnation, from).await,
            None => Ok(Vec::new()),
        }
    }

    /// Records for one incarnation of `docid` with `version >= from`,
    /// ascending by version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is malformed.
    pub async fn since_in(
        &self,
        docid: &str,
        incarnation: &str,
        from: u64,
    ) -> CoreResult<Vec<Operation>> {
        let query = Query::table(&self.table)
            .between(
                DOCID_VERSION_INDEX,
                Key::compound([Key::from(docid), Key::from(incarnation), Key::from(from)]),
                Key::compound([Key::from(docid), Key::from(incarnation), Key::MaxVal]),
            )
            .bounds(BoundKind::Closed, BoundKind::Closed);
        let mut ops = self
            .store
            .query(&query)
            .await?
            .into_iter()
            .map(Operation::from_row)
            .collect::<CoreResult<Vec<_>>>()?;
        ops.sort_by_key(|op| op.version);
        Ok(ops)
    }

    /// The most recently created incarnation of `docid` that has records.
    async fn latest_incarnation(&self, docid: &str) -> CoreResult<Option<String>> {
        let query = Query::table(&self.table).get_all(DOCID_INDEX, vec![Key::from(docid)]);
        let rows = self.store.query(&query).await?;
        Ok(rows
            .iter()
            .filter_map(incarnation_of)
            .max_by_key(|incarnation| {
                DateTime::parse_from_rfc3339(incarnation)
                    .ok()
                    .map(|at| at.with_timezone(&Utc))
            })
            .map(str::to_string))
    }

    /// Subscribes to records appended for `docid` from now on.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot open a changefeed.
    pub async fn watch(&self, docid: &str) -> CoreResult<Subscription> {
        let query = Query::table(&self.table).get_all(DOCID_INDEX, vec![Key::from(docid)]);
        let feed = self.store.changes(&query).await?;
        debug!(log = %self.table, docid, "watching operation log");
        Ok(Subscription::operations(feed, self.table.clone()))
    }
}

fn incarnation_of(row: &Row) -> Option<&str> {
    row.get(INCARNATION).and_then(Value::as_str)
}
