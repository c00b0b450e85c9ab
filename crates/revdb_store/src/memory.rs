//! In-memory document store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{DocumentStore, WriteResult};
use crate::changefeed::{changefeed, Changefeed, RawChange};
use crate::config::MemoryStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::query::{IndexSpec, Query, Row, Selection, TableSpec, VersionGuard, PRIMARY_INDEX};

/// An in-memory [`DocumentStore`].
///
/// This store keeps every table in process memory and is suitable for:
/// - Unit and integration tests
/// - Embedding revdb without an external database
///
/// # Thread Safety
///
/// Cloning is cheap and every clone shares the same tables. Each write
/// checks its guard, mutates the table and publishes the change while
/// holding the table lock, so changefeeds observe writes to a row in commit
/// order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    config: MemoryStoreConfig,
    tables: RwLock<HashMap<String, MemoryTable>>,
}

#[derive(Debug)]
struct MemoryTable {
    rows: BTreeMap<String, Row>,
    indexes: Vec<IndexSpec>,
    events: broadcast::Sender<RawChange>,
    fail_next_write: Option<String>,
}

impl MemoryTable {
    fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            rows: BTreeMap::new(),
            indexes: Vec::new(),
            events,
            fail_next_write: None,
        }
    }

    fn index(&self, table: &str, name: &str) -> StoreResult<IndexSpec> {
        if name == PRIMARY_INDEX {
            return Ok(IndexSpec::field(PRIMARY_INDEX));
        }
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .cloned()
            .ok_or_else(|| StoreError::IndexNotFound {
                table: table.to_string(),
                index: name.to_string(),
            })
    }

    fn take_failure(&mut self) -> StoreResult<()> {
        match self.fail_next_write.take() {
            Some(reason) => Err(StoreError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    fn publish(&self, change: RawChange) {
        // No subscribers is not an error.
        let _ = self.events.send(change);
    }

    fn run(&self, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        let mut rows: Vec<Row> = match query.selection.index() {
            None => self.rows.values().cloned().collect(),
            Some(index) => {
                let spec = self.index(table, index)?;
                let mut keyed: Vec<(Key, &Row)> = self
                    .rows
                    .values()
                    .filter_map(|row| {
                        let key = spec.key_for(row)?;
                        query
                            .selection
                            .matches_key(Some(&key))
                            .then_some((key, row))
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                keyed.into_iter().map(|(_, row)| row.clone()).collect()
            }
        };

        if let Some(order) = &query.order_by {
            let spec = self
                .index(table, order)
                .unwrap_or_else(|_| IndexSpec::field(order.clone()));
            rows.sort_by_cached_key(|row| spec.key_for(row).unwrap_or(Key::MinVal));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(skip) = query.skip {
            rows.drain(..skip.min(rows.len()));
        }
        Ok(rows)
    }
}

impl MemoryStore {
    /// Creates an empty store with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tables: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Makes the next write to `table` fail with [`StoreError::Unavailable`].
    ///
    /// Useful for exercising partial-failure paths in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn fail_next_write(&self, table: &str, reason: impl Into<String>) -> StoreResult<()> {
        let reason = reason.into();
        self.write(table, |t| {
            t.fail_next_write = Some(reason);
            Ok(())
        })
    }

    /// Returns the number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn row_count(&self, table: &str) -> StoreResult<usize> {
        self.read(table, |t| Ok(t.rows.len()))
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&MemoryTable) -> StoreResult<T>) -> StoreResult<T> {
        let tables = self.inner.tables.read();
        let found = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        f(found)
    }

    fn write<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut tables = self.inner.tables.write();
        let found = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        f(found)
    }
}

fn filter_change(selection: &Selection, spec: Option<&IndexSpec>, change: RawChange) -> Option<RawChange> {
    let inside = |row: &Row| selection.matches_key(spec.and_then(|s| s.key_for(row)).as_ref());
    let old_val = change.old_val.filter(|row| inside(row));
    let new_val = change.new_val.filter(|row| inside(row));
    (old_val.is_some() || new_val.is_some()).then_some(RawChange { old_val, new_val })
}

impl DocumentStore for MemoryStore {
    async fn create_table(&self, spec: &TableSpec) -> StoreResult<()> {
        let capacity = self.inner.config.broadcast_capacity;
        let mut tables = self.inner.tables.write();
        let table = tables.entry(spec.name.clone()).or_insert_with(|| {
            debug!(table = %spec.name, "created table");
            MemoryTable::new(capacity)
        });
        for index in &spec.indexes {
            if !table.indexes.iter().any(|existing| existing.name == index.name) {
                debug!(table = %spec.name, index = %index.name, "created index");
                table.indexes.push(index.clone());
            }
        }
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.inner.tables.read().contains_key(table))
    }

    async fn index_list(&self, table: &str) -> StoreResult<Vec<String>> {
        self.read(table, |t| {
            Ok(t.indexes.iter().map(|index| index.name.clone()).collect())
        })
    }

    async fn get(&self, table: &str, id: &str) -> StoreResult<Option<Row>> {
        self.read(table, |t| Ok(t.rows.get(id).cloned()))
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<Row> {
        let id = match row.get("id") {
            None | Some(Value::Null) => {
                let id = Uuid::new_v4().to_string();
                row.insert("id".to_string(), Value::String(id.clone()));
                id
            }
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(StoreError::invalid_row(format!("id must be a string, got {other}")));
            }
        };

        self.write(table, |t| {
            t.take_failure()?;
            if t.rows.contains_key(&id) {
                return Err(StoreError::DuplicatePrimaryKey {
                    table: table.to_string(),
                    id,
                });
            }
            t.rows.insert(id, row.clone());
            t.publish(RawChange {
                old_val: None,
                new_val: Some(row.clone()),
            });
            Ok(row)
        })
    }

    async fn replace_where(
        &self,
        table: &str,
        guard: &VersionGuard,
        row: Row,
    ) -> StoreResult<WriteResult> {
        if row.get("id").and_then(Value::as_str) != Some(guard.id.as_str()) {
            return Err(StoreError::invalid_row("replacement id does not match guard"));
        }
        self.write(table, |t| {
            t.take_failure()?;
            let Some(current) = t.rows.get_mut(&guard.id) else {
                return Ok(WriteResult::default());
            };
            if !guard.admits(current) {
                return Ok(WriteResult::default());
            }
            let old = std::mem::replace(current, row.clone());
            let change = RawChange {
                old_val: Some(old),
                new_val: Some(row),
            };
            t.publish(change.clone());
            Ok(WriteResult {
                affected: 1,
                changes: vec![change],
            })
        })
    }

    async fn delete_where(&self, table: &str, guard: &VersionGuard) -> StoreResult<WriteResult> {
        self.write(table, |t| {
            t.take_failure()?;
            if !t.rows.get(&guard.id).is_some_and(|row| guard.admits(row)) {
                return Ok(WriteResult::default());
            }
            let old = t.rows.remove(&guard.id);
            let change = RawChange {
                old_val: old,
                new_val: None,
            };
            t.publish(change.clone());
            Ok(WriteResult {
                affected: 1,
                changes: vec![change],
            })
        })
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.read(&query.table, |t| t.run(&query.table, query))
    }

    async fn changes(&self, query: &Query) -> StoreResult<Changefeed> {
        let (spec, mut events) = self.read(&query.table, |t| {
            let spec = match query.selection.index() {
                Some(index) => Some(t.index(&query.table, index)?),
                None => None,
            };
            Ok((spec, t.events.subscribe()))
        })?;

        let (sink, feed) = changefeed(self.inner.config.changefeed_buffer);
        let selection = query.selection.clone();
        let table = query.table.clone();
        tokio::spawn(async move {
            debug!(table = %table, "changefeed opened");
            loop {
                let event = tokio::select! {
                    () = sink.cancelled() => break,
                    event = events.recv() => event,
                };
                let item = match event {
                    Ok(change) => match filter_change(&selection, spec.as_ref(), change) {
                        Some(change) => Ok(change),
                        None => continue,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(table = %table, skipped, "changefeed lagged");
                        Err(StoreError::Lagged { skipped })
                    }
                    Err(RecvError::Closed) => break,
                };
                if !sink.send(item).await {
                    break;
                }
            }
            debug!(table = %table, "changefeed closed");
        });
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::BoundKind;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    async fn monsters() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_table(
                &TableSpec::new("monsters")
                    .index(IndexSpec::field("height"))
                    .index(IndexSpec::field("scariness")),
            )
            .await
            .unwrap();
        for (name, height, scariness) in [
            ("tiny bat", 0.083, 0.01),
            ("large bat", 0.3, 0.1),
            ("minotaur", 1.6, 6.0),
            ("kishi", 1.6, 7.0),
            ("kraken", 14.0, 82.9),
            ("werekraken", 14.0, 1000.002),
            ("werewolf", 1.2, 7.3256),
        ] {
            store
                .insert(
                    "monsters",
                    row(json!({"id": name, "name": name, "height": height, "scariness": scariness, "version": 1})),
                )
                .await
                .unwrap();
        }
        store
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r["name"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn insert_assigns_id() {
        let store = MemoryStore::new();
        store.create_table(&TableSpec::new("t")).await.unwrap();
        let stored = store.insert("t", row(json!({"name": "x"}))).await.unwrap();
        let id = stored["id"].as_str().unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(store.get("t", id).await.unwrap(), Some(stored.clone()));
    }

    #[tokio::test]
    async fn insert_rejects_duplicates_and_bad_ids() {
        let store = monsters().await;
        let err = store
            .insert("monsters", row(json!({"id": "kraken"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePrimaryKey { .. }));

        let err = store.insert("monsters", row(json!({"id": 7}))).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow(_)));
    }

    #[tokio::test]
    async fn unknown_table() {
        let store = MemoryStore::new();
        assert!(!store.table_exists("nope").await.unwrap());
        assert_eq!(
            store.get("nope", "x").await.unwrap_err(),
            StoreError::table_not_found("nope")
        );
    }

    #[tokio::test]
    async fn create_table_is_idempotent() {
        let store = monsters().await;
        store
            .create_table(&TableSpec::new("monsters").index(IndexSpec::field("height")))
            .await
            .unwrap();
        assert_eq!(store.index_list("monsters").await.unwrap(), ["height", "scariness"]);
        assert_eq!(store.row_count("monsters").unwrap(), 7);
    }

    #[tokio::test]
    async fn guarded_replace() {
        let store = monsters().await;
        let guard = VersionGuard::new("werewolf", 1);
        let next = row(json!({"id": "werewolf", "name": "werewolf", "height": 1.9, "version": 2}));

        let result = store.replace_where("monsters", &guard, next.clone()).await.unwrap();
        assert_eq!(result.affected, 1);
        assert_eq!(result.changes[0].new_val, Some(next.clone()));
        assert_eq!(result.changes[0].old_val.as_ref().unwrap()["height"], json!(1.2));

        // Same guard again loses: the version has moved on.
        let result = store.replace_where("monsters", &guard, next).await.unwrap();
        assert!(result.is_rejected());
    }

    #[tokio::test]
    async fn replace_rejects_mismatched_id() {
        let store = monsters().await;
        let err = store
            .replace_where("monsters", &VersionGuard::new("kraken", 1), row(json!({"id": "other"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow(_)));
    }

    #[tokio::test]
    async fn guarded_delete() {
        let store = monsters().await;
        let stale = store
            .delete_where("monsters", &VersionGuard::new("kraken", 5))
            .await
            .unwrap();
        assert!(stale.is_rejected());

        let done = store
            .delete_where("monsters", &VersionGuard::new("kraken", 1))
            .await
            .unwrap();
        assert_eq!(done.affected, 1);
        assert!(store.get("monsters", "kraken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn equality_lookup() {
        let store = monsters().await;
        let rows = store
            .query(&Query::table("monsters").get_all("height", vec![Key::from(14u64)]))
            .await
            .unwrap();
        assert_eq!(names(&rows), ["kraken", "werekraken"]);
    }

    #[tokio::test]
    async fn range_lookup_sorted_by_index() {
        let store = monsters().await;
        let rows = store
            .query(&Query::table("monsters").between("scariness", Key::from(4u64), Key::from(20u64)))
            .await
            .unwrap();
        assert_eq!(names(&rows), ["minotaur", "kishi", "werewolf"]);

        let rows = store
            .query(
                &Query::table("monsters")
                    .between("height", Key::from(1.2), Key::from(1.6))
                    .bounds(BoundKind::Open, BoundKind::Closed),
            )
            .await
            .unwrap();
        assert_eq!(names(&rows), ["kishi", "minotaur"]);
    }

    #[tokio::test]
    async fn order_limit_skip() {
        let store = monsters().await;
        let rows = store
            .query(&Query::table("monsters").order_by("scariness").limit(4).skip(1))
            .await
            .unwrap();
        assert_eq!(names(&rows), ["large bat", "minotaur", "kishi"]);
    }

    #[tokio::test]
    async fn unknown_index() {
        let store = monsters().await;
        let err = store
            .query(&Query::table("monsters").get_all("colour", vec![Key::from("red")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn changefeed_reports_rows_entering_and_leaving() {
        let store = monsters().await;
        let mut feed = store
            .changes(&Query::table("monsters").between("height", Key::from(14u64), Key::from(20u64)))
            .await
            .unwrap();

        store
            .insert("monsters", row(json!({"id": "impalerbot", "height": 17, "version": 1})))
            .await
            .unwrap();
        // Outside the range: never delivered.
        store
            .insert("monsters", row(json!({"id": "gnome", "height": 0.5, "version": 1})))
            .await
            .unwrap();
        store
            .replace_where(
                "monsters",
                &VersionGuard::new("impalerbot", 1),
                row(json!({"id": "impalerbot", "height": 1, "version": 2})),
            )
            .await
            .unwrap();

        let entered = feed.next().await.unwrap().unwrap();
        assert!(entered.old_val.is_none());
        assert_eq!(entered.new_val.unwrap()["id"], json!("impalerbot"));

        let left = feed.next().await.unwrap().unwrap();
        assert_eq!(left.old_val.unwrap()["height"], json!(17));
        assert!(left.new_val.is_none());

        assert!(feed.close());
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_feed_reports_error_and_continues() {
        let store = MemoryStore::with_config(MemoryStoreConfig::new().broadcast_capacity(1));
        store.create_table(&TableSpec::new("t")).await.unwrap();
        let mut feed = store.changes(&Query::table("t")).await.unwrap();

        for n in 0..5 {
            store.insert("t", row(json!({"id": n.to_string()}))).await.unwrap();
        }

        let first = feed.next().await.unwrap();
        assert!(matches!(first, Err(StoreError::Lagged { skipped }) if skipped > 0));
        let next = feed.next().await.unwrap().unwrap();
        assert_eq!(next.new_val.unwrap()["id"], json!("4"));
    }

    #[tokio::test]
    async fn injected_failure_hits_next_write_only() {
        let store = monsters().await;
        store.fail_next_write("monsters", "disk on fire").unwrap();
        let err = store.insert("monsters", row(json!({"id": "x"}))).await.unwrap_err();
        assert_eq!(err, StoreError::Unavailable("disk on fire".into()));
        store.insert("monsters", row(json!({"id": "x"}))).await.unwrap();
    }
}
