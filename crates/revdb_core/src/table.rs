//! Versioned tables: optimistic-concurrency CRUD over a document store.

use std::cmp::Ordering;

use chrono::Utc;
use revdb_patch::{apply, diff, Patch};
use revdb_store::{DocumentStore, VersionGuard};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::change_stream::Subscription;
use crate::conflict::{Conflict, ConflictResolver, WriteOutcome};
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::oplog::OperationLog;
use crate::operation::Operation;
use crate::query::FindOptions;
use crate::validate::Validator;

/// A table of versioned documents and its operation log.
///
/// Every mutation bumps the document's `version` by one and appends one
/// [`Operation`] to the log. Concurrent writers are arbitrated by the
/// store's guarded writes on `(id, version)`: exactly one wins each
/// transition and the others get a [`WriteOutcome::Conflict`]. Nothing is
/// cached and nothing is retried.
///
/// Obtain one from [`Database::register`](crate::Database::register).
///
/// # Example
///
/// ```rust,ignore
/// let monsters = db.register(TableSpec::new("monsters")).await?;
///
/// let doc = monsters.create(Document::new().with("name", "werewolf"), None).await?;
/// let id = doc.id().unwrap();
///
/// match monsters.patch(id, 1, patch, Some("alice"), None).await? {
///     WriteOutcome::Applied { document } => assert_eq!(document.version(), Some(2)),
///     WriteOutcome::Conflict(conflict) => { /* rebase onto conflict.ops and retry */ }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct VersionedTable<S> {
    store: S,
    name: String,
    hidden_index: String,
    log: OperationLog<S>,
}

impl<S: DocumentStore> VersionedTable<S> {
    pub(crate) fn new(store: S, name: String, hidden_index: String, log_table: String) -> Self {
        Self {
            log: OperationLog::new(store.clone(), log_table),
            store,
            name,
            hidden_index,
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table's operation log.
    #[must_use]
    pub fn log(&self) -> &OperationLog<S> {
        &self.log
    }

    /// A conflict resolver over this table's log.
    #[must_use]
    pub fn resolver(&self) -> ConflictResolver<S> {
        ConflictResolver::new(self.log.clone())
    }

    /// Creates a document at version 1.
    ///
    /// The store assigns an id if `doc` has none. Any `version`,
    /// `created` or `modified` in `doc` is overwritten.
    ///
    /// # Errors
    ///
    /// Returns a store error if the insert fails, or
    /// [`CoreError::PartialWrite`] if the document was stored but its
    /// creation was not logged.
    pub async fn create(&self, mut doc: Document, user_id: Option<&str>) -> CoreResult<Document> {
        let now = Utc::now();
        doc.set_version(1);
        doc.set_created(now);
        doc.set_modified(now);

        let stored = Document::from(self.store.insert(&self.name, doc.into_row()).await?);
        let id = stored.id().ok_or(CoreError::MissingId)?.to_string();
        debug!(table = %self.name, id = %id, "created document");

        let incarnation = incarnation(&stored);
        self.record(Operation::created(id, now, user_id), stored, &incarnation)
            .await
    }

    /// Writes a full snapshot, patching from the currently stored version.
    ///
    /// The patch is the diff between the stored document and `doc`, so
    /// only business fields change. The stored version is used as the
    /// expected version; a writer that slips in between the read and the
    /// write still produces a conflict.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingId`] if `doc` has no id,
    /// [`CoreError::NotFound`] if it does not exist, or any error
    /// [`patch`](Self::patch) can return.
    pub async fn update(&self, doc: Document, user_id: Option<&str>) -> CoreResult<WriteOutcome> {
        let id = doc.id().ok_or(CoreError::MissingId)?;
        let current = self.fetch(id).await?;
        let expected = stored_version(&current)?;
        let patch = diff(&current.to_value(), &doc.to_value());
        self.patch_current(current, expected, &patch, user_id, None).await
    }

    /// Applies `patch` if the document is still at `expected`.
    ///
    /// - Same version: the patch is applied, `validator` runs on the result,
    ///   and the document is written at `expected + 1` with a guarded
    ///   replace. Losing the race at this point yields a conflict.
    /// - Older version: returns the operations the caller missed.
    /// - Newer version: [`CoreError::InvalidVersion`].
    ///
    /// Edits to top-level auto fields are dropped from `patch` before it is
    /// applied and logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist, the patch does not
    /// apply, validation fails, the store fails, or the log append fails
    /// after the write ([`CoreError::PartialWrite`]).
    pub async fn patch(
        &self,
        id: &str,
        expected: u64,
        patch: Patch,
        user_id: Option<&str>,
        validator: Option<&dyn Validator>,
    ) -> CoreResult<WriteOutcome> {
        let current = self.fetch(id).await?;
        self.patch_current(current, expected, &patch, user_id, validator)
            .await
    }

    async fn patch_current(
        &self,
        current: Document,
        expected: u64,
        patch: &Patch,
        user_id: Option<&str>,
        validator: Option<&dyn Validator>,
    ) -> CoreResult<WriteOutcome> {
        let id = current.id().ok_or(CoreError::MissingId)?.to_string();
        let current_version = stored_version(&current)?;

        match expected.cmp(&current_version) {
            Ordering::Less => {
                debug!(table = %self.name, id = %id, expected, current = current_version, "stale patch");
                return self.conflict(&id, expected).await;
            }
            Ordering::Greater => {
                return Err(CoreError::InvalidVersion {
                    id,
                    expected,
                    current: current_version,
                });
            }
            Ordering::Equal => {}
        }

        let patch = patch.without_auto_fields();
        let now = Utc::now();
        let mut next = Document::from_value(apply(&patch, &current.to_value())?)?;
        next.set_id(&id);
        match current.get("created") {
            Some(created) => {
                next.insert("created", created.clone());
            }
            None => {
                next.remove("created");
            }
        }
        next.set_version(expected + 1);
        next.set_modified(now);

        if let Some(validator) = validator {
            validator.validate(&next).map_err(CoreError::Validation)?;
        }

        let guard = VersionGuard::new(id.as_str(), expected);
        let result = self
            .store
            .replace_where(&self.name, &guard, next.clone().into_row())
            .await?;
        if result.is_rejected() {
            warn!(table = %self.name, id = %id, version = expected, "lost write race");
            return self.conflict(&id, expected).await;
        }
        debug!(table = %self.name, id = %id, version = expected + 1, "patched document");

        let incarnation = incarnation(&current);
        let op = Operation::patched(id, expected, now, user_id, patch);
        let document = self.record(op, next, &incarnation).await?;
        Ok(WriteOutcome::Applied { document })
    }

    /// Deletes the document if it is still at `expected`.
    ///
    /// Returns the deleted snapshot, or a conflict if no row matched
    /// `(id, expected)`.
    ///
    /// # Errors
    ///
    /// Returns a store error, or [`CoreError::PartialWrite`] if the row was
    /// deleted but the deletion was not logged.
    pub async fn delete(
        &self,
        id: &str,
        expected: u64,
        user_id: Option<&str>,
    ) -> CoreResult<WriteOutcome> {
        let guard = VersionGuard::new(id, expected);
        let result = self.store.delete_where(&self.name, &guard).await?;
        let Some(old) = result.changes.into_iter().find_map(|change| change.old_val) else {
            debug!(table = %self.name, id, version = expected, "delete rejected");
            return self.conflict(id, expected).await;
        };
        debug!(table = %self.name, id, version = expected, "deleted document");

        let old = Document::from(old);
        let incarnation = incarnation(&old);
        let op = Operation::deleted(id, expected, Utc::now(), user_id);
        let document = self.record(op, old, &incarnation).await?;
        Ok(WriteOutcome::Applied { document })
    }

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn get(&self, id: &str) -> CoreResult<Option<Document>> {
        Ok(self.store.get(&self.name, id).await?.map(Document::from))
    }

    /// Runs a query built from `options`.
    ///
    /// # Errors
    ///
    /// Returns a store error, e.g. for an unknown index.
    pub async fn find(&self, options: &FindOptions) -> CoreResult<Vec<Document>> {
        let rows = self.store.query(&options.to_query(&self.name)).await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    /// Lists secondary indexes, excluding the hidden `(id, version)` index.
    ///
    /// # Errors
    ///
    /// Returns a store error if the table cannot be inspected.
    pub async fn indexes(&self) -> CoreResult<Vec<String>> {
        let mut names = self.store.index_list(&self.name).await?;
        names.retain(|name| *name != self.hidden_index);
        Ok(names)
    }

    /// Subscribes to the operation log of one document.
    ///
    /// # Errors
    ///
    /// Returns a store error if the feed cannot be opened.
    pub async fn watch_document(&self, id: &str) -> CoreResult<Subscription> {
        self.log.watch(id).await
    }

    /// Subscribes to documents entering, changing in and leaving the view
    /// selected by `options`. Ordering, limit and skip are ignored.
    ///
    /// # Errors
    ///
    /// Returns a store error if the feed cannot be opened.
    pub async fn watch(&self, options: &FindOptions) -> CoreResult<Subscription> {
        let feed = self.store.changes(&options.to_query(&self.name)).await?;
        debug!(table = %self.name, "watching view");
        Ok(Subscription::view(feed, self.name.clone()))
    }

    async fn fetch(&self, id: &str) -> CoreResult<Document> {
        self.get(id).await?.ok_or_else(|| CoreError::not_found(id))
    }

    async fn conflict(&self, id: &str, expected: u64) -> CoreResult<WriteOutcome> {
        let conflict: Conflict = self.resolver().conflict(id, expected).await?;
        Ok(WriteOutcome::Conflict(conflict))
    }

    /// Appends `op` for a write that already committed.
    async fn record(
        &self,
        op: Operation,
        document: Document,
        incarnation: &str,
    ) -> CoreResult<Document> {
        match self.log.append(&op, incarnation).await {
            Ok(()) => Ok(document),
            Err(source) => {
                error!(
                    table = %self.name,
                    id = %op.docid,
                    version = op.version,
                    error = %source,
                    "document written but operation log append failed"
                );
                Err(CoreError::PartialWrite {
                    document: Box::new(document),
                    source: Box::new(source),
                })
            }
        }
    }
}

/// Log scope of a stored document: its `created` timestamp.
fn incarnation(document: &Document) -> String {
    document
        .get("created")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn stored_version(document: &Document) -> CoreResult<u64> {
    document.version().ok_or_else(|| {
        CoreError::invalid_document(format!(
            "stored document {} has no version",
            document.id().unwrap_or("?")
        ))
    })
}
