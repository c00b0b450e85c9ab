//! Client-side synced copies of documents.
//!
//! A [`Replica`] follows one document through its change stream and holds
//! the caller's unsent local edits. When a write comes back as a
//! conflict, [`Replica::rebase_onto`] catches the base up with the missed
//! operations and moves the pending edits on top, ready to resubmit at
//! the new version.

use std::collections::BTreeMap;

use revdb_patch::{apply, rebase, Patch};

use crate::change_stream::ChangeEvent;
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::operation::{Operation, OperationKind};

/// Whether an event changed a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event moved the replica forward.
    Yes,
    /// The replica already reflected the event.
    Stale,
}

/// A synced copy of one document plus pending local edits.
#[derive(Debug, Clone, PartialEq)]
pub struct Replica {
    id: String,
    base: Document,
    version: u64,
    pending: Patch,
    deleted: bool,
}

impl Replica {
    /// Starts from a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if `document` lacks an id or version.
    pub fn new(document: Document) -> CoreResult<Self> {
        let id = document.id().ok_or(CoreError::MissingId)?.to_string();
        let version = document.version().ok_or_else(|| {
            CoreError::invalid_document(format!("document {id} has no version"))
        })?;
        Ok(Self {
            id,
            base: document,
            version,
            pending: Patch::new(),
            deleted: false,
        })
    }

    /// Document id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version of the synced base.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The synced base, without pending edits.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.base
    }

    /// Returns true once a deletion has been applied.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Applies one event from a change stream.
    ///
    /// Events carrying a snapshot (query mode) replace the base whenever
    /// they are newer. Bare operations (document mode) must arrive in
    /// version order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VersionGap`] if an operation skips versions,
    /// [`CoreError::InvalidOperation`] if it targets another document, or
    /// a patch error if it does not apply to the base.
    pub fn apply(&mut self, event: &ChangeEvent) -> CoreResult<Applied> {
        let op = &event.operation;
        if op.docid != self.id {
            return Err(CoreError::invalid_operation(format!(
                "operation on {} applied to replica of {}",
                op.docid, self.id
            )));
        }

        if let Some(snapshot) = &event.snapshot {
            let version = snapshot.version().unwrap_or(0);
            if version <= self.version && !self.deleted {
                return Ok(Applied::Stale);
            }
            self.base = snapshot.clone();
            self.version = version;
            self.deleted = false;
            return Ok(Applied::Yes);
        }

        match &op.kind {
            OperationKind::Created => Ok(Applied::Stale),
            OperationKind::Deleted => {
                if op.version < self.version || self.deleted {
                    return Ok(Applied::Stale);
                }
                self.deleted = true;
                Ok(Applied::Yes)
            }
            OperationKind::Patched(_) => {
                if op.version < self.version {
                    return Ok(Applied::Stale);
                }
                self.apply_operation(op)?;
                Ok(Applied::Yes)
            }
        }
    }

    fn apply_operation(&mut self, op: &Operation) -> CoreResult<()> {
        if op.version != self.version {
            return Err(CoreError::VersionGap {
                id: self.id.clone(),
                expected: self.version,
                found: op.version,
            });
        }
        match &op.kind {
            OperationKind::Patched(patch) => {
                let mut next = Document::from_value(apply(patch, &self.base.to_value())?)?;
                next.set_version(op.version + 1);
                next.set_modified(op.when);
                self.base = next;
                self.version = op.version + 1;
            }
            OperationKind::Deleted => self.deleted = true,
            OperationKind::Created => {}
        }
        Ok(())
    }

    /// Stages a local edit on top of any pending ones.
    ///
    /// # Errors
    ///
    /// Returns a patch error if `patch` does not apply to [`view`](Self::view).
    pub fn stage(&mut self, patch: Patch) -> CoreResult<()> {
        apply(&patch, &self.view()?.into_value())?;
        self.pending.extend(patch);
        Ok(())
    }

    /// Local edits not yet acknowledged by the store.
    #[must_use]
    pub fn pending(&self) -> &Patch {
        &self.pending
    }

    /// Removes and returns the pending edits.
    pub fn take_pending(&mut self) -> Patch {
        std::mem::take(&mut self.pending)
    }

    /// The base with pending edits applied.
    ///
    /// # Errors
    ///
    /// Returns a patch error if the pending edits no longer apply.
    pub fn view(&self) -> CoreResult<Document> {
        Document::from_value(apply(&self.pending, &self.base.to_value())?)
    }

    /// Accepts the document returned by a successful write of the pending
    /// edits, clearing them.
    ///
    /// # Errors
    ///
    /// Returns an error if `document` is for another id or has no version.
    pub fn acknowledge(&mut self, document: Document) -> CoreResult<()> {
        let next = Replica::new(document)?;
        if next.id != self.id {
            return Err(CoreError::invalid_operation(format!(
                "document {} acknowledged on replica of {}",
                next.id, self.id
            )));
        }
        *self = next;
        Ok(())
    }

    /// Catches the base up with operations missed since [`version`](Self::version)
    /// and rebases the pending edits over them.
    ///
    /// Operations older than the base are skipped, so the `ops` of a
    /// [`Conflict`](crate::Conflict) can be passed as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the operations skip versions or do not apply.
    pub fn rebase_onto(&mut self, ops: &[Operation]) -> CoreResult<()> {
        let from = self.version;
        let mut missed = Vec::new();
        for op in ops.iter().filter(|op| op.version >= from) {
            if op.is_created() {
                continue;
            }
            self.apply_operation(op)?;
            if let Some(patch) = op.patch() {
                missed.push(patch.clone());
            }
        }
        self.pending = rebase(&missed, &self.pending);
        Ok(())
    }
}

/// Replicas for every document in a query-mode feed.
#[derive(Debug, Clone, Default)]
pub struct ReplicaSet {
    replicas: BTreeMap<String, Replica>,
}

impl ReplicaSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an initial result set.
    ///
    /// # Errors
    ///
    /// Returns an error if a document lacks an id or version.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> CoreResult<Self> {
        let replicas = documents
            .into_iter()
            .map(|doc| Replica::new(doc).map(|r| (r.id.clone(), r)))
            .collect::<CoreResult<_>>()?;
        Ok(Self { replicas })
    }

    /// Applies one event, adding or dropping replicas as documents enter
    /// and leave the view.
    ///
    /// # Errors
    ///
    /// See [`Replica::apply`].
    pub fn apply(&mut self, event: &ChangeEvent) -> CoreResult<Applied> {
        let docid = &event.operation.docid;
        if let Some(replica) = self.replicas.get_mut(docid) {
            let applied = replica.apply(event)?;
            if replica.is_deleted() {
                self.replicas.remove(docid);
            }
            return Ok(applied);
        }
        match &event.snapshot {
            Some(snapshot) if !event.operation.is_deleted() => {
                let replica = Replica::new(snapshot.clone())?;
                self.replicas.insert(docid.clone(), replica);
                Ok(Applied::Yes)
            }
            _ => Ok(Applied::Stale),
        }
    }

    /// The replica for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Replica> {
        self.replicas.get(id)
    }

    /// Number of documents in view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Returns true if no document is in view.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Ids in view, ascending.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.replicas.keys().map(String::as_str)
    }

    /// Synced documents in view, by ascending id.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.replicas.values().map(Replica::document)
    }
}
