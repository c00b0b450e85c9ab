//! Conflict results and the resolver that builds them.

use revdb_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::CoreResult;
use crate::oplog::OperationLog;
use crate::operation::Operation;

/// The operations a stale writer missed.
///
/// Serialized as `{"conflict": true, "ops": [...]}`. `ops` is ascending by
/// version and starts at the caller's stale version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConflictRecord", into = "ConflictRecord")]
pub struct Conflict {
    /// Missed operations, oldest first.
    pub ops: Vec<Operation>,
}

impl Conflict {
    /// Version the document reached after the last missed operation, if
    /// any operation is known.
    #[must_use]
    pub fn current_version(&self) -> Option<u64> {
        self.ops.last().map(|op| op.version + 1)
    }
}

#[derive(Serialize, Deserialize)]
struct ConflictRecord {
    conflict: bool,
    ops: Vec<Operation>,
}

impl TryFrom<ConflictRecord> for Conflict {
    type Error = &'static str;

    fn try_from(record: ConflictRecord) -> Result<Self, Self::Error> {
        if record.conflict {
            Ok(Self { ops: record.ops })
        } else {
            Err("conflict flag must be true")
        }
    }
}

impl From<Conflict> for ConflictRecord {
    fn from(conflict: Conflict) -> Self {
        Self {
            conflict: true,
            ops: conflict.ops,
        }
    }
}

/// Result of a guarded write.
///
/// Serialized as `{"document": {...}}` or `{"conflict": true, "ops": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteOutcome {
    /// The write committed.
    Applied {
        /// The document as written (for deletes, as it was before).
        document: Document,
    },
    /// The caller's version was stale.
    Conflict(Conflict),
}

impl WriteOutcome {
    /// Returns true if the write lost a race.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// The written document, if the write committed.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Applied { document } => Some(document),
            Self::Conflict(_) => None,
        }
    }

    /// Consumes the outcome, returning the written document.
    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Applied { document } => Some(document),
            Self::Conflict(_) => None,
        }
    }

    /// The conflict, if the write lost a race.
    #[must_use]
    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Applied { .. } => None,
            Self::Conflict(conflict) => Some(conflict),
        }
    }
}

/// Looks up the operations a stale writer missed.
#[derive(Debug, Clone)]
pub struct ConflictResolver<S> {
    log: OperationLog<S>,
}

impl<S: DocumentStore> ConflictResolver<S> {
    /// Creates a resolver over `log`.
    pub fn new(log: OperationLog<S>) -> Self {
        Self { log }
    }

    /// Returns every logged operation on `id` with `version >= version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub async fn conflict(&self, id: &str, version: u64) -> CoreResult<Conflict> {
        let ops = self.log.since(id, version).await?;
        Ok(Conflict { ops })
    }
}
