//! Operation records: one per committed mutation.

use chrono::{DateTime, Utc};
use revdb_patch::Patch;
use revdb_store::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// What a committed mutation did.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// The document was created.
    Created,
    /// The document was patched.
    Patched(Patch),
    /// The document was deleted.
    Deleted,
}

/// One committed mutation of one document.
///
/// `version` is the version the mutation was applied against: 0 for
/// creation, the pre-mutation version otherwise. On the wire exactly one
/// of `created: 1`, `patch: [...]` or `deleted: 1` is present:
///
/// ```json
/// {"docid": "w1", "version": 1, "when": "...", "user_id": null,
///  "patch": [{"op": "replace", "path": "/height", "value": 1.9}]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OperationRecord", into = "OperationRecord")]
pub struct Operation {
    /// Id of the mutated document.
    pub docid: String,
    /// Version the mutation was applied against.
    pub version: u64,
    /// Commit time.
    pub when: DateTime<Utc>,
    /// Who made the change, if known.
    pub user_id: Option<String>,
    /// What the mutation did.
    pub kind: OperationKind,
}

impl Operation {
    /// A creation record.
    pub fn created(docid: impl Into<String>, when: DateTime<Utc>, user_id: Option<&str>) -> Self {
        Self {
            docid: docid.into(),
            version: 0,
            when,
            user_id: user_id.map(str::to_string),
            kind: OperationKind::Created,
        }
    }

    /// A patch record.
    pub fn patched(
        docid: impl Into<String>,
        version: u64,
        when: DateTime<Utc>,
        user_id: Option<&str>,
        patch: Patch,
    ) -> Self {
        Self {
            docid: docid.into(),
            version,
            when,
            user_id: user_id.map(str::to_string),
            kind: OperationKind::Patched(patch),
        }
    }

    /// A deletion record.
    pub fn deleted(
        docid: impl Into<String>,
        version: u64,
        when: DateTime<Utc>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            docid: docid.into(),
            version,
            when,
            user_id: user_id.map(str::to_string),
            kind: OperationKind::Deleted,
        }
    }

    /// Returns the patch, for patch records.
    #[must_use]
    pub fn patch(&self) -> Option<&Patch> {
        match &self.kind {
            OperationKind::Patched(patch) => Some(patch),
            _ => None,
        }
    }

    /// Returns true for creation records.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self.kind, OperationKind::Created)
    }

    /// Returns true for deletion records.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.kind, OperationKind::Deleted)
    }

    /// Converts to an operation log row.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_row(&self) -> CoreResult<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(CoreError::invalid_operation("operation did not serialize to an object")),
        }
    }

    /// Reads an operation log row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is not a well-formed record.
    pub fn from_row(row: Row) -> CoreResult<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

#[derive(Serialize, Deserialize)]
struct OperationRecord {
    docid: String,
    version: u64,
    when: DateTime<Utc>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patch: Option<Patch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted: Option<u8>,
}

impl TryFrom<OperationRecord> for Operation {
    type Error = String;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        let kind = match (record.created, record.patch, record.deleted) {
            (Some(_), None, None) => OperationKind::Created,
            (None, Some(patch), None) => OperationKind::Patched(patch),
            (None, None, Some(_)) => OperationKind::Deleted,
            _ => {
                return Err(format!(
                    "operation on {} must carry exactly one of created, patch, deleted",
                    record.docid
                ))
            }
        };
        Ok(Self {
            docid: record.docid,
            version: record.version,
            when: record.when,
            user_id: record.user_id,
            kind,
        })
    }
}

impl From<Operation> for OperationRecord {
    fn from(op: Operation) -> Self {
        let (created, patch, deleted) = match op.kind {
            OperationKind::Created => (Some(1), None, None),
            OperationKind::Patched(patch) => (None, Some(patch), None),
            OperationKind::Deleted => (None, None, Some(1)),
        };
        Self {
            docid: op.docid,
            version: op.version,
            when: op.when,
            user_id: op.user_id,
            created,
            patch,
            deleted,
        }
    }
}
