//! Patch operations and patches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::is_auto_field;
use crate::pointer::Pointer;

/// A single structural edit, serialized in RFC 6902 shape.
///
/// ```json
/// {"op": "replace", "path": "/height", "value": 14}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert into an object (overwriting) or an array (shifting).
    Add {
        /// Target location.
        path: Pointer,
        /// Value to insert.
        value: Value,
    },
    /// Remove an existing value.
    Remove {
        /// Target location.
        path: Pointer,
    },
    /// Overwrite an existing value.
    Replace {
        /// Target location.
        path: Pointer,
        /// Replacement value.
        value: Value,
    },
}

impl PatchOp {
    /// Creates an `add` edit.
    pub fn add(path: Pointer, value: impl Into<Value>) -> Self {
        Self::Add {
            path,
            value: value.into(),
        }
    }

    /// Creates a `remove` edit.
    #[must_use]
    pub fn remove(path: Pointer) -> Self {
        Self::Remove { path }
    }

    /// Creates a `replace` edit.
    pub fn replace(path: Pointer, value: impl Into<Value>) -> Self {
        Self::Replace {
            path,
            value: value.into(),
        }
    }

    /// Returns the location this edit addresses.
    #[must_use]
    pub fn path(&self) -> &Pointer {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    pub(crate) fn path_mut(&mut self) -> &mut Pointer {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    /// Returns the operation name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
        }
    }
}

/// An ordered sequence of [`PatchOp`]s.
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOp>);

impl Patch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edit.
    pub fn push(&mut self, op: PatchOp) {
        self.0.push(op);
    }

    /// Returns true if the patch has no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the edits in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PatchOp> {
        self.0.iter()
    }

    /// Returns the edits as a slice.
    #[must_use]
    pub fn ops(&self) -> &[PatchOp] {
        &self.0
    }

    /// Consumes the patch, returning its edits.
    #[must_use]
    pub fn into_ops(self) -> Vec<PatchOp> {
        self.0
    }

    /// Returns this patch without edits to top-level engine-managed fields.
    #[must_use]
    pub fn without_auto_fields(&self) -> Self {
        self.0
            .iter()
            .filter(|op| !op.path().tokens().first().is_some_and(|field| is_auto_field(field)))
            .cloned()
            .collect()
    }

    /// Returns the distinct paths touched by this patch, in first-seen order.
    #[must_use]
    pub fn paths(&self) -> Vec<&Pointer> {
        let mut seen: Vec<&Pointer> = Vec::new();
        for op in &self.0 {
            if !seen.contains(&op.path()) {
                seen.push(op.path());
            }
        }
        seen
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }
}

impl FromIterator<PatchOp> for Patch {
    fn from_iter<I: IntoIterator<Item = PatchOp>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PatchOp> for Patch {
    fn extend<I: IntoIterator<Item = PatchOp>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Patch {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
