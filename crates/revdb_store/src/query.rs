//! Table, index and query descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::key::Key;

/// A stored row: a JSON object.
pub type Row = Map<String, Value>;

/// Name of the primary key index, always present on every table.
pub const PRIMARY_INDEX: &str = "id";

/// A secondary index over one or more row fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name used in queries.
    pub name: String,
    /// Fields making up the key, in order.
    pub fields: Vec<String>,
}

impl IndexSpec {
    /// An index on a single field, named after it.
    pub fn field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            fields: vec![field],
        }
    }

    /// A compound index over several fields.
    pub fn compound<I, T>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Computes the key for `row`, or `None` if a field is missing or null.
    #[must_use]
    pub fn key_for(&self, row: &Row) -> Option<Key> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match row.get(field) {
                None | Some(Value::Null) => return None,
                Some(value) => parts.push(Key::from_value(value.clone())),
            }
        }
        if parts.len() == 1 {
            parts.pop()
        } else {
            Some(Key::Compound(parts))
        }
    }
}

/// A table to create along with its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Secondary indexes.
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    /// A table with no secondary indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Adds a secondary index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Whether a range bound includes its endpoint.
///
/// Serialized as `"closed"` or `"open"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    /// Endpoint included.
    #[default]
    Closed,
    /// Endpoint excluded.
    Open,
}

/// Which rows of a table a query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every row.
    All,
    /// Rows whose index key equals one of `keys`.
    GetAll {
        /// Index to look up.
        index: String,
        /// Keys to match.
        keys: Vec<Key>,
    },
    /// Rows whose index key lies between `lower` and `upper`.
    Between {
        /// Index to scan.
        index: String,
        /// Lower bound.
        lower: Key,
        /// Upper bound.
        upper: Key,
        /// Inclusivity of `lower`.
        left: BoundKind,
        /// Inclusivity of `upper`.
        right: BoundKind,
    },
}

impl Selection {
    /// The index this selection uses, if any.
    #[must_use]
    pub fn index(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::GetAll { index, .. } | Self::Between { index, .. } => Some(index),
        }
    }

    /// Returns true if a row with index key `key` is selected.
    ///
    /// Rows without a key (field missing) are only selected by [`Selection::All`].
    #[must_use]
    pub fn matches_key(&self, key: Option<&Key>) -> bool {
        match (self, key) {
            (Self::All, _) => true,
            (_, None) => false,
            (Self::GetAll { keys, .. }, Some(key)) => keys.contains(key),
            (
                Self::Between {
                    lower,
                    upper,
                    left,
                    right,
                    ..
                },
                Some(key),
            ) => {
                let above = match left {
                    BoundKind::Closed => key >= lower,
                    BoundKind::Open => key > lower,
                };
                let below = match right {
                    BoundKind::Closed => key <= upper,
                    BoundKind::Open => key < upper,
                };
                above && below
            }
        }
    }
}

/// A read against one table.
///
/// `order_by`, `limit` and `skip` are applied in that order after the
/// selection. Changefeeds only honour the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Table to read.
    pub table: String,
    /// Row selection.
    pub selection: Selection,
    /// Ascending sort field or index name.
    pub order_by: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Number of leading rows to drop.
    pub skip: Option<usize>,
}

impl Query {
    /// A full scan of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            selection: Selection::All,
            order_by: None,
            limit: None,
            skip: None,
        }
    }

    /// Restricts to rows whose `index` key equals one of `keys`.
    #[must_use]
    pub fn get_all(mut self, index: impl Into<String>, keys: Vec<Key>) -> Self {
        self.selection = Selection::GetAll {
            index: index.into(),
            keys,
        };
        self
    }

    /// Restricts to rows whose `index` key lies in `[lower, upper)`.
    #[must_use]
    pub fn between(mut self, index: impl Into<String>, lower: Key, upper: Key) -> Self {
        self.selection = Selection::Between {
            index: index.into(),
            lower,
            upper,
            left: BoundKind::Closed,
            right: BoundKind::Open,
        };
        self
    }

    /// Overrides range bound inclusivity. No effect on non-range selections.
    #[must_use]
    pub fn bounds(mut self, left_bound: BoundKind, right_bound: BoundKind) -> Self {
        if let Selection::Between { left, right, .. } = &mut self.selection {
            *left = left_bound;
            *right = right_bound;
        }
        self
    }

    /// Sorts ascending by a field or index.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips leading rows.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Equality predicate on `(id, version)` guarding a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGuard {
    /// Row id.
    pub id: String,
    /// Version the row must currently have.
    pub version: u64,
}

impl VersionGuard {
    /// Creates a guard.
    pub fn new(id: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Returns true if `row` satisfies the guard.
    #[must_use]
    pub fn admits(&self, row: &Row) -> bool {
        row.get("id").and_then(Value::as_str) == Some(self.id.as_str())
            && row.get("version").and_then(Value::as_u64) == Some(self.version)
    }
}
