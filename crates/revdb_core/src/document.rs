//! Versioned documents.

use chrono::{DateTime, SecondsFormat, Utc};
use revdb_patch::is_auto_field;
use revdb_store::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// A JSON object stored in a versioned table.
///
/// Stored documents always carry the engine-managed fields `id`,
/// `version`, `created` and `modified`; timestamps are RFC 3339 strings.
/// Documents built by callers may omit them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Row);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDocument`] if `value` is not an object.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(row) => Ok(Self(row)),
            other => Err(CoreError::invalid_document(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Sets a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// The document id, if set.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// The document version, if set.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.0.get("version").and_then(Value::as_u64)
    }

    /// Creation time, if set and well formed.
    #[must_use]
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created")
    }

    /// Last modification time, if set and well formed.
    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.timestamp("modified")
    }

    fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        let text = self.0.get(field)?.as_str()?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Reads a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns the caller-owned fields, without `id`, `version`,
    /// `created` and `modified`.
    #[must_use]
    pub fn fields(&self) -> Row {
        self.0
            .iter()
            .filter(|(key, _)| !is_auto_field(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Borrows the underlying row.
    #[must_use]
    pub fn as_row(&self) -> &Row {
        &self.0
    }

    /// Returns the underlying row.
    #[must_use]
    pub fn into_row(self) -> Row {
        self.0
    }

    /// Returns the document as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Converts the document into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.insert("id", id);
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.insert("version", version);
    }

    pub(crate) fn set_created(&mut self, at: DateTime<Utc>) {
        self.insert("created", format_timestamp(at));
    }

    pub(crate) fn set_modified(&mut self, at: DateTime<Utc>) {
        self.insert("modified", format_timestamp(at));
    }
}

/// Formats a timestamp the way documents store it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<Row> for Document {
    fn from(row: Row) -> Self {
        Self(row)
    }
}

impl From<Document> for Row {
    fn from(document: Document) -> Self {
        document.0
    }
}

impl TryFrom<Value> for Document {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        Self::from_value(value)
    }
}
