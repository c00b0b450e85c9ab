//! Field schemas checked before documents reach the engine.
//!
//! A [`Schema`] maps field names to a [`FieldRule`]: the expected JSON kind
//! and whether the field must be present. Fields not named in the schema
//! pass through unchecked. The engine-managed `version`, `created` and
//! `modified` fields are never checked; `id` gets an implicit string rule
//! that is optional on create and required on update.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use revdb_core::{Document, ValidationErrors, Validator};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message for a missing required field.
pub const REQUIRED: &str = "This field is required";

/// The JSON kind a field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// An RFC 3339 timestamp string.
    Date,
    /// Anything.
    Any,
}

impl FieldKind {
    fn admits(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            Self::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Date => "date",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// Rule for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Expected kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the field must be present and non-null.
    #[serde(default)]
    pub required: bool,
}

impl FieldRule {
    /// An optional field of `kind`.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        match value {
            None | Some(Value::Null) => self.required.then(|| REQUIRED.to_string()),
            Some(value) if self.kind.admits(value) => None,
            Some(_) => Some(format!("Expected {}", self.kind)),
        }
    }
}

/// Which write a document is being checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `id` may be absent.
    Create,
    /// `id` is required.
    Update,
}

/// Field rules for a service's documents.
///
/// # Example
///
/// ```rust
/// use revdb_core::Document;
/// use revdb_service::{FieldKind, FieldRule, Mode, Schema};
///
/// let schema = Schema::new().field("things", FieldRule::new(FieldKind::Array).required());
/// let errors = schema.check(&Document::new(), Mode::Update).unwrap_err();
/// assert_eq!(errors.get("id"), Some("This field is required"));
/// assert_eq!(errors.get("things"), Some("This field is required"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldRule>,
}

impl Schema {
    /// An empty schema; only `id` is checked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, builder style.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// The rule for `name`, if any.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// Checks `document` for a write of the given kind.
    ///
    /// # Errors
    ///
    /// Returns every failing field.
    pub fn check(&self, document: &Document, mode: Mode) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let id_rule = match mode {
            Mode::Create => FieldRule::new(FieldKind::String),
            Mode::Update => FieldRule::new(FieldKind::String).required(),
        };
        if let Some(message) = id_rule.check(document.get("id")) {
            errors.add("id", message);
        }

        for (name, rule) in &self.fields {
            if revdb_core::is_auto_field(name) {
                continue;
            }
            if let Some(message) = rule.check(document.get(name)) {
                errors.add(name.as_str(), message);
            }
        }
        errors.into_result()
    }

    /// A [`Validator`] checking documents for `mode`.
    #[must_use]
    pub fn validator(&self, mode: Mode) -> SchemaValidator<'_> {
        SchemaValidator { schema: self, mode }
    }
}

/// A [`Schema`] bound to a [`Mode`], usable as an engine validator.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    schema: &'a Schema,
    mode: Mode,
}

impl Validator for SchemaValidator<'_> {
    fn validate(&self, document: &Document) -> Result<(), ValidationErrors> {
        self.schema.check(document, self.mode)
    }
}
