//! Property-based test generators using proptest.
//!
//! Provides a strategy for unsaved documents whose fields stay clear of
//! the engine-managed ones.

use proptest::prelude::*;
use revdb_core::Document;
use revdb_patch::is_auto_field;
use serde_json::{Map, Value};

/// Strategy for business field names.
///
/// Never produces `id`, `version`, `created` or `modified`.
fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}")
        .expect("Invalid regex")
        .prop_filter("Field name must not be an auto field", |name| {
            !is_auto_field(name)
        })
}

/// Strategy for scalar JSON values.
fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        prop::string::string_regex("[a-z ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::from),
    ]
}

/// Strategy for nested JSON values.
fn json_value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-e]{1,3}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for the business fields of a document.
fn fields_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), json_value_strategy(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

/// Strategy for unsaved documents.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    fields_strategy().prop_map(Document::from)
}
