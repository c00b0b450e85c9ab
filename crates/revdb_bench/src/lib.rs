//! Benchmark utilities.

use revdb_patch::{Patch, PatchOp, Pointer};
use serde_json::{json, Map, Value};

/// A flat document with `width` numeric fields.
pub fn flat_document(width: usize) -> Value {
    let fields: Map<String, Value> = (0..width)
        .map(|i| (format!("field_{i}"), json!(i)))
        .collect();
    Value::Object(fields)
}

/// A nested document `depth` levels deep with `width` keys per level.
pub fn nested_document(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return json!("leaf");
    }
    let fields: Map<String, Value> = (0..width)
        .map(|i| (format!("key_{i}"), nested_document(depth - 1, width)))
        .collect();
    Value::Object(fields)
}

/// `doc` with every `stride`-th top-level field replaced.
pub fn edited(doc: &Value, stride: usize) -> Value {
    let mut doc = doc.clone();
    if let Value::Object(fields) = &mut doc {
        for (i, value) in fields.values_mut().enumerate() {
            if i % stride.max(1) == 0 {
                *value = json!("edited");
            }
        }
    }
    doc
}

/// A patch inserting `count` elements at the front of `/items`.
pub fn array_inserts(count: usize) -> Patch {
    (0..count)
        .map(|i| PatchOp::add(Pointer::from_tokens(["items", "0"]), i))
        .collect()
}

/// A patch replacing each of the first `count` elements of `/items`.
pub fn array_replaces(count: usize) -> Patch {
    (0..count)
        .map(|i| PatchOp::replace(Pointer::from_tokens(["items".to_string(), i.to_string()]), "x"))
        .collect()
}
