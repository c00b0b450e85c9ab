//! Structural diff between two document snapshots.

use serde_json::{Map, Value};

use crate::op::{Patch, PatchOp};
use crate::pointer::Pointer;

/// Top-level fields owned by the storage engine rather than the caller.
pub const AUTO_FIELDS: [&str; 4] = ["id", "version", "created", "modified"];

/// Returns true if `field` is engine-managed.
#[must_use]
pub fn is_auto_field(field: &str) -> bool {
    AUTO_FIELDS.contains(&field)
}

/// Computes a patch transforming document `a` into document `b`.
///
/// Top-level [`AUTO_FIELDS`] are ignored on both sides, so the patch only
/// carries business data. Non-object inputs fall back to [`diff_values`].
#[must_use]
pub fn diff(a: &Value, b: &Value) -> Patch {
    let mut patch = Patch::new();
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            diff_objects(&Pointer::root(), a, b, true, &mut patch);
        }
        _ => diff_into(&Pointer::root(), a, b, &mut patch),
    }
    patch
}

/// Computes a patch transforming `a` into `b` with no fields excluded.
#[must_use]
pub fn diff_values(a: &Value, b: &Value) -> Patch {
    let mut patch = Patch::new();
    diff_into(&Pointer::root(), a, b, &mut patch);
    patch
}

fn diff_into(path: &Pointer, a: &Value, b: &Value, out: &mut Patch) {
    if a == b {
        return;
    }
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => diff_objects(path, a, b, false, out),
        (Value::Array(a), Value::Array(b)) => diff_arrays(path, a, b, out),
        _ => out.push(PatchOp::replace(path.clone(), b.clone())),
    }
}

fn diff_objects(
    path: &Pointer,
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    skip_auto: bool,
    out: &mut Patch,
) {
    let skipped = |key: &str| skip_auto && is_auto_field(key);

    let mut removed: Vec<&String> = a
        .keys()
        .filter(|key| !skipped(key.as_str()) && !b.contains_key(key.as_str()))
        .collect();
    removed.sort();
    for key in removed {
        out.push(PatchOp::remove(path.child(key.as_str())));
    }

    let mut keys: Vec<(&String, &Value)> = b.iter().filter(|(key, _)| !skipped(key.as_str())).collect();
    keys.sort_by(|x, y| x.0.cmp(y.0));
    for (key, new) in keys {
        let child = path.child(key.as_str());
        match a.get(key) {
            Some(old) => diff_into(&child, old, new, out),
            None => out.push(PatchOp::add(child, new.clone())),
        }
    }
}

fn diff_arrays(path: &Pointer, a: &[Value], b: &[Value], out: &mut Patch) {
    let common = a.len().min(b.len());
    for (index, (old, new)) in a.iter().zip(b).enumerate() {
        diff_into(&path.child(index.to_string()), old, new, out);
    }
    // Highest index first so earlier removals do not shift later ones.
    for index in (common..a.len()).rev() {
        out.push(PatchOp::remove(path.child(index.to_string())));
    }
    for (index, value) in b.iter().enumerate().skip(common) {
        out.push(PatchOp::add(path.child(index.to_string()), value.clone()));
    }
}
