//! Applying patches to documents.

use serde_json::Value;

use crate::error::{PatchError, PatchResult};
use crate::op::{Patch, PatchOp};
use crate::pointer::Pointer;

/// Applies `patch` to a copy of `doc` and returns the result.
///
/// Edits are applied in order; the input is left untouched, so a failed
/// patch never leaves a half-applied document behind.
///
/// # Errors
///
/// Returns an error if any edit addresses a location that does not exist
/// in the document as it stands when that edit is reached.
pub fn apply(patch: &Patch, doc: &Value) -> PatchResult<Value> {
    let mut out = doc.clone();
    for op in patch {
        apply_op(&mut out, op)?;
    }
    Ok(out)
}

/// Applies a single edit in place.
///
/// # Errors
///
/// See [`apply`]. On error `doc` is unchanged.
pub fn apply_op(doc: &mut Value, op: &PatchOp) -> PatchResult<()> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path),
        PatchOp::Replace { path, value } => replace(doc, path, value.clone()),
    }
}

fn add(doc: &mut Value, path: &Pointer, value: Value) -> PatchResult<()> {
    let Some((last, parent)) = path.tokens().split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parent, path)? {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if last == "-" {
                items.len()
            } else {
                parse_index(path, last)?
            };
            if index > items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
        }),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> PatchResult<()> {
    let Some((last, parent)) = path.tokens().split_last() else {
        return Err(PatchError::RemoveRoot);
    };
    match resolve_mut(doc, parent, path)? {
        Value::Object(map) => map
            .remove(last)
            .map(drop)
            .ok_or_else(|| PatchError::path_not_found(path)),
        Value::Array(items) => {
            let index = existing_index(path, last, items.len())?;
            items.remove(index);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
        }),
    }
}

fn replace(doc: &mut Value, path: &Pointer, value: Value) -> PatchResult<()> {
    let Some((last, parent)) = path.tokens().split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parent, path)? {
        Value::Object(map) => match map.get_mut(last) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PatchError::path_not_found(path)),
        },
        Value::Array(items) => {
            let index = existing_index(path, last, items.len())?;
            items[index] = value;
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            path: path.to_string(),
        }),
    }
}

fn resolve_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    full: &Pointer,
) -> PatchResult<&'a mut Value> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::path_not_found(full))?,
            Value::Array(items) => {
                let index = existing_index(full, token, items.len())?;
                &mut items[index]
            }
            _ => return Err(PatchError::path_not_found(full)),
        };
    }
    Ok(current)
}

fn existing_index(path: &Pointer, token: &str, len: usize) -> PatchResult<usize> {
    let index = parse_index(path, token)?;
    if index >= len {
        return Err(PatchError::IndexOutOfBounds {
            path: path.to_string(),
            index,
            len,
        });
    }
    Ok(index)
}

fn parse_index(path: &Pointer, token: &str) -> PatchResult<usize> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(PatchError::invalid_index(path, token));
    }
    token
        .parse()
        .map_err(|_| PatchError::invalid_index(path, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ptr(text: &str) -> Pointer {
        Pointer::parse(text).unwrap()
    }

    fn patch(ops: Vec<PatchOp>) -> Patch {
        ops.into()
    }

    #[test]
    fn add_field() {
        let doc = json!({"name": "bat"});
        let out = apply(&patch(vec![PatchOp::add(ptr("/height"), 0.3)]), &doc).unwrap();
        assert_eq!(out, json!({"name": "bat", "height": 0.3}));
        // input untouched
        assert_eq!(doc, json!({"name": "bat"}));
    }

    #[test]
    fn add_into_array() {
        let doc = json!({"tags": ["a", "c"]});
        let out = apply(
            &patch(vec![
                PatchOp::add(ptr("/tags/1"), "b"),
                PatchOp::add(ptr("/tags/-"), "d"),
            ]),
            &doc,
        )
        .unwrap();
        assert_eq!(out, json!({"tags": ["a", "b", "c", "d"]}));
    }

    #[test]
    fn add_past_end_fails() {
        let doc = json!({"tags": []});
        let err = apply(&patch(vec![PatchOp::add(ptr("/tags/1"), 1)]), &doc).unwrap_err();
        assert!(matches!(err, PatchError::IndexOutOfBounds { index: 1, len: 0, .. }));
    }

    #[test]
    fn remove_and_replace() {
        let doc = json!({"a": 1, "b": [1, 2, 3]});
        let out = apply(
            &patch(vec![
                PatchOp::remove(ptr("/a")),
                PatchOp::remove(ptr("/b/0")),
                PatchOp::replace(ptr("/b/1"), 30),
            ]),
            &doc,
        )
        .unwrap();
        assert_eq!(out, json!({"b": [2, 30]}));
    }

    #[test]
    fn replace_missing_field_fails() {
        let doc = json!({"a": 1});
        let err = apply(&patch(vec![PatchOp::replace(ptr("/b"), 2)]), &doc).unwrap_err();
        assert_eq!(err, PatchError::path_not_found("/b"));
    }

    #[test]
    fn remove_missing_field_fails() {
        let doc = json!({"a": 1});
        assert!(apply(&patch(vec![PatchOp::remove(ptr("/b"))]), &doc).is_err());
    }

    #[test]
    fn missing_intermediate_fails() {
        let doc = json!({"a": 1});
        let err = apply(&patch(vec![PatchOp::add(ptr("/x/y"), 2)]), &doc).unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { .. }));
    }

    #[test]
    fn scalar_parent_fails() {
        let doc = json!({"a": 1});
        let err = apply(&patch(vec![PatchOp::add(ptr("/a/b"), 2)]), &doc).unwrap_err();
        assert!(matches!(err, PatchError::NotAContainer { .. }));
    }

    #[test]
    fn leading_zero_index_rejected() {
        let doc = json!({"tags": [1, 2]});
        let err = apply(&patch(vec![PatchOp::remove(ptr("/tags/01"))]), &doc).unwrap_err();
        assert!(matches!(err, PatchError::InvalidIndex { .. }));
    }

    #[test]
    fn root_edits() {
        let doc = json!({"a": 1});
        let out = apply(&patch(vec![PatchOp::replace(Pointer::root(), json!({"b": 2}))]), &doc).unwrap();
        assert_eq!(out, json!({"b": 2}));
        let err = apply(&patch(vec![PatchOp::remove(Pointer::root())]), &doc).unwrap_err();
        assert_eq!(err, PatchError::RemoveRoot);
    }

    #[test]
    fn failing_patch_is_atomic() {
        let doc = json!({"a": 1});
        let result = apply(
            &patch(vec![PatchOp::replace(ptr("/a"), 2), PatchOp::remove(ptr("/zzz"))]),
            &doc,
        );
        assert!(result.is_err());
        assert_eq!(doc, json!({"a": 1}));
    }
}
