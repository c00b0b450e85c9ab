//! Find options and their translation into store queries.

use revdb_store::{BoundKind, Key, Query, PRIMARY_INDEX};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-facing query options.
///
/// Deserializes from the same shape clients send:
///
/// ```json
/// {"index": "height", "start": 14, "end": 20, "orderBy": "name", "limit": 10}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOptions {
    /// Index for equality or range lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Equality value; an array means a compound key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Range lower bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    /// Range upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
    /// Lower bound inclusivity, closed by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<BoundKind>,
    /// Upper bound inclusivity, open by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<BoundKind>,
    /// Ascending sort field or index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Maximum number of results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Number of leading results to drop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
}

impl FindOptions {
    /// Options matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality lookup on `index`.
    pub fn value(index: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            index: Some(index.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Range lookup on `index`. Either bound may be omitted.
    pub fn range(index: impl Into<String>, start: Option<Value>, end: Option<Value>) -> Self {
        Self {
            index: Some(index.into()),
            start,
            end,
            ..Self::default()
        }
    }

    /// Overrides bound inclusivity.
    #[must_use]
    pub fn bounds(mut self, left: BoundKind, right: BoundKind) -> Self {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    /// Sorts ascending by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Limits the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips leading results.
    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Translates these options into a query on `table`.
    ///
    /// - `start` or `end` present: range on `index` (default `id`), missing
    ///   bounds become `MinVal`/`MaxVal`, closed-left/open-right unless
    ///   overridden.
    /// - otherwise `value` and `index` present: equality lookup.
    /// - otherwise: full scan.
    ///
    /// `order_by`, `limit` and `skip` are then applied in that order.
    #[must_use]
    pub fn to_query(&self, table: &str) -> Query {
        let base = Query::table(table);
        let mut query = if self.start.is_some() || self.end.is_some() {
            let index = self.index.as_deref().unwrap_or(PRIMARY_INDEX);
            let lower = self.start.clone().map_or(Key::MinVal, Key::from_value);
            let upper = self.end.clone().map_or(Key::MaxVal, Key::from_value);
            base.between(index, lower, upper).bounds(
                self.left.unwrap_or(BoundKind::Closed),
                self.right.unwrap_or(BoundKind::Open),
            )
        } else {
            match (&self.index, &self.value) {
                (Some(index), Some(value)) => {
                    base.get_all(index.as_str(), vec![Key::from_value(value.clone())])
                }
                _ => base,
            }
        };

        if let Some(field) = &self.order_by {
            query = query.order_by(field.as_str());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revdb_store::Selection;
    use serde_json::json;

    #[test]
    fn full_scan_by_default() {
        let query = FindOptions::new().to_query("monsters");
        assert_eq!(query, Query::table("monsters"));
    }

    #[test]
    fn value_without_index_scans() {
        let options = FindOptions {
            value: Some(json!(14)),
            ..FindOptions::default()
        };
        assert_eq!(options.to_query("monsters").selection, Selection::All);
    }

    #[test]
    fn equality_lookup() {
        let query = FindOptions::value("height", 14).to_query("monsters");
        assert_eq!(
            query.selection,
            Selection::GetAll {
                index: "height".into(),
                keys: vec![Key::from(14u64)],
            }
        );
    }

    #[test]
    fn compound_equality_lookup() {
        let query = FindOptions::value("docid_version", json!(["w1", 2])).to_query("t");
        let Selection::GetAll { keys, .. } = query.selection else {
            panic!("expected get_all");
        };
        assert_eq!(keys, vec![Key::compound([Key::from("w1"), Key::from(2u64)])]);
    }

    #[test]
    fn range_defaults() {
        let query = FindOptions::range("scariness", Some(json!(4)), None).to_query("monsters");
        assert_eq!(
            query.selection,
            Selection::Between {
                index: "scariness".into(),
                lower: Key::from(4u64),
                upper: Key::MaxVal,
                left: BoundKind::Closed,
                right: BoundKind::Open,
            }
        );
    }

    #[test]
    fn range_without_index_uses_primary_key() {
        let options = FindOptions {
            end: Some(json!("m")),
            ..FindOptions::default()
        };
        let query = options.to_query("monsters");
        assert_eq!(query.selection.index(), Some("id"));
        assert!(matches!(query.selection, Selection::Between { lower: Key::MinVal, .. }));
    }

    #[test]
    fn range_takes_precedence_over_value() {
        let options = FindOptions {
            index: Some("height".into()),
            value: Some(json!(1)),
            start: Some(json!(14)),
            ..FindOptions::default()
        };
        assert!(matches!(
            options.to_query("m").selection,
            Selection::Between { .. }
        ));
    }

    #[test]
    fn modifiers_carry_over() {
        let query = FindOptions::new()
            .order_by("name")
            .limit(5)
            .skip(2)
            .to_query("monsters");
        assert_eq!(query.order_by.as_deref(), Some("name"));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.skip, Some(2));
    }

    #[test]
    fn deserializes_client_shape() {
        let options: FindOptions = serde_json::from_value(json!({
            "index": "height", "start": 14, "end": 20, "right": "closed", "orderBy": "name"
        }))
        .unwrap();
        assert_eq!(options.right, Some(BoundKind::Closed));
        assert_eq!(options.order_by.as_deref(), Some("name"));
    }
}
