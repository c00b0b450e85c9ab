//! Index keys and their total ordering.

use std::cmp::Ordering;

use serde_json::Value;

/// A value as seen by an index.
///
/// Keys are totally ordered:
/// `MinVal < null < bool < number < string < compound < object < MaxVal`.
/// Compound keys compare element by element. `MinVal` and `MaxVal` only
/// appear as range bounds, possibly inside a compound bound such as
/// `[docid, MaxVal]`.
#[derive(Debug, Clone)]
pub enum Key {
    /// Sorts below every other key.
    MinVal,
    /// Sorts above every other key.
    MaxVal,
    /// A scalar or object JSON value.
    Value(Value),
    /// An ordered tuple, from a compound index or a JSON array.
    Compound(Vec<Key>),
}

impl Key {
    /// Converts a JSON value, turning arrays into compound keys.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Compound(items.into_iter().map(Self::from_value).collect()),
            other => Self::Value(other),
        }
    }

    /// Builds a compound key.
    #[must_use]
    pub fn compound(parts: impl IntoIterator<Item = Key>) -> Self {
        Self::Compound(parts.into_iter().collect())
    }

    fn rank(&self) -> u8 {
        match self {
            Self::MinVal => 0,
            Self::Value(Value::Null) => 1,
            Self::Value(Value::Bool(_)) => 2,
            Self::Value(Value::Number(_)) => 3,
            Self::Value(Value::String(_)) => 4,
            Self::Compound(_) | Self::Value(Value::Array(_)) => 5,
            Self::Value(Value::Object(_)) => 6,
            Self::MaxVal => 7,
        }
    }

    fn elements(&self) -> Vec<Key> {
        match self {
            Self::Compound(parts) => parts.clone(),
            Self::Value(Value::Array(items)) => items.iter().cloned().map(Self::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for Key {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Self::Value(Value::Bool(a)), Self::Value(Value::Bool(b))) => a.cmp(b),
            (Self::Value(Value::Number(a)), Self::Value(Value::Number(b))) => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Self::Value(Value::String(a)), Self::Value(Value::String(b))) => a.cmp(b),
            (Self::Value(Value::Object(a)), Self::Value(Value::Object(b))) => {
                a.iter()
                    .map(|(k, v)| (k, Key::from_value(v.clone())))
                    .cmp(b.iter().map(|(k, v)| (k, Key::from_value(v.clone()))))
            }
            (a, b) if a.rank() == 5 => a.elements().cmp(&b.elements()),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}
