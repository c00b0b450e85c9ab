//! Typed facade over versioned tables.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use revdb_patch::diff;
use revdb_store::DocumentStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, WriteOutcome};
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::query::FindOptions;
use crate::table::VersionedTable;

/// A stored `T` with its engine-managed fields.
///
/// `T`'s fields are flattened alongside `id`, `version`, `created` and
/// `modified`, matching the stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Document id.
    pub id: String,
    /// Current version.
    pub version: u64,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Business data.
    #[serde(flatten)]
    pub data: T,
}

/// Result of a typed guarded write.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedOutcome<T> {
    /// The write committed.
    Applied(Versioned<T>),
    /// The caller's version was stale.
    Conflict(Conflict),
}

/// A [`VersionedTable`] whose documents deserialize as `T`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Monster { name: String, height: f64 }
///
/// let monsters = db.register_typed::<Monster>(TableSpec::new("monsters")).await?;
/// let mut bat = monsters.create(&Monster { name: "bat".into(), height: 0.3 }, None).await?;
/// bat.data.height = 0.4;
/// monsters.update(&bat, None).await?;
/// ```
#[derive(Debug)]
pub struct TypedTable<S, T> {
    table: VersionedTable<S>,
    _marker: PhantomData<fn() -> T>,
}

impl<S: Clone, T> Clone for TypedTable<S, T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S, T> TypedTable<S, T>
where
    S: DocumentStore,
    T: Serialize + DeserializeOwned,
{
    /// Wraps an untyped table.
    pub fn new(table: VersionedTable<S>) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    /// The untyped table.
    #[must_use]
    pub fn untyped(&self) -> &VersionedTable<S> {
        &self.table
    }

    /// Creates a document from `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not serialize to an object, or
    /// anything [`VersionedTable::create`] returns.
    pub async fn create(&self, data: &T, user_id: Option<&str>) -> CoreResult<Versioned<T>> {
        let document = Document::from_value(serde_json::to_value(data)?)?;
        decode(self.table.create(document, user_id).await?)
    }

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the document is not a `T`.
    pub async fn get(&self, id: &str) -> CoreResult<Option<Versioned<T>>> {
        self.table.get(id).await?.map(decode).transpose()
    }

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is not a `T`.
    pub async fn find(&self, options: &FindOptions) -> CoreResult<Vec<Versioned<T>>> {
        self.table
            .find(options)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Writes `value.data` if the document is still at `value.version`.
    ///
    /// # Errors
    ///
    /// See [`VersionedTable::patch`].
    pub async fn update(
        &self,
        value: &Versioned<T>,
        user_id: Option<&str>,
    ) -> CoreResult<TypedOutcome<T>> {
        let current = self
            .table
            .get(&value.id)
            .await?
            .ok_or_else(|| CoreError::not_found(value.id.as_str()))?;
        let patch = diff(&current.to_value(), &serde_json::to_value(value)?);
        let outcome = self
            .table
            .patch(&value.id, value.version, patch, user_id, None)
            .await?;
        typed_outcome(outcome)
    }

    /// Deletes the document if it is still at `version`.
    ///
    /// # Errors
    ///
    /// See [`VersionedTable::delete`].
    pub async fn delete(
        &self,
        id: &str,
        version: u64,
        user_id: Option<&str>,
    ) -> CoreResult<TypedOutcome<T>> {
        typed_outcome(self.table.delete(id, version, user_id).await?)
    }
}

fn decode<T: DeserializeOwned>(document: Document) -> CoreResult<Versioned<T>> {
    Ok(serde_json::from_value(document.into_value())?)
}

fn typed_outcome<T: DeserializeOwned>(outcome: WriteOutcome) -> CoreResult<TypedOutcome<T>> {
    match outcome {
        WriteOutcome::Applied { document } => Ok(TypedOutcome::Applied(decode(document)?)),
        WriteOutcome::Conflict(conflict) => Ok(TypedOutcome::Conflict(conflict)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use revdb_store::{MemoryStore, TableSpec};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Monster {
        name: String,
        height: f64,
    }

    async fn monsters() -> TypedTable<MemoryStore, Monster> {
        Database::new(MemoryStore::new())
            .register_typed(TableSpec::new("monsters"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_get_update() {
        let table = monsters().await;
        let bat = Monster {
            name: "large bat".into(),
            height: 0.3,
        };
        let mut stored = table.create(&bat, Some("u1")).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.data, bat);

        let fetched = table.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);

        stored.data.height = 0.4;
        let TypedOutcome::Applied(updated) = table.update(&stored, None).await.unwrap() else {
            panic!("expected update to apply");
        };
        assert_eq!(updated.version, 2);
        assert_eq!(updated.data.height, 0.4);
        assert_eq!(updated.created, stored.created);
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let table = monsters().await;
        let stored = table
            .create(&Monster { name: "kishi".into(), height: 1.6 }, None)
            .await
            .unwrap();

        let mut first = stored.clone();
        first.data.height = 1.7;
        assert!(matches!(table.update(&first, None).await.unwrap(), TypedOutcome::Applied(_)));

        let mut second = stored;
        second.data.name = "kishi the elder".into();
        let TypedOutcome::Conflict(conflict) = table.update(&second, None).await.unwrap() else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.ops.len(), 1);
        assert_eq!(conflict.ops[0].version, 1);
    }

    #[tokio::test]
    async fn delete_returns_last_state() {
        let table = monsters().await;
        let stored = table
            .create(&Monster { name: "kraken".into(), height: 14.0 }, None)
            .await
            .unwrap();
        let TypedOutcome::Applied(gone) = table.delete(&stored.id, 1, None).await.unwrap() else {
            panic!("expected delete to apply");
        };
        assert_eq!(gone.data.name, "kraken");
        assert!(table.get(&stored.id).await.unwrap().is_none());
    }
}
