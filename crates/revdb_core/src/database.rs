//! Explicit table registration over a store handle.

use revdb_store::{DocumentStore, IndexSpec, TableSpec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::oplog::OperationLog;
use crate::table::VersionedTable;
use crate::typed::TypedTable;

/// Entry point: a store handle plus configuration.
///
/// There is no global registry. Each table is registered once at startup
/// and the returned handle is passed to whoever needs it.
///
/// # Example
///
/// ```rust,ignore
/// use revdb_core::Database;
/// use revdb_store::{IndexSpec, MemoryStore, TableSpec};
///
/// let db = Database::new(MemoryStore::new());
/// let monsters = db
///     .register(TableSpec::new("monsters").index(IndexSpec::field("height")))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database<S> {
    store: S,
    config: Config,
}

impl<S: DocumentStore> Database<S> {
    /// Wraps a store with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, Config::default())
    }

    /// Wraps a store with the given configuration.
    pub fn with_config(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a versioned table, its indexes, the hidden `(id, version)`
    /// index and its operation log table. Safe to call again for an
    /// existing table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `spec` declares an index
    /// named like the hidden version index, or a store error.
    pub async fn register(&self, spec: TableSpec) -> CoreResult<VersionedTable<S>> {
        if spec
            .indexes
            .iter()
            .any(|index| index.name == self.config.version_index)
        {
            return Err(CoreError::invalid_operation(format!(
                "index name {} is reserved",
                self.config.version_index
            )));
        }

        let name = spec.name.clone();
        let log_table = self.config.oplog_table(&name);
        let documents = spec.index(IndexSpec::compound(
            self.config.version_index.as_str(),
            ["id", "version"],
        ));
        self.store.create_table(&documents).await?;
        self.store
            .create_table(&OperationLog::<S>::table_spec(&log_table))
            .await?;
        info!(table = %name, log = %log_table, "registered table");

        Ok(VersionedTable::new(
            self.store.clone(),
            name,
            self.config.version_index.clone(),
            log_table,
        ))
    }

    /// Registers a table and wraps it for documents of type `T`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub async fn register_typed<T>(&self, spec: TableSpec) -> CoreResult<TypedTable<S, T>>
    where
        T: Serialize + DeserializeOwned,
    {
        Ok(TypedTable::new(self.register(spec).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revdb_store::MemoryStore;

    #[tokio::test]
    async fn register_creates_both_tables() {
        let store = MemoryStore::new();
        let db = Database::new(store.clone());
        let table = db
            .register(TableSpec::new("monsters").index(IndexSpec::field("height")))
            .await
            .unwrap();

        assert!(store.table_exists("monsters").await.unwrap());
        assert!(store.table_exists("monsters_ops").await.unwrap());
        assert_eq!(
            store.index_list("monsters").await.unwrap(),
            ["height", "id_version"]
        );
        assert_eq!(table.indexes().await.unwrap(), ["height"]);
        assert_eq!(table.log().table(), "monsters_ops");
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let db = Database::new(MemoryStore::new());
        db.register(TableSpec::new("monsters")).await.unwrap();
        let again = db.register(TableSpec::new("monsters")).await.unwrap();
        assert!(again.indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reserved_index_name_rejected() {
        let db = Database::new(MemoryStore::new());
        let err = db
            .register(TableSpec::new("monsters").index(IndexSpec::field("id_version")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn custom_config_names() {
        let store = MemoryStore::new();
        let db = Database::with_config(store.clone(), Config::new().oplog_suffix("_history"));
        db.register(TableSpec::new("notes")).await.unwrap();
        assert!(store.table_exists("notes_history").await.unwrap());
    }
}
