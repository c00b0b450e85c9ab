//! Service registry.

use revdb_core::{Database, DocumentStore};
use tracing::info;

use crate::error::ServiceResult;
use crate::options::ServiceOptions;
use crate::service::Service;

/// Creates services on one database.
///
/// # Example
///
/// ```rust,ignore
/// use revdb_core::{Database, MemoryStore, IndexSpec};
/// use revdb_service::{Crud, FieldKind, FieldRule, Schema, ServiceOptions};
///
/// let crud = Crud::new(Database::new(MemoryStore::new()));
/// let monsters = crud
///     .service(
///         ServiceOptions::new("zoo/monsters")
///             .schema(Schema::new().field("name", FieldRule::new(FieldKind::String).required()))
///             .index(IndexSpec::field("height")),
///     )
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Crud<S> {
    db: Database<S>,
}

impl<S: DocumentStore> Crud<S> {
    /// Wraps a database.
    pub fn new(db: Database<S>) -> Self {
        Self { db }
    }

    /// The wrapped database.
    pub fn db(&self) -> &Database<S> {
        &self.db
    }

    /// Registers the backing table and returns a ready service.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the table cannot be registered.
    pub async fn service(&self, options: ServiceOptions) -> ServiceResult<Service<S>> {
        let table = self.db.register(options.table_spec()).await?;
        info!(service = %options.name, table = %table.name(), "registered service");
        Ok(Service::new(options.name, options.schema, table))
    }
}
