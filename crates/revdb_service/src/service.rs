//! CRUD services over versioned tables.

use revdb_core::{
    Document, DocumentStore, FindOptions, Patch, ReplicaSet, ValidationErrors, VersionedTable,
    WriteOutcome,
};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::feed::LiveFeed;
use crate::schema::{Mode, Schema, REQUIRED};

/// A named, schema-checked facade over one [`VersionedTable`].
///
/// Create and update check the whole document against the schema before
/// the engine sees it. Patches are checked after they are applied, as the
/// engine's validator, so the stored result is what gets validated.
/// Every engine error is converted into a [`ServiceError`].
#[derive(Debug, Clone)]
pub struct Service<S> {
    name: String,
    schema: Schema,
    table: VersionedTable<S>,
}

impl<S: DocumentStore> Service<S> {
    pub(crate) fn new(name: String, schema: Schema, table: VersionedTable<S>) -> Self {
        Self {
            name,
            schema,
            table,
        }
    }

    /// Public service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Document schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The backing table.
    pub fn table(&self) -> &VersionedTable<S> {
        &self.table
    }

    /// Validates and creates a document.
    ///
    /// # Errors
    ///
    /// Returns a 400 with field errors if validation fails, or the
    /// engine's error.
    pub async fn create(&self, doc: Document, user_id: Option<&str>) -> ServiceResult<Document> {
        self.schema
            .check(&doc, Mode::Create)
            .map_err(ServiceError::validation)?;
        let created = self.table.create(doc, user_id).await?;
        debug!(service = %self.name, id = created.id().unwrap_or("?"), "created");
        Ok(created)
    }

    /// Validates a full document and writes it over the stored one.
    ///
    /// # Errors
    ///
    /// Returns a 400 if validation fails (including a missing id), a 404
    /// if the document does not exist, or the engine's error.
    pub async fn update(&self, doc: Document, user_id: Option<&str>) -> ServiceResult<WriteOutcome> {
        self.schema
            .check(&doc, Mode::Update)
            .map_err(ServiceError::validation)?;
        Ok(self.table.update(doc, user_id).await?)
    }

    /// Applies a patch at an expected version, validating the result.
    ///
    /// # Errors
    ///
    /// Returns a 400 if the patched document fails validation or the
    /// version is ahead of the store, a 404 if the document does not
    /// exist, or the engine's error.
    pub async fn patch(
        &self,
        id: &str,
        version: u64,
        patch: Patch,
        user_id: Option<&str>,
    ) -> ServiceResult<WriteOutcome> {
        require_id(id)?;
        let validator = self.schema.validator(Mode::Update);
        Ok(self
            .table
            .patch(id, version, patch, user_id, Some(&validator))
            .await?)
    }

    /// Deletes a document at an expected version.
    ///
    /// # Errors
    ///
    /// Returns a 400 if `id` is empty, or the engine's error.
    pub async fn delete(
        &self,
        id: &str,
        version: u64,
        user_id: Option<&str>,
    ) -> ServiceResult<WriteOutcome> {
        require_id(id)?;
        Ok(self.table.delete(id, version, user_id).await?)
    }

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns a 404 if it does not exist.
    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        require_id(id)?;
        self.table
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(id))
    }

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns the engine's error, e.g. a 500 for an unknown index.
    pub async fn find(&self, options: &FindOptions) -> ServiceResult<Vec<Document>> {
        Ok(self.table.find(options).await?)
    }

    /// Lists secondary indexes.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    pub async fn indexes(&self) -> ServiceResult<Vec<String>> {
        Ok(self.table.indexes().await?)
    }

    /// Reads a document and follows its operation log.
    ///
    /// # Errors
    ///
    /// Returns a 404 if the document does not exist, or the engine's error.
    pub async fn get_and_watch(&self, id: &str) -> ServiceResult<LiveFeed> {
        require_id(id)?;
        let subscription = self.table.watch_document(id).await?;
        let doc = self.get(id).await?;
        let replicas = ReplicaSet::from_documents([doc.clone()])?;
        debug!(service = %self.name, id, "watching document");
        Ok(LiveFeed::new(subscription, vec![doc], replicas))
    }

    /// Runs a query and follows documents entering, changing in and
    /// leaving its view.
    ///
    /// # Errors
    ///
    /// Returns the engine's error.
    pub async fn find_and_watch(&self, options: &FindOptions) -> ServiceResult<LiveFeed> {
        let subscription = self.table.watch(options).await?;
        let docs = self.table.find(options).await?;
        let replicas = ReplicaSet::from_documents(docs.iter().cloned())?;
        debug!(service = %self.name, count = docs.len(), "watching query");
        Ok(LiveFeed::new(subscription, docs, replicas))
    }
}

fn require_id(id: &str) -> ServiceResult<()> {
    if id.is_empty() {
        return Err(ServiceError::validation(
            ValidationErrors::new().with("id", REQUIRED),
        ));
    }
    Ok(())
}
