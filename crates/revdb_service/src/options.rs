//! Service registration options.

use revdb_store::{IndexSpec, TableSpec};

use crate::schema::Schema;

/// Describes a service: its public name, document schema and indexes.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Public name, e.g. `"game/monsters"`.
    pub name: String,
    /// Field rules for documents.
    pub schema: Schema,
    /// Secondary indexes on the backing table.
    pub indexes: Vec<IndexSpec>,
}

impl ServiceOptions {
    /// Options with an empty schema and no indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a secondary index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Name of the backing table.
    #[must_use]
    pub fn table_name(&self) -> String {
        table_name(&self.name)
    }

    pub(crate) fn table_spec(&self) -> TableSpec {
        self.indexes
            .iter()
            .cloned()
            .fold(TableSpec::new(self.table_name()), TableSpec::index)
    }
}

/// Maps a service name to a table name: `.`, `/` and `-` become `_`.
#[must_use]
pub fn table_name(service: &str) -> String {
    service.replace(['.', '/', '-'], "_")
}
