//! Database configuration.

/// Configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct Config {
    /// Suffix appended to a table name to name its operation log table.
    pub oplog_suffix: String,

    /// Name of the hidden `(id, version)` index on every document table.
    pub version_index: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oplog_suffix: "_ops".to_string(),
            version_index: "id_version".to_string(),
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation log table suffix.
    #[must_use]
    pub fn oplog_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.oplog_suffix = suffix.into();
        self
    }

    /// Sets the hidden version index name.
    #[must_use]
    pub fn version_index(mut self, name: impl Into<String>) -> Self {
        self.version_index = name.into();
        self
    }

    /// Returns the operation log table name for `table`.
    #[must_use]
    pub fn oplog_table(&self, table: &str) -> String {
        format!("{table}{}", self.oplog_suffix)
    }
}
