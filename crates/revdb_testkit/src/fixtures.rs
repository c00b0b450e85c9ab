//! Test fixtures and database helpers.
//!
//! Provides in-memory databases and the monsters table most tests run
//! against.

use revdb_core::{Database, Document, VersionedTable};
use revdb_store::{IndexSpec, MemoryStore, MemoryStoreConfig, TableSpec};

/// Name of the fixture table.
pub const MONSTERS: &str = "monsters";

/// The monsters fixture: `(name, height, scariness)`.
pub const MONSTER_ROWS: [(&str, f64, f64); 9] = [
    ("tiny bat", 0.083, 0.01),
    ("large bat", 0.3, 0.1),
    ("minotaur", 1.6, 6.0),
    ("kishi", 1.6, 7.0),
    ("kraken", 14.0, 82.9),
    ("werekraken", 14.0, 1000.002),
    ("werewolf", 1.2, 7.3256),
    ("not a monster", 0.0023, 0.0),
    ("impalerbot", 17.0, 77.0),
];

/// A test database over a fresh in-memory store.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database<MemoryStore>,
    /// The store, for failure injection and raw inspection.
    pub store: MemoryStore,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Creates a test database with a custom store configuration.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        let store = MemoryStore::with_config(config);
        Self {
            db: Database::new(store.clone()),
            store,
        }
    }

    /// Registers the monsters table, indexed on `height` and `scariness`.
    pub async fn monsters(&self) -> VersionedTable<MemoryStore> {
        self.db
            .register(monsters_spec())
            .await
            .expect("Failed to register monsters table")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::memory()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database<MemoryStore>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Table spec for the monsters fixture.
pub fn monsters_spec() -> TableSpec {
    TableSpec::new(MONSTERS)
        .index(IndexSpec::field("height"))
        .index(IndexSpec::field("scariness"))
}

/// An unsaved monster document.
pub fn monster(name: &str, height: f64, scariness: f64) -> Document {
    Document::new()
        .with("name", name)
        .with("height", height)
        .with("scariness", scariness)
}

/// Unsaved documents for every row of [`MONSTER_ROWS`].
pub fn monster_documents() -> Vec<Document> {
    MONSTER_ROWS
        .iter()
        .map(|(name, height, scariness)| monster(name, *height, *scariness))
        .collect()
}

/// Finds a stored monster by name.
///
/// # Panics
///
/// Panics if no document has that name.
pub fn find_named<'a>(docs: &'a [Document], name: &str) -> &'a Document {
    docs.iter()
        .find(|doc| doc.get("name").and_then(|v| v.as_str()) == Some(name))
        .unwrap_or_else(|| panic!("no monster named {name}"))
}

/// Sorted `name` fields of `docs`.
pub fn names(docs: &[Document]) -> Vec<String> {
    let mut names: Vec<String> = docs
        .iter()
        .filter_map(|doc| doc.get("name").and_then(|v| v.as_str()).map(str::to_string))
        .collect();
    names.sort();
    names
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A database with the monsters table populated from [`MONSTER_ROWS`].
    pub async fn populated() -> (TestDatabase, VersionedTable<MemoryStore>, Vec<Document>) {
        let db = TestDatabase::memory();
        let table = db.monsters().await;
        let mut stored = Vec::with_capacity(MONSTER_ROWS.len());
        for doc in monster_documents() {
            stored.push(
                table
                    .create(doc, None)
                    .await
                    .expect("Failed to create monster"),
            );
        }
        (db, table, stored)
    }
}
