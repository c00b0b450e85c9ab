//! # revdb Core
//!
//! Versioned documents with an operation log, optimistic concurrency and
//! live change streams.
//!
//! This crate provides:
//! - [`Database`] - registers versioned tables over a [`DocumentStore`]
//! - [`VersionedTable`] - create, patch, update and delete with expected
//!   versions, returning [`WriteOutcome::Conflict`] when a writer is behind
//! - [`OperationLog`] - the append-only history of every mutation
//! - [`ConflictResolver`] - the operations a stale writer missed
//! - [`Subscription`] - document and query change streams as [`ChangeEvent`]s
//! - [`FindOptions`] - declarative index lookups and ranges
//! - [`Replica`] and [`ReplicaSet`] - client-side synced copies that rebase
//!   pending edits after a conflict
//! - [`TypedTable`] - the same table API over serde types
//!
//! ## Versioning
//!
//! A document starts at version 1 and every accepted mutation increments
//! it by one. For each transition `v -> v+1` the log holds exactly one
//! operation with `version == v`, so the log replays the document.
//!
//! ## Example
//!
//! ```rust,ignore
//! use revdb_core::{Database, Document, WriteOutcome};
//! use revdb_store::{MemoryStore, TableSpec};
//!
//! let db = Database::new(MemoryStore::new());
//! let monsters = db.register(TableSpec::new("monsters")).await?;
//!
//! let wolf = monsters
//!     .create(Document::new().with("name", "werewolf").with("height", 1.2), None)
//!     .await?;
//!
//! let mut changed = wolf.clone();
//! changed.insert("height", 1.9);
//! match monsters.update(changed, Some("alice")).await? {
//!     WriteOutcome::Applied { document } => assert_eq!(document.version(), Some(2)),
//!     WriteOutcome::Conflict(conflict) => println!("missed {} ops", conflict.ops.len()),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_stream;
mod config;
mod conflict;
mod database;
mod document;
mod error;
mod operation;
mod oplog;
mod query;
mod replica;
mod table;
mod typed;
mod validate;

pub use change_stream::{ChangeEvent, Subscription};
pub use config::Config;
pub use conflict::{Conflict, ConflictResolver, WriteOutcome};
pub use database::Database;
pub use document::{format_timestamp, Document};
pub use error::{CoreError, CoreResult};
pub use operation::{Operation, OperationKind};
pub use oplog::{OperationLog, DOCID_INDEX, DOCID_VERSION_INDEX};
pub use query::FindOptions;
pub use replica::{Applied, Replica, ReplicaSet};
pub use table::VersionedTable;
pub use typed::{TypedOutcome, TypedTable, Versioned};
pub use validate::{ValidationErrors, Validator};

pub use revdb_patch::{is_auto_field, Patch, PatchOp, Pointer};
pub use revdb_store::{BoundKind, DocumentStore, IndexSpec, MemoryStore, TableSpec};
