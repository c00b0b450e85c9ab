//! # revdb Store
//!
//! The persistent store revdb sits on, described at its interface.
//!
//! This crate provides:
//! - [`DocumentStore`] - async trait for point reads, inserts, guarded
//!   writes, indexed queries and changefeeds
//! - [`Query`], [`Selection`] and [`Key`] - store-level query descriptions
//!   with a total key ordering including [`Key::MinVal`]/[`Key::MaxVal`]
//! - [`Changefeed`] - a cancellable per-subscriber stream of [`RawChange`]s
//! - [`MemoryStore`] - an in-process implementation for tests and embedding
//!
//! ## Design Principles
//!
//! - The store is the only arbiter of concurrent writes: guarded writes
//!   compare `(id, version)` and write atomically
//! - Every call is async; nothing blocks the caller's runtime
//! - Changefeeds are owned by one subscriber and closed exactly once
//!
//! ## Example
//!
//! ```rust,ignore
//! use revdb_store::{DocumentStore, MemoryStore, Query, TableSpec, IndexSpec, Key};
//!
//! let store = MemoryStore::new();
//! store.create_table(&TableSpec::new("monsters").index(IndexSpec::field("height"))).await?;
//! let rows = store
//!     .query(&Query::table("monsters").between("height", Key::from(14u64), Key::MaxVal))
//!     .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod changefeed;
mod config;
mod error;
mod key;
mod memory;
mod query;

pub use backend::{DocumentStore, WriteResult};
pub use changefeed::{changefeed, Changefeed, ChangefeedSink, RawChange};
pub use config::MemoryStoreConfig;
pub use error::{StoreError, StoreResult};
pub use key::Key;
pub use memory::MemoryStore;
pub use query::{
    BoundKind, IndexSpec, Query, Row, Selection, TableSpec, VersionGuard, PRIMARY_INDEX,
};
