//! # revdb Testkit
//!
//! Test utilities for revdb.
//!
//! This crate provides:
//! - Test databases over [`MemoryStore`](revdb_store::MemoryStore)
//! - The monsters fixture table used across the test suites
//! - Property-based test generators using proptest
//! - Helpers for reading subscriptions under a timeout
//! - Log capture for tests via `tracing-subscriber`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use revdb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_monsters() {
//!     let (db, monsters, docs) = scenarios::populated().await;
//!     let werewolf = find_named(&docs, "werewolf");
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod streams;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::streams::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use streams::*;
