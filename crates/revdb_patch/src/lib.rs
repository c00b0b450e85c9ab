//! # revdb Patch
//!
//! Structural JSON patches for revdb documents.
//!
//! This crate provides:
//! - [`Pointer`] - RFC 6901 JSON pointers
//! - [`PatchOp`] and [`Patch`] - RFC 6902 `add`/`remove`/`replace` edits
//! - [`diff`] - compute the patch between two document snapshots, skipping
//!   engine-managed fields ([`AUTO_FIELDS`])
//! - [`apply`] - apply a patch to a document
//! - [`rebase`] - move a pending patch onto a newer base
//!
//! The crate is pure: no I/O, no clocks, no shared state.
//!
//! ## Example
//!
//! ```rust
//! use revdb_patch::{apply, diff};
//! use serde_json::json;
//!
//! let before = json!({"id": "w1", "version": 1, "name": "werewolf", "height": 1.2});
//! let after = json!({"id": "w1", "version": 2, "name": "werewolf", "height": 1.9});
//!
//! let patch = diff(&before, &after);
//! assert_eq!(patch.len(), 1);
//!
//! let patched = apply(&patch, &before).unwrap();
//! assert_eq!(patched["height"], 1.9);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod diff;
mod error;
mod op;
mod pointer;
mod rebase;

pub use apply::{apply, apply_op};
pub use diff::{diff, diff_values, is_auto_field, AUTO_FIELDS};
pub use error::{PatchError, PatchResult};
pub use op::{Patch, PatchOp};
pub use pointer::Pointer;
pub use rebase::rebase;
