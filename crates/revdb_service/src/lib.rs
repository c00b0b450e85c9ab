//! # revdb Service
//!
//! CRUD services over revdb tables, with schema validation and live feeds.
//!
//! This crate provides:
//! - [`Crud`] - registers services on a [`Database`](revdb_core::Database)
//! - [`Service`] - create, update, patch, delete, get and find with
//!   client-facing [`ServiceError`]s
//! - [`Schema`] - per-field kind and presence rules
//! - [`LiveFeed`] - an initial result followed by every later change
//!
//! ## Errors
//!
//! Every failure is a [`ServiceError`] with a status code: 400 for bad
//! input (with per-field messages for validation), 404 for missing
//! documents and 500 for everything else. Version conflicts are not
//! errors; writes return [`WriteOutcome`](revdb_core::WriteOutcome).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crud;
mod error;
mod feed;
mod options;
mod schema;
mod service;

pub use crud::Crud;
pub use error::{ServiceError, ServiceResult};
pub use feed::{LiveFeed, ServiceEvent};
pub use options::{table_name, ServiceOptions};
pub use schema::{FieldKind, FieldRule, Mode, Schema, SchemaValidator, REQUIRED};
pub use service::Service;
