//! Revisioned item storage with pluggable backends.
//!
//! This crate is the core of the itemstore project and provides:
//!
//! - **Record shapes** ([`shape`]) - Static descriptions of payload types and the rules they must satisfy
//! - **Records** ([`document`]) - The trait payload types implement and their BSON conversion
//! - **Revision model** ([`revision`]) - Item ids, revision metadata and snapshots
//! - **Store interface** ([`store`]) - Untyped and typed revisioned stores
//! - **Backend registry** ([`registry`]) - Named store factories
//! - **Document layout** ([`schema`]) - How items and their history are laid out in a document database
//! - **Document backends** ([`backend`]) - The operations a document database has to offer
//! - **Document item store** ([`collection`]) - The revisioned store built on those operations
//! - **Filters** ([`query`]) - Key-equality filters
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use itemstore::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! pub struct Note {
//!     pub title: String,
//!     pub body: String,
//! }
//!
//! let notes: ItemStore<Note> = registry.open("memory", "notes").await?;
//! let info = notes.add(&Note { title: "hello".into(), body: "world".into() }).await?;
//! assert_eq!(info.rev, 1);
//! ```

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod query;
pub mod registry;
pub mod revision;
pub mod schema;
pub mod shape;
pub mod store;
#[cfg(feature = "testkit")]
pub mod testkit;
