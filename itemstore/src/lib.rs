//! Main itemstore crate providing revision-tracked storage of typed records.
//!
//! This crate is the primary entry point for users of the itemstore framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the storage backends.
//!
//! # Features
//!
//! - **Typed records** - Define payloads with Serde and `#[derive(Record)]`; their shape is
//!   checked once when a store is opened
//! - **Revision history** - Every update keeps the previous revision; ids never change
//! - **Pluggable backends** - Backends register under a name in a [`BackendRegistry`]
//!
//! # Quick Start
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
//! #[tokio::main]
//! async fn main() -> ItemStoreResult<()> {
//!     let mut registry = BackendRegistry::new();
//!     itemstore::register_defaults(&mut registry)?;
//!
//!     let notes: ItemStore<Note> = registry.open("memory", "notes").await?;
//!
//!     let info = notes
//!         .add(&Note { title: "hello".into(), body: "world".into() })
//!         .await?;
//!     let info = notes
//!         .update_as(&info.id, &Note { title: "hello".into(), body: "again".into() }, AuthorId::from("alice"))
//!         .await?;
//!     assert_eq!(info.rev, 2);
//!
//!     let (note, _) = notes.get(&info.id).await?;
//!     assert_eq!(note.body, "again");
//!     assert_eq!(notes.history(&info.id).await?.len(), 2);
//!
//!     notes.delete(&info.id).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory stores for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as itemstore;

pub mod prelude;

pub use itemstore_core::{
    backend, collection, document, error, query, registry, revision, schema, shape, store,
};
pub use itemstore_core::{
    document::Record,
    error::{ItemStoreError, ItemStoreResult},
    registry::{BackendRegistry, StoreFactory},
    store::ItemStore,
};
pub use itemstore_macros::Record;

// Re-export BSON and chrono types for convenience
pub use bson;
pub use chrono;

use tracing::debug;

/// Name of the in-memory revisioned store backend.
pub const MEMORY_BACKEND: &str = "memory";
/// Name of the in-process document backend.
pub const MEMORY_DOCUMENT_BACKEND: &str = "memory-document";

/// Registers the in-process backends: [`MEMORY_BACKEND`] and [`MEMORY_DOCUMENT_BACKEND`].
///
/// # Errors
///
/// Returns [`ItemStoreError::DuplicateBackend`] if either name is already taken.
pub fn register_defaults(registry: &mut BackendRegistry) -> ItemStoreResult<()> {
    registry.register(MEMORY_BACKEND, memory::InMemoryStoreFactory::new())?;
    registry.register(MEMORY_DOCUMENT_BACKEND, memory::InMemoryDocumentStoreFactory::default())?;

    debug!("Registered default backends");
    Ok(())
}

/// In-memory storage backend implementations.
pub mod memory {
    pub use itemstore_memory::{
        InMemoryDocumentBackend, InMemoryDocumentBackendBuilder, InMemoryDocumentStoreFactory,
        InMemoryItemStore, InMemoryStoreFactory,
    };
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use itemstore_mongodb::{MongoDbBackend, MongoDbBackendBuilder, MongoDbConfig, MongoDbStoreFactory};
}
