//! In-memory storage backends for itemstore.
//!
//! This crate provides two thread-safe, in-process store kinds:
//!
//! - [`InMemoryItemStore`] keeps each item's revisions as a sequence in a HashMap. It is the
//!   simplest complete store and is ideal for development and testing.
//! - [`InMemoryDocumentBackend`] behaves like a document database and is used through
//!   [`DocumentItemStore`](itemstore_core::collection::DocumentItemStore), so the document
//!   layout and update protocol can be exercised without a database server.
//!
//! Both use async-aware read-write locks for concurrent access.
//!
//! # Quick Start
//!
//! ```ignore
//! use itemstore::prelude::*;
//! use itemstore::memory::InMemoryStoreFactory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = BackendRegistry::new();
//!     registry.register("memory", InMemoryStoreFactory::new())?;
//!
//!     let notes: ItemStore<Note> = registry.open("memory", "notes").await?;
//!     let info = notes.add(&Note { title: "a".into() }).await?;
//!     assert_eq!(info.rev, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod evaluator;
pub mod store;

pub use document::{InMemoryDocumentBackend, InMemoryDocumentBackendBuilder, InMemoryDocumentStoreFactory};
pub use store::{InMemoryItemStore, InMemoryStoreFactory};
