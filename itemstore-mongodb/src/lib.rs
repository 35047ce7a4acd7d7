//! MongoDB backend implementation for itemstore.
//!
//! This crate provides a MongoDB-based implementation of the `DocumentBackend` trait, so
//! revisioned item stores can persist their live and archived documents in MongoDB.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! itemstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//! - **Key sanitization** - Payload keys containing `.`, `$` or NUL are escaped transparently
//! - **Archive index** - Each store collection gets a unique partial index on `(item_id, rev)`
//!
//! # Example
//!
//! ```ignore
//! use itemstore::{BackendRegistry, mongodb::{MongoDbConfig, MongoDbStoreFactory}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = MongoDbStoreFactory::connect(
//!         MongoDbConfig::new("mongodb://localhost:27017", "my_database"),
//!     )
//!     .await?;
//!
//!     let mut registry = BackendRegistry::new();
//!     registry.register("mongodb", factory)?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;
pub(crate) mod query;
pub(crate) mod sanitizer;

pub use store::{MongoDbBackend, MongoDbBackendBuilder, MongoDbConfig, MongoDbStoreFactory};
