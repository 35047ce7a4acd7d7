//! Convenient re-exports of commonly used types from itemstore.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use itemstore::prelude::*;
//! ```
//!
//! This provides access to:
//! - The `Record` trait and derive macro
//! - Typed and untyped stores and the backend registry
//! - Revision metadata
//! - Error types

pub use itemstore_core::{
    store::{ItemStore, RawItemStore},
    document::{Record, RecordExt},
    registry::{BackendRegistry, StoreFactory},
    revision::{AuthorId, ItemId, ItemInfo, Revision},
    shape::{FieldDescriptor, FieldType, RecordShape, ShapeKind},
    query::Filter,
    error::{ErrorKind, ItemStoreError, ItemStoreResult},
};
pub use itemstore_macros::Record;
