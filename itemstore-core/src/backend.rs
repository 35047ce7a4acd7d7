//! Document backend abstraction for document-database item stores.
//!
//! This module defines the narrow capability a document database has to offer for
//! [`DocumentItemStore`](crate::collection::DocumentItemStore) to keep revisioned items in
//! it. Connection setup, retries and credentials stay with the implementation; the store
//! only needs a handful of single-collection document operations.
//!
//! # Overview
//!
//! - [`DocumentBackend`]: insert, find, update and delete documents by key-equality
//!   [`Filter`]s.
//! - [`DocumentBackendBuilder`]: factory trait for creating backend instances.
//!
//! # Examples
//!
//! ```ignore
//! use itemstore_core::{backend::DocumentBackend, query::Filter};
//! use bson::doc;
//!
//! let id = backend.insert_one("notes", doc! { "rev": 1_i64 }).await?;
//! let found = backend.find_one("notes", &Filter::eq("_id", id), None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::{fmt::Debug, sync::Arc};

use crate::{error::ItemStoreResult, query::Filter};

/// Abstract interface for document databases backing revisioned item stores.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access from multiple async
/// tasks. Each call must be atomic on the single document it touches; nothing more is
/// assumed.
///
/// # Error Handling
///
/// Driver failures are reported as [`ItemStoreError::Backend`](crate::error::ItemStoreError::Backend)
/// with the operation name and collection. An insert rejected by a unique constraint is
/// reported as [`ItemStoreError::DuplicateKey`](crate::error::ItemStoreError::DuplicateKey).
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    /// Inserts a document and returns the identity the backend assigned to it.
    ///
    /// If the document already carries an `_id`, that identity is kept.
    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<ObjectId>;

    /// Returns the first document matching `filter`, if any.
    ///
    /// With a `projection`, only the listed top-level keys are returned.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Option<Document>>;

    /// Returns every document matching `filter`, in no particular order.
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Vec<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64>;

    /// Sets `fields` on the first document matching `filter`.
    ///
    /// Returns the number of matched documents (0 or 1). Fields not listed are left as
    /// they are.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> ItemStoreResult<u64>;

    /// Deletes the first document matching `filter` and returns how many were deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64>;

    /// Deletes every document matching `filter` and returns how many were deleted.
    /// Zero matches is not an error.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections should override it.
    async fn shutdown(self) -> ItemStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> DocumentBackend for &B
where
    B: DocumentBackend,
{
    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<ObjectId> {
        (*self).insert_one(collection, document).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Option<Document>> {
        (*self)
            .find_one(collection, filter, projection)
            .await
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Vec<Document>> {
        (*self)
            .find_many(collection, filter, projection)
            .await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (*self).count(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> ItemStoreResult<u64> {
        (*self)
            .update_one(collection, filter, fields)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (*self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (*self).delete_many(collection, filter).await
    }
}

#[async_trait]
impl<B> DocumentBackend for Arc<B>
where
    B: DocumentBackend,
{
    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<ObjectId> {
        (**self).insert_one(collection, document).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Option<Document>> {
        (**self)
            .find_one(collection, filter, projection)
            .await
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Vec<Document>> {
        (**self)
            .find_many(collection, filter, projection)
            .await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> ItemStoreResult<u64> {
        (**self)
            .update_one(collection, filter, fields)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }
}

#[async_trait]
pub trait DocumentBackendBuilder {
    type Backend: DocumentBackend;

    async fn build(self) -> ItemStoreResult<Self::Backend>;
}
