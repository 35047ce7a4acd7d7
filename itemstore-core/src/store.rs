//! The revisioned store interface.
//!
//! This module provides the two layers callers interact with:
//!
//! - [`RawItemStore`] - object-safe trait implemented once per backend kind. Payloads travel
//!   as BSON [`Document`]s so that one trait object can serve any record type.
//! - [`ItemStore`] - typed wrapper bound to a concrete [`Record`] type, converting payloads
//!   on the way in and out.
//!
//! # Example
//!
//! ```ignore
//! use itemstore::prelude::*;
//!
//! let notes: ItemStore<Note> = registry.open("memory", "notes").await?;
//!
//! let info = notes.add(&Note { title: "a".into(), body: "b".into() }).await?;
//! let info = notes.update(&info.id, &Note { title: "a".into(), body: "c".into() }).await?;
//! assert_eq!(info.rev, 2);
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt::Debug, marker::PhantomData};

use crate::{
    document::{Record, RecordExt},
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    revision::{AuthorId, ItemId, ItemInfo, Revision},
    shape::RecordShape,
};

/// Revisioned CRUD over untyped payload documents.
///
/// # Contract
///
/// - `add` creates revision 1 and leaves nothing behind on failure.
/// - `update` archives the current revision and writes revision `n + 1`; it never skips or
///   reuses revision numbers and keeps the item id.
/// - `get_info` returns the same metadata as `get` without fetching the payload.
/// - `delete` removes the item and its history, and succeeds if the item is already gone.
/// - Operations on unknown ids return [`ItemStoreError::ItemNotFound`].
#[async_trait]
pub trait RawItemStore: Send + Sync + Debug {
    /// Returns the name of this store.
    fn name(&self) -> &str;

    /// Returns the shape of the payloads this store holds.
    fn shape(&self) -> &RecordShape;

    /// Creates a new item at revision 1.
    async fn add(&self, payload: Document, author: Option<AuthorId>) -> ItemStoreResult<ItemInfo>;

    /// Returns the current payload and metadata of an item.
    async fn get(&self, id: &ItemId) -> ItemStoreResult<(Document, ItemInfo)>;

    /// Returns the current metadata of an item without its payload.
    async fn get_info(&self, id: &ItemId) -> ItemStoreResult<ItemInfo>;

    /// Writes a new revision of an item.
    async fn update(
        &self,
        id: &ItemId,
        payload: Document,
        author: Option<AuthorId>,
    ) -> ItemStoreResult<ItemInfo>;

    /// Deletes an item together with its archived revisions.
    async fn delete(&self, id: &ItemId) -> ItemStoreResult<()>;

    /// Returns every revision of an item, oldest first.
    async fn history(&self, id: &ItemId) -> ItemStoreResult<Vec<Revision<Document>>>;

    /// Returns the number of items with a current revision.
    async fn count(&self) -> ItemStoreResult<u64>;

    /// Returns the metadata of every item whose current payload matches `filter`.
    async fn find(&self, filter: &Filter) -> ItemStoreResult<Vec<ItemInfo>>;
}

/// A store bound to the record type `R`.
#[derive(Debug)]
pub struct ItemStore<R: Record> {
    inner: Box<dyn RawItemStore>,
    _marker: PhantomData<R>,
}

impl<R: Record> ItemStore<R> {
    /// Wraps an untyped store.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Configuration`] if the store was opened for a different shape.
    pub fn new(inner: Box<dyn RawItemStore>) -> ItemStoreResult<Self> {
        let shape = R::shape();

        if inner.shape() != &shape {
            return Err(ItemStoreError::Configuration(format!(
                "store {} holds {}, not {}",
                inner.name(),
                inner.shape().name(),
                shape.name()
            )));
        }

        Ok(Self { inner, _marker: PhantomData })
    }

    /// Returns the name of this store.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the shape of `R` this store was opened with.
    pub fn shape(&self) -> &RecordShape {
        self.inner.shape()
    }

    /// Returns the untyped store underneath.
    pub fn raw(&self) -> &dyn RawItemStore {
        &*self.inner
    }

    /// Creates a new item without author information.
    pub async fn add(&self, payload: &R) -> ItemStoreResult<ItemInfo> {
        self.inner
            .add(payload.to_document()?, None)
            .await
    }

    /// Creates a new item on behalf of `author`.
    pub async fn add_as(&self, payload: &R, author: AuthorId) -> ItemStoreResult<ItemInfo> {
        self.inner
            .add(payload.to_document()?, Some(author))
            .await
    }

    /// Returns the current payload and metadata of an item.
    pub async fn get(&self, id: &ItemId) -> ItemStoreResult<(R, ItemInfo)> {
        let (payload, info) = self.inner.get(id).await?;

        Ok((R::from_document(payload)?, info))
    }

    /// Returns the current metadata of an item.
    pub async fn get_info(&self, id: &ItemId) -> ItemStoreResult<ItemInfo> {
        self.inner.get_info(id).await
    }

    /// Writes a new revision of an item without author information.
    pub async fn update(&self, id: &ItemId, payload: &R) -> ItemStoreResult<ItemInfo> {
        self.inner
            .update(id, payload.to_document()?, None)
            .await
    }

    /// Writes a new revision of an item on behalf of `author`.
    pub async fn update_as(
        &self,
        id: &ItemId,
        payload: &R,
        author: AuthorId,
    ) -> ItemStoreResult<ItemInfo> {
        self.inner
            .update(id, payload.to_document()?, Some(author))
            .await
    }

    /// Deletes an item and its history. Deleting a missing item succeeds.
    pub async fn delete(&self, id: &ItemId) -> ItemStoreResult<()> {
        self.inner.delete(id).await
    }

    /// Returns every revision of an item, oldest first.
    pub async fn history(&self, id: &ItemId) -> ItemStoreResult<Vec<Revision<R>>> {
        self.inner
            .history(id)
            .await?
            .into_iter()
            .map(|revision| revision.try_map(R::from_document))
            .collect()
    }

    /// Returns the number of items in the store.
    pub async fn count(&self) -> ItemStoreResult<u64> {
        self.inner.count().await
    }

    /// Returns the metadata of every item whose current payload has `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Configuration`] if `R` declares no field stored under `key`.
    pub async fn find(&self, key: &str, value: impl Into<Bson>) -> ItemStoreResult<Vec<ItemInfo>> {
        self.shape().require_key(key)?;

        self.inner
            .find(&Filter::eq(key, value))
            .await
    }
}
