//! In-memory revisioned item storage.
//!
//! This module provides a store that keeps every revision of every item in a HashMap of
//! revision sequences behind an async-safe read-write lock.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::Document;
use tracing::debug;
use uuid::Uuid;

use itemstore_core::{
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    registry::StoreFactory,
    revision::{AuthorId, ItemId, ItemInfo, Revision},
    shape::RecordShape,
    store::RawItemStore,
};

use crate::evaluator::DocumentEvaluator;

type ItemMap = HashMap<ItemId, Vec<Revision<Document>>>;
type SharedItems = Arc<RwLock<ItemMap>>;


/// Thread-safe in-memory revisioned item store.
///
/// Each item maps to its revisions, oldest first; the last element is the current
/// revision. Updates hold the write lock for the whole read-modify-append, so concurrent
/// updates of one item are applied one after another and never lose a revision.
///
/// # Example
///
/// ```ignore
/// use itemstore_memory::InMemoryItemStore;
///
/// let store = InMemoryItemStore::new("notes", Note::shape())?;
/// let info = store.add(doc! { "title": "a" }, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryItemStore {
    name: String,
    shape: RecordShape,
    items: SharedItems,
}

impl InMemoryItemStore {
    /// Creates an empty store for payloads of `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidShape`] if the shape cannot be stored.
    pub fn new(name: impl Into<String>, shape: RecordShape) -> ItemStoreResult<Self> {
        Self::with_items(name, shape, SharedItems::default())
    }

    fn with_items(name: impl Into<String>, shape: RecordShape, items: SharedItems) -> ItemStoreResult<Self> {
        shape.validate()?;

        Ok(Self {
            name: name.into(),
            shape,
            items,
        })
    }

    fn not_found(&self, id: &ItemId) -> ItemStoreError {
        ItemStoreError::ItemNotFound(id.to_string(), self.name.clone())
    }

    fn check_payload(&self, payload: &Document) -> ItemStoreResult<()> {
        self.shape
            .check_keys(payload.keys().map(String::as_str))
    }
}

#[async_trait]
impl RawItemStore for InMemoryItemStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &RecordShape {
        &self.shape
    }

    async fn add(&self, payload: Document, author: Option<AuthorId>) -> ItemStoreResult<ItemInfo> {
        self.check_payload(&payload)?;

        let info = ItemInfo::first(ItemId::new(Uuid::now_v7().to_string()), author);
        self.items
            .write()
            .await
            .insert(info.id.clone(), vec![Revision::new(info.clone(), payload)]);

        debug!(store = %self.name, id = %info.id, rev = info.rev, "Added item");
        Ok(info)
    }

    async fn get(&self, id: &ItemId) -> ItemStoreResult<(Document, ItemInfo)> {
        let items = self.items.read().await;
        let current = items
            .get(id)
            .and_then(|revisions| revisions.last())
            .ok_or_else(|| self.not_found(id))?;

        debug!(store = %self.name, %id, rev = current.info.rev, "Got item");
        Ok((current.payload.clone(), current.info.clone()))
    }

    async fn get_info(&self, id: &ItemId) -> ItemStoreResult<ItemInfo> {
        let info = self
            .items
            .read()
            .await
            .get(id)
            .and_then(|revisions| revisions.last())
            .map(|current| current.info.clone())
            .ok_or_else(|| self.not_found(id))?;

        debug!(store = %self.name, %id, rev = info.rev, "Got item info");
        Ok(info)
    }

    async fn update(
        &self,
        id: &ItemId,
        payload: Document,
        author: Option<AuthorId>,
    ) -> ItemStoreResult<ItemInfo> {
        self.check_payload(&payload)?;

        let mut items = self.items.write().await;
        let revisions = items
            .get_mut(id)
            .ok_or_else(|| self.not_found(id))?;
        let next = revisions
            .last()
            .map(|current| current.info.next(author))
            .ok_or_else(|| self.not_found(id))?;

        revisions.push(Revision::new(next.clone(), payload));

        debug!(store = %self.name, %id, rev = next.rev, "Updated item");
        Ok(next)
    }

    async fn delete(&self, id: &ItemId) -> ItemStoreResult<()> {
        let removed = self
            .items
            .write()
            .await
            .remove(id)
            .map_or(0, |revisions| revisions.len());

        debug!(store = %self.name, %id, revisions = removed, "Deleted item");
        Ok(())
    }

    async fn history(&self, id: &ItemId) -> ItemStoreResult<Vec<Revision<Document>>> {
        self.items
            .read()
            .await
            .get(id)
            .filter(|revisions| !revisions.is_empty())
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    async fn count(&self) -> ItemStoreResult<u64> {
        Ok(self.items.read().await.len() as u64)
    }

    async fn find(&self, filter: &Filter) -> ItemStoreResult<Vec<ItemInfo>> {
        for clause in filter.clauses() {
            let key = clause.path.first().map(String::as_str).unwrap_or_default();
            self.shape.require_key(key)?;
        }

        let items = self.items.read().await;
        let mut found = items
            .values()
            .filter_map(|revisions| revisions.last())
            .filter(|current| DocumentEvaluator::new(&current.payload).matches(filter))
            .map(|current| current.info.clone())
            .collect::<Vec<_>>();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(found)
    }
}


/// Opens [`InMemoryItemStore`]s. Stores opened under the same name share their items,
/// so every reopen must use the shape the name was first opened with.
#[derive(Debug, Default)]
pub struct InMemoryStoreFactory {
    stores: RwLock<HashMap<String, (RecordShape, SharedItems)>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreFactory for InMemoryStoreFactory {
    async fn open(&self, name: &str, shape: RecordShape) -> ItemStoreResult<Box<dyn RawItemStore>> {
        shape.validate()?;

        let items = match self.stores.write().await.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let (opened, items) = entry.get();
                if *opened != shape {
                    return Err(ItemStoreError::Configuration(format!(
                        "store {name} holds {} records, cannot open it for {}",
                        opened.name(),
                        shape.name()
                    )));
                }
                items.clone()
            }
            Entry::Vacant(entry) => entry
                .insert((shape.clone(), SharedItems::default()))
                .1
                .clone(),
        };

        Ok(Box::new(InMemoryItemStore::with_items(name, shape, items)?))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use itemstore_core::shape::{FieldDescriptor, FieldType, ShapeKind};

    fn shape() -> RecordShape {
        RecordShape::builder("Counter", ShapeKind::Record)
            .field(FieldDescriptor::new("n", FieldType::Int))
            .build()
    }

    #[tokio::test]
    async fn updates_append_revisions() {
        let store = InMemoryItemStore::new("counters", shape()).unwrap();

        let info = store.add(doc! { "n": 0_i64 }, None).await.unwrap();
        for n in 1..=3_i64 {
            store.update(&info.id, doc! { "n": n }, None).await.unwrap();
        }

        let history = store.history(&info.id).await.unwrap();
        let revs: Vec<u64> = history.iter().map(|r| r.info.rev).collect();
        assert_eq!(revs, vec![1, 2, 3, 4]);
        assert_eq!(history[3].payload, doc! { "n": 3_i64 });
        assert!(history.iter().all(|r| r.info.id == info.id));
    }

    #[tokio::test]
    async fn rejects_undeclared_keys() {
        let store = InMemoryItemStore::new("counters", shape()).unwrap();

        let err = store
            .add(doc! { "n": 1_i64, "extra": true }, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ItemStoreError::Serialization(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_shapes_never_open() {
        let shape = RecordShape::builder("Empty", ShapeKind::Record).build();

        assert!(matches!(
            InMemoryItemStore::new("empty", shape),
            Err(ItemStoreError::InvalidShape { .. })
        ));
    }

    #[tokio::test]
    async fn factory_shares_items_by_store_name() {
        let factory = InMemoryStoreFactory::new();

        let first = factory.open("counters", shape()).await.unwrap();
        let info = first.add(doc! { "n": 1_i64 }, None).await.unwrap();

        let second = factory.open("counters", shape()).await.unwrap();
        assert_eq!(second.get_info(&info.id).await.unwrap(), info);

        let other = factory.open("others", shape()).await.unwrap();
        assert!(other.get_info(&info.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn factory_rejects_a_second_shape_under_one_name() {
        let factory = InMemoryStoreFactory::new();
        let first = factory.open("counters", shape()).await.unwrap();
        first.add(doc! { "n": 1_i64 }, None).await.unwrap();

        let labels = RecordShape::builder("Label", ShapeKind::Record)
            .field(FieldDescriptor::new("name", FieldType::String))
            .build();
        let err = factory.open("counters", labels.clone()).await.unwrap_err();

        assert!(matches!(err, ItemStoreError::Configuration(_)));
        assert!(factory.open("labels", labels).await.is_ok());
        assert!(factory.open("counters", shape()).await.is_ok());
    }
}
