//! In-process document backend.
//!
//! [`InMemoryDocumentBackend`] keeps collections of BSON documents in memory and behaves
//! like a document database towards [`DocumentItemStore`]: it assigns object ids on insert,
//! evaluates filters, and projects top-level keys. It runs the document store code paths
//! without a database server.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};

use itemstore_core::{
    backend::{DocumentBackend, DocumentBackendBuilder},
    collection::DocumentItemStore,
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    registry::StoreFactory,
    schema::ID_KEY,
    shape::RecordShape,
    store::RawItemStore,
};

use crate::evaluator::DocumentEvaluator;

type StoreMap = HashMap<String, Vec<Document>>;


/// Thread-safe in-memory document backend.
///
/// `InMemoryDocumentBackend` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same collections. Every call takes the lock once, which makes each
/// single-document operation atomic.
///
/// Queries scan the whole collection.
///
/// # Example
///
/// ```ignore
/// use itemstore_memory::InMemoryDocumentBackend;
/// use itemstore_core::{backend::DocumentBackend, query::Filter};
/// use bson::doc;
///
/// let backend = InMemoryDocumentBackend::new();
/// let id = backend.insert_one("notes", doc! { "title": "a" }).await?;
/// let found = backend.find_one("notes", &Filter::eq("_id", id), None).await?;
/// assert!(found.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryDocumentBackend {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryDocumentBackend {
    /// Creates a new backend with no collections.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryDocumentBackend`.
    pub fn builder() -> InMemoryDocumentBackendBuilder {
        InMemoryDocumentBackendBuilder
    }

    /// Returns a copy of every document in `collection`, in insertion order.
    pub async fn dump(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn project(document: &Document, projection: Option<&[&str]>) -> Document {
    match projection {
        Some(keys) => document
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        None => document.clone(),
    }
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentBackend {
    async fn insert_one(&self, collection: &str, mut document: Document) -> ItemStoreResult<ObjectId> {
        let id = match document.get(ID_KEY) {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(ItemStoreError::backend(
                    "insert_one",
                    collection,
                    format!("unsupported {ID_KEY} value {other}"),
                ));
            }
            None => {
                let id = ObjectId::new();
                let mut with_id = Document::new();
                with_id.insert(ID_KEY, id);
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                document = with_id;
                id
            }
        };

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let duplicate = Filter::eq(ID_KEY, id);
        if DocumentEvaluator::filter_documents(documents.iter(), &duplicate)
            .next()
            .is_some()
        {
            return Err(ItemStoreError::duplicate_key(
                collection,
                format!("{ID_KEY} {id} already exists"),
            ));
        }

        documents.push(document);

        Ok(id)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        Ok(
            DocumentEvaluator::filter_documents(documents, filter)
                .next()
                .map(|document| project(document, projection))
        )
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        Ok(
            DocumentEvaluator::filter_documents(documents, filter)
                .map(|document| project(document, projection))
                .collect()
        )
    }

    async fn count(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        let store = self.store.read().await;

        Ok(
            store
                .get(collection)
                .map_or(0, |documents| {
                    DocumentEvaluator::filter_documents(documents, filter).count()
                }) as u64
        )
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> ItemStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match documents
            .iter_mut()
            .find(|document| DocumentEvaluator::new(document).matches(filter))
        {
            Some(document) => {
                for (key, value) in fields {
                    document.insert(key, value);
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match documents
            .iter()
            .position(|document| DocumentEvaluator::new(document).matches(filter))
        {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|document| !DocumentEvaluator::new(document).matches(filter));

        Ok((before - documents.len()) as u64)
    }
}


/// Builder for constructing [`InMemoryDocumentBackend`] instances.
#[derive(Default)]
pub struct InMemoryDocumentBackendBuilder;

#[async_trait]
impl DocumentBackendBuilder for InMemoryDocumentBackendBuilder {
    type Backend = InMemoryDocumentBackend;

    /// Builds and returns a new, empty [`InMemoryDocumentBackend`].
    async fn build(self) -> ItemStoreResult<Self::Backend> {
        Ok(InMemoryDocumentBackend::new())
    }
}


/// Opens [`DocumentItemStore`]s over one shared [`InMemoryDocumentBackend`].
///
/// Each store keeps its documents in the collection named after it.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStoreFactory {
    backend: InMemoryDocumentBackend,
}

impl InMemoryDocumentStoreFactory {
    pub fn new(backend: InMemoryDocumentBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &InMemoryDocumentBackend {
        &self.backend
    }
}

#[async_trait]
impl StoreFactory for InMemoryDocumentStoreFactory {
    async fn open(&self, name: &str, shape: RecordShape) -> ItemStoreResult<Box<dyn RawItemStore>> {
        Ok(Box::new(DocumentItemStore::new(name, shape, self.backend.clone())?))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn assigns_ids_first() {
        let backend = InMemoryDocumentBackend::new();

        let id = backend
            .insert_one("things", doc! { "a": 1 })
            .await
            .unwrap();

        let stored = backend.dump("things").await;
        assert_eq!(stored, vec![doc! { "_id": id, "a": 1 }]);
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let backend = InMemoryDocumentBackend::new();
        let id = ObjectId::new();

        backend.insert_one("things", doc! { "_id": id }).await.unwrap();
        let err = backend
            .insert_one("things", doc! { "_id": id })
            .await
            .unwrap_err();

        assert!(matches!(err, ItemStoreError::DuplicateKey { ref target, .. } if target == "things"));
    }

    #[tokio::test]
    async fn projects_requested_keys() {
        let backend = InMemoryDocumentBackend::new();
        let id = backend
            .insert_one("things", doc! { "a": 1, "b": 2 })
            .await
            .unwrap();

        let found = backend
            .find_one("things", &Filter::eq("_id", id), Some(&["_id", "b"][..]))
            .await
            .unwrap();

        assert_eq!(found, Some(doc! { "_id": id, "b": 2 }));
    }

    #[tokio::test]
    async fn updates_set_fields_on_the_first_match() {
        let backend = InMemoryDocumentBackend::new();
        let id = backend
            .insert_one("things", doc! { "rev": 1_i64, "data": { "a": 1 } })
            .await
            .unwrap();

        let guard = Filter::eq("_id", id).and_eq("rev", 1_i64);
        assert_eq!(
            backend.update_one("things", &guard, doc! { "rev": 2_i64 }).await.unwrap(),
            1
        );
        assert_eq!(
            backend.update_one("things", &guard, doc! { "rev": 3_i64 }).await.unwrap(),
            0
        );

        let found = backend
            .find_one("things", &Filter::eq("_id", id), None)
            .await
            .unwrap();
        assert_eq!(found, Some(doc! { "_id": id, "rev": 2_i64, "data": { "a": 1 } }));
    }

    #[tokio::test]
    async fn deletes_tolerate_missing_collections() {
        let backend = InMemoryDocumentBackend::new();

        assert_eq!(backend.delete_one("nothing", &Filter::new()).await.unwrap(), 0);
        assert_eq!(backend.delete_many("nothing", &Filter::new()).await.unwrap(), 0);
        assert_eq!(backend.count("nothing", &Filter::new()).await.unwrap(), 0);
    }
}
