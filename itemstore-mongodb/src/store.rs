use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind as MongoErrorKind, WriteFailure},
    options::{ClientOptions, FindOneOptions, FindOptions, IndexOptions},
};
use serde::Deserialize;
use tracing::info;
use itemstore_core::{
    backend::{DocumentBackend, DocumentBackendBuilder},
    collection::DocumentItemStore,
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    registry::StoreFactory,
    schema::{ITEM_ID_KEY, REV_KEY},
    shape::RecordShape,
    store::RawItemStore,
};

use crate::{sanitizer::KeySanitizer, query::MongoFilterTranslator};


/// Connection settings for [`MongoDbBackend`].
///
/// ```ignore
/// let config: MongoDbConfig = bson::deserialize_from_document(doc! { "database": "items" })?;
/// assert_eq!(config.uri, "mongodb://localhost:27017");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MongoDbConfig {
    /// Connection string.
    #[serde(default = "MongoDbConfig::default_uri")]
    pub uri: String,
    /// Database holding one collection per store.
    pub database: String,
}

impl MongoDbConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }

    fn default_uri() -> String {
        "mongodb://localhost:27017".to_string()
    }

    /// # Errors
    ///
    /// Returns [`ItemStoreError::Configuration`] if the uri or the database name is empty.
    pub fn validate(&self) -> ItemStoreResult<()> {
        if self.uri.is_empty() {
            return Err(ItemStoreError::Configuration("MongoDB uri must not be empty".into()));
        }
        if self.database.is_empty() {
            return Err(ItemStoreError::Configuration("MongoDB database name must not be empty".into()));
        }

        Ok(())
    }
}


#[derive(Debug, Clone)]
pub struct MongoDbBackend {
    client: Client,
    database: String,
}

impl MongoDbBackend {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(config: MongoDbConfig) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(config)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&KeySanitizer::sanitize_key(collection_name))
    }

    /// Ensures no two archived copies of one item share a revision number.
    ///
    /// The index is partial: live documents have a null `item_id` and are not covered.
    pub async fn ensure_archive_index(&self, collection: &str) -> ItemStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(doc! { ITEM_ID_KEY: 1, REV_KEY: 1 })
                .options(
                    IndexOptions::builder()
                    .name("item_id_rev".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { ITEM_ID_KEY: { "$type": "objectId" } })
                    .build()
                )
                .build()
            )
            .await
            .map_err(|e| ItemStoreError::backend("create_index", collection, e))?;

        Ok(())
    }
}

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        MongoErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

fn insert_error(collection: &str, err: MongoError) -> ItemStoreError {
    if is_duplicate_key(&err) {
        ItemStoreError::duplicate_key(collection, err)
    } else {
        ItemStoreError::backend("insert_one", collection, err)
    }
}

#[async_trait]
impl DocumentBackend for MongoDbBackend {
    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<ObjectId> {
        let result = self.get_collection(collection)
            .insert_one(KeySanitizer::sanitize_document(&document))
            .await
            .map_err(|e| insert_error(collection, e))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ItemStoreError::backend(
                "insert_one",
                collection,
                format!("unexpected inserted id {}", result.inserted_id),
            ))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.projection = projection.map(MongoFilterTranslator::projection);

        Ok(
            self.get_collection(collection)
                .find_one(MongoFilterTranslator::translate(filter))
                .with_options(options)
                .await
                .map_err(|e| ItemStoreError::backend("find_one", collection, e))?
                .map(KeySanitizer::restore_document)
        )
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> ItemStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.projection = projection.map(MongoFilterTranslator::projection);

        Ok(
            self.get_collection(collection)
                .find(MongoFilterTranslator::translate(filter))
                .with_options(options)
                .await
                .map_err(|e| ItemStoreError::backend("find", collection, e))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(|e| ItemStoreError::backend("find", collection, e))?
                .into_iter()
                .map(KeySanitizer::restore_document)
                .collect()
        )
    }

    async fn count(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoFilterTranslator::translate(filter))
            .await
            .map_err(|e| ItemStoreError::backend("count_documents", collection, e))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> ItemStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .update_one(
                    MongoFilterTranslator::translate(filter),
                    doc! { "$set": KeySanitizer::sanitize_document(&fields) },
                )
                .await
                .map_err(|e| ItemStoreError::backend("update_one", collection, e))?
                .matched_count
        )
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(MongoFilterTranslator::translate(filter))
                .await
                .map_err(|e| ItemStoreError::backend("delete_one", collection, e))?
                .deleted_count
        )
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> ItemStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(MongoFilterTranslator::translate(filter))
                .await
                .map_err(|e| ItemStoreError::backend("delete_many", collection, e))?
                .deleted_count
        )
    }

    async fn shutdown(self) -> ItemStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbBackendBuilder {
    config: MongoDbConfig,
}

impl MongoDbBackendBuilder {
    pub fn new(config: MongoDbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DocumentBackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    async fn build(self) -> ItemStoreResult<Self::Backend> {
        self.config.validate()?;

        let options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| ItemStoreError::Configuration(format!("invalid MongoDB uri: {e}")))?;
        let client = Client::with_options(options)
            .map_err(|e| ItemStoreError::Configuration(format!("cannot create MongoDB client: {e}")))?;

        info!(database = %self.config.database, "Created MongoDB backend");
        Ok(MongoDbBackend::new(client, self.config.database))
    }
}


/// Opens [`DocumentItemStore`]s in one MongoDB database, one collection per store.
#[derive(Debug, Clone)]
pub struct MongoDbStoreFactory {
    backend: MongoDbBackend,
}

impl MongoDbStoreFactory {
    pub fn new(backend: MongoDbBackend) -> Self {
        Self { backend }
    }

    /// Builds a backend from `config` and wraps it.
    pub async fn connect(config: MongoDbConfig) -> ItemStoreResult<Self> {
        Ok(Self::new(MongoDbBackend::builder(config).build().await?))
    }

    pub fn backend(&self) -> &MongoDbBackend {
        &self.backend
    }
}

#[async_trait]
impl StoreFactory for MongoDbStoreFactory {
    async fn open(&self, name: &str, shape: RecordShape) -> ItemStoreResult<Box<dyn RawItemStore>> {
        let store = DocumentItemStore::new(name, shape, self.backend.clone())?;
        self.backend.ensure_archive_index(name).await?;

        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_a_database() {
        let config = MongoDbConfig::new("mongodb://localhost:27017", "");

        assert!(matches!(config.validate(), Err(ItemStoreError::Configuration(_))));
        assert!(MongoDbConfig::new("mongodb://db:27017", "items").validate().is_ok());
    }

    #[test]
    fn config_defaults_the_uri() {
        let config: MongoDbConfig =
            bson::deserialize_from_document(doc! { "database": "items" }).unwrap();

        assert_eq!(config, MongoDbConfig::new("mongodb://localhost:27017", "items"));
    }

    #[tokio::test]
    async fn build_rejects_an_empty_database_before_connecting() {
        let result = MongoDbBackend::builder(MongoDbConfig::new("mongodb://localhost:27017", ""))
            .build()
            .await;

        assert!(matches!(result, Err(ItemStoreError::Configuration(_))));
    }
}
