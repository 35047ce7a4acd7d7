//! Runs against a live server: `ITEMSTORE_MONGODB_URI=... cargo test -- --ignored`.

use bson::{doc, oid::ObjectId};
use itemstore_core::{
    backend::DocumentBackend,
    document::Record,
    error::ItemStoreError,
    query::Filter,
    registry::BackendRegistry,
    schema::ITEM_ID_KEY,
    testkit::{Sample, exercise_store},
};
use itemstore_mongodb::{MongoDbConfig, MongoDbStoreFactory};

const NEEDS_SERVER: &str = "needs a MongoDB server in ITEMSTORE_MONGODB_URI";

async fn factory() -> MongoDbStoreFactory {
    let uri = std::env::var("ITEMSTORE_MONGODB_URI").expect(NEEDS_SERVER);
    let database = format!("itemstore_test_{}", ObjectId::new().to_hex());

    MongoDbStoreFactory::connect(MongoDbConfig::new(uri, database))
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "needs a MongoDB server in ITEMSTORE_MONGODB_URI"]
async fn mongodb_store_conforms() {
    let factory = factory().await;
    let mut registry = BackendRegistry::new();
    registry.register("mongodb", factory.clone()).unwrap();

    let store = registry
        .open::<Sample>("mongodb", "samples")
        .await
        .unwrap();
    exercise_store(&store).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a MongoDB server in ITEMSTORE_MONGODB_URI"]
async fn archived_copies_are_removed_with_their_item() {
    let factory = factory().await;
    let mut registry = BackendRegistry::new();
    registry.register("mongodb", factory.clone()).unwrap();
    let store = registry
        .open::<Sample>("mongodb", "archives")
        .await
        .unwrap();
    let t = itemstore_core::revision::now();

    let added = store.add(&Sample::new(1, "a.b", t)).await.unwrap();
    store.update(&added.id, &Sample::new(2, "$c", t)).await.unwrap();
    store.update(&added.id, &Sample::new(3, "d", t)).await.unwrap();

    let item = ObjectId::parse_str(added.id.as_str()).unwrap();
    let backend = factory.backend();
    assert_eq!(
        backend
            .count("archives", &Filter::eq(ITEM_ID_KEY, item))
            .await
            .unwrap(),
        2
    );

    let history = store.history(&added.id).await.unwrap();
    let strings: Vec<&str> = history.iter().map(|r| r.payload.s.as_str()).collect();
    assert_eq!(strings, vec!["a.b", "$c", "d"]);

    store.delete(&added.id).await.unwrap();
    assert_eq!(backend.count("archives", &Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "needs a MongoDB server in ITEMSTORE_MONGODB_URI"]
async fn archive_index_rejects_duplicate_revisions() {
    let factory = factory().await;
    let backend = factory.backend();
    backend.ensure_archive_index("dupes").await.unwrap();

    let item = ObjectId::new();
    let archived = doc! { ITEM_ID_KEY: item, "rev": 1_i64, "data": Sample::shape().name() };

    backend.insert_one("dupes", archived.clone()).await.unwrap();
    assert!(matches!(
        backend.insert_one("dupes", archived).await,
        Err(ItemStoreError::DuplicateKey { .. })
    ));
}

#[tokio::test]
#[ignore = "needs a MongoDB server in ITEMSTORE_MONGODB_URI"]
async fn an_already_archived_revision_is_a_revision_conflict() {
    let factory = factory().await;
    let mut registry = BackendRegistry::new();
    registry.register("mongodb", factory.clone()).unwrap();
    let store = registry
        .open::<Sample>("mongodb", "raced")
        .await
        .unwrap();
    let t = itemstore_core::revision::now();

    let added = store.add(&Sample::new(1, "a", t)).await.unwrap();
    let item = ObjectId::parse_str(added.id.as_str()).unwrap();
    factory
        .backend()
        .insert_one("raced", doc! { ITEM_ID_KEY: item, "rev": 1_i64 })
        .await
        .unwrap();

    let err = store
        .update(&added.id, &Sample::new(2, "b", t))
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::RevisionConflict { expected: 1, .. }));
    assert_eq!(store.get_info(&added.id).await.unwrap().rev, 1);
}
