use chrono::{DateTime, Utc};
use itemstore::{
    MEMORY_BACKEND, MEMORY_DOCUMENT_BACKEND,
    memory::InMemoryStoreFactory,
    prelude::*,
};
use itemstore_core::testkit::{Sample, exercise_store};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub title: String,
    pub story_points: i64,
    pub due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Unstorable(pub String);

fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    itemstore::register_defaults(&mut registry).unwrap();
    registry
}

#[tokio::test]
async fn every_default_backend_conforms() {
    let registry = registry();

    for backend in [MEMORY_BACKEND, MEMORY_DOCUMENT_BACKEND] {
        let store = registry
            .open::<Sample>(backend, "samples")
            .await
            .unwrap();
        exercise_store(&store).await.unwrap();
    }
}

#[tokio::test]
async fn derived_records_round_trip() {
    let registry = registry();

    for backend in [MEMORY_BACKEND, MEMORY_DOCUMENT_BACKEND] {
        let tickets: ItemStore<Ticket> = registry.open(backend, "tickets").await.unwrap();
        let ticket = Ticket {
            title: "Fix login".into(),
            story_points: 3,
            due: None,
        };

        let info = tickets
            .add_as(&ticket, AuthorId::from("alice"))
            .await
            .unwrap();
        assert_eq!(info.author, Some(AuthorId::from("alice")));

        let estimated = Ticket { story_points: 5, ..ticket.clone() };
        let info = tickets.update(&info.id, &estimated).await.unwrap();
        assert_eq!(info.rev, 2);
        assert_eq!(info.author, None);

        assert_eq!(tickets.get(&info.id).await.unwrap().0, estimated);
        assert_eq!(tickets.find("storyPoints", 5_i64).await.unwrap(), vec![info.clone()]);
        assert!(tickets.find("story_points", 5_i64).await.is_err());

        let history = tickets.history(&info.id).await.unwrap();
        assert_eq!(history[0].payload, ticket);
        assert_eq!(history[1].payload, estimated);

        tickets.delete(&info.id).await.unwrap();
    }
}

#[tokio::test]
async fn stores_with_one_name_share_items() {
    let registry = registry();

    let first: ItemStore<Ticket> = registry.open(MEMORY_BACKEND, "shared").await.unwrap();
    let second: ItemStore<Ticket> = registry.open(MEMORY_BACKEND, "shared").await.unwrap();

    let info = first
        .add(&Ticket { title: "a".into(), story_points: 1, due: None })
        .await
        .unwrap();

    assert_eq!(second.get_info(&info.id).await.unwrap(), info);
    assert_eq!(second.name(), "shared");
}

#[tokio::test]
async fn invalid_shapes_are_rejected_before_opening() {
    let registry = registry();

    let err = registry
        .open::<Unstorable>(MEMORY_BACKEND, "bad")
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::InvalidShape { ref shape, .. } if shape == "Unstorable"));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn unknown_backends_cannot_be_opened() {
    let err = registry()
        .open::<Ticket>("postgres", "tickets")
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::UnknownBackend(ref name) if name == "postgres"));
}

#[test]
fn registration_rejects_bad_names() {
    let mut registry = registry();

    assert!(matches!(
        registry.register("", InMemoryStoreFactory::new()),
        Err(ItemStoreError::EmptyBackendName)
    ));
    assert!(matches!(
        registry.register(MEMORY_BACKEND, InMemoryStoreFactory::new()),
        Err(ItemStoreError::DuplicateBackend(_))
    ));
    assert!(registry.register("scratch", InMemoryStoreFactory::new()).is_ok());
}
