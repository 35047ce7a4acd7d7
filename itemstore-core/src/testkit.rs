//! Shared conformance scenario for store implementations.
//!
//! Every backend crate runs [`exercise_store`] against its own stores so that all of them
//! are held to the same contract.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    document::Record,
    error::ItemStoreResult,
    revision::{AuthorId, now},
    shape::{FieldDescriptor, FieldType, RecordShape, ShapeKind},
    store::ItemStore,
};

/// A small record covering integer, string and timestamp payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub i: i64,
    pub s: String,
    pub t: DateTime<Utc>,
}

impl Record for Sample {
    fn shape() -> RecordShape {
        RecordShape::builder("Sample", ShapeKind::Record)
            .field(FieldDescriptor::new("i", FieldType::Int))
            .field(FieldDescriptor::new("s", FieldType::String))
            .field(FieldDescriptor::new("t", FieldType::Timestamp))
            .build()
    }
}

impl Sample {
    pub fn new(i: i64, s: impl Into<String>, t: DateTime<Utc>) -> Self {
        Self { i, s: s.into(), t }
    }
}

/// Runs the add, get, update, history, find and delete cycle against an empty store.
///
/// Panics on the first contract violation.
pub async fn exercise_store(store: &ItemStore<Sample>) -> ItemStoreResult<()> {
    let t0 = now();
    let first = Sample::new(12345, "67890", t0);

    let added = store.add(&first).await?;
    assert_eq!(added.rev, 1);
    assert!(added.author.is_none());

    let (payload, info) = store.get(&added.id).await?;
    assert_eq!(payload, first);
    assert_eq!(info, added);
    assert_eq!(store.get_info(&added.id).await?, info);

    let second = Sample::new(22222, "22222", t0 + Duration::hours(1));
    let updated = store
        .update_as(&added.id, &second, AuthorId::from("editor"))
        .await?;
    assert_eq!(updated.id, added.id);
    assert_eq!(updated.rev, 2);
    assert_eq!(updated.author, Some(AuthorId::from("editor")));
    assert!(updated.timestamp >= added.timestamp);

    let (payload, info) = store.get(&added.id).await?;
    assert_eq!(payload, second);
    assert_eq!(info, updated);
    assert_eq!(store.get_info(&added.id).await?, updated);

    let history = store.history(&added.id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].info, added);
    assert_eq!(history[0].payload, first);
    assert_eq!(history[1].info, updated);
    assert_eq!(history[1].payload, second);

    let other = store
        .add_as(&Sample::new(1, "other", t0), AuthorId::from("author"))
        .await?;
    assert_ne!(other.id, added.id);
    assert_eq!(store.count().await?, 2);

    let found = store.find("s", "22222").await?;
    assert_eq!(found, vec![updated.clone()]);
    assert!(store.find("s", "67890").await?.is_empty());
    assert!(store.find("missing", 1).await.is_err());

    store.delete(&added.id).await?;
    assert!(store.get(&added.id).await.unwrap_err().is_not_found());
    assert!(store.get_info(&added.id).await.unwrap_err().is_not_found());
    assert!(store.history(&added.id).await.unwrap_err().is_not_found());
    assert!(
        store
            .update(&added.id, &first)
            .await
            .unwrap_err()
            .is_not_found()
    );
    store.delete(&added.id).await?;

    assert_eq!(store.count().await?, 1);
    store.delete(&other.id).await?;
    assert_eq!(store.count().await?, 0);

    Ok(())
}
