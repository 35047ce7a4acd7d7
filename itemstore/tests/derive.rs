use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use itemstore::{
    ItemStoreError, Record,
    shape::{FieldType, ShapeKind, ShapeViolation},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub views: u32,
    pub score: f64,
    pub published: bool,
    pub created: DateTime<Utc>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub thumbnail: Vec<u8>,
    pub labels: HashSet<i64>,
    pub meta: BTreeMap<String, String>,
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

fn field_type(shape: &itemstore::shape::RecordShape, key: &str) -> FieldType {
    shape
        .field_by_key(key)
        .map(|field| field.field_type.clone())
        .unwrap_or_else(|| panic!("no field stored under {key}"))
}

fn violation<R: Record>() -> ShapeViolation {
    match R::shape().validate() {
        Err(ItemStoreError::InvalidShape { violation, .. }) => violation,
        other => panic!("expected an invalid shape, got {other:?}"),
    }
}

#[test]
fn classifies_field_types() {
    let shape = Article::shape();

    assert_eq!(shape.name(), "Article");
    assert_eq!(shape.kind(), ShapeKind::Record);
    assert!(shape.validate().is_ok());

    assert_eq!(field_type(&shape, "id"), FieldType::Identifier);
    assert_eq!(field_type(&shape, "title"), FieldType::String);
    assert_eq!(field_type(&shape, "views"), FieldType::Int);
    assert_eq!(field_type(&shape, "score"), FieldType::Float);
    assert_eq!(field_type(&shape, "published"), FieldType::Bool);
    assert_eq!(field_type(&shape, "created"), FieldType::Timestamp);
    assert_eq!(
        field_type(&shape, "summary"),
        FieldType::Optional(Box::new(FieldType::String))
    );
    assert_eq!(
        field_type(&shape, "tags"),
        FieldType::Sequence(Box::new(FieldType::String))
    );
    assert_eq!(field_type(&shape, "thumbnail"), FieldType::Bytes);
    assert_eq!(
        field_type(&shape, "labels"),
        FieldType::Sequence(Box::new(FieldType::Int))
    );
    assert_eq!(field_type(&shape, "meta"), FieldType::Map);
    assert_eq!(field_type(&shape, "location"), FieldType::Other("Location".to_string()));
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(name = "Profile")]
pub struct UserProfile {
    pub display_name: String,
    #[serde(rename = "mail")]
    pub email_address: String,
    #[serde(skip)]
    pub cached: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
}

#[test]
fn follows_serde_naming() {
    let shape = UserProfile::shape();

    assert_eq!(shape.name(), "Profile");
    let keys: Vec<&str> = shape.fields().iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["displayName", "mail", "homePage"]);

    let names: Vec<&str> = shape.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["display_name", "email_address", "home_page"]);
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub enum Status {
    Active,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Pair(pub i64, pub i64);

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Embedding {
    pub name: String,
    #[serde(flatten)]
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
pub struct Secretive {
    pub name: String,
    secret: String,
}

#[test]
fn unstorable_shapes_report_the_first_violation() {
    assert_eq!(violation::<Status>(), ShapeViolation::NotARecord(ShapeKind::Enum));
    assert_eq!(violation::<Empty>(), ShapeViolation::NoFields);
    assert_eq!(violation::<Pair>(), ShapeViolation::AnonymousField("0".to_string()));
    assert_eq!(violation::<Embedding>(), ShapeViolation::AnonymousField("location".to_string()));
    assert_eq!(violation::<Secretive>(), ShapeViolation::PrivateField("secret".to_string()));
}

#[derive(Debug, Clone, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub _draft_note: String,
    pub r#type: String,
    pub story_points: i64,
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize, Record)]
#[serde(rename_all = "lowercase")]
pub struct Measure {
    pub I: i64,
    pub unit_name: String,
}

fn serialized_keys<R: Record>(record: &R) -> Vec<String> {
    itemstore::bson::serialize_to_document(record)
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

fn shape_keys<R: Record>() -> Vec<String> {
    R::shape().fields().iter().map(|f| f.key.clone()).collect()
}

#[test]
fn shape_keys_match_serialized_keys() {
    let draft = Draft {
        _draft_note: "n".into(),
        r#type: "bug".into(),
        story_points: 1,
    };
    assert_eq!(shape_keys::<Draft>(), vec!["draftNote", "type", "storyPoints"]);
    assert_eq!(serialized_keys(&draft), shape_keys::<Draft>());

    let measure = Measure { I: 1, unit_name: "m".into() };
    assert_eq!(shape_keys::<Measure>(), vec!["I", "unit_name"]);
    assert_eq!(serialized_keys(&measure), shape_keys::<Measure>());
}
