//! Document layout for revisioned items in a document database.
//!
//! [`DocumentSchema::compose`] derives the stored layout from a validated record shape.
//! Every document has the same fields, in this order:
//!
//! | key       | role                                                               |
//! |-----------|--------------------------------------------------------------------|
//! | `_id`     | backend-assigned identity; the item id for the live document       |
//! | `rev`     | revision number 1, 2, 3, ...                                       |
//! | `item_id` | null on the live document, the item's `_id` on archived copies     |
//! | `ts`      | when the revision was created                                      |
//! | `author`  | who created the revision, or null                                  |
//! | `data`    | the record payload                                                 |
//!
//! The live document is updated in place, so its `_id` stays the item id for the item's
//! whole life. Superseded revisions are copied into new documents whose `_id` is fresh;
//! `item_id` keeps them attributable to their item.

use bson::{Bson, Document, doc, oid::ObjectId};
use chrono::{DateTime, Utc};

use crate::{
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    revision::{AuthorId, ItemId, ItemInfo},
    shape::RecordShape,
};

pub const ID_KEY: &str = "_id";
pub const REV_KEY: &str = "rev";
pub const ITEM_ID_KEY: &str = "item_id";
pub const TS_KEY: &str = "ts";
pub const AUTHOR_KEY: &str = "author";
pub const DATA_KEY: &str = "data";

/// What a document field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaField {
    Identity,
    Revision,
    StableItemId,
    Timestamp,
    Author,
    Payload,
}

impl SchemaField {
    /// The key this field is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            SchemaField::Identity => ID_KEY,
            SchemaField::Revision => REV_KEY,
            SchemaField::StableItemId => ITEM_ID_KEY,
            SchemaField::Timestamp => TS_KEY,
            SchemaField::Author => AUTHOR_KEY,
            SchemaField::Payload => DATA_KEY,
        }
    }
}

/// The metadata part of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHeader {
    /// The document's own identity.
    pub id: ObjectId,
    pub rev: u64,
    /// Set on archived copies only.
    pub item_id: Option<ObjectId>,
    pub timestamp: DateTime<Utc>,
    pub author: Option<AuthorId>,
}

impl DocumentHeader {
    /// The identity of the item this document belongs to.
    pub fn item(&self) -> ObjectId {
        self.item_id.unwrap_or(self.id)
    }

    /// Returns `true` for the live (current revision) document.
    pub fn is_live(&self) -> bool {
        self.item_id.is_none()
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            id: ItemId::new(self.item().to_hex()),
            rev: self.rev,
            timestamp: self.timestamp,
            author: self.author.clone(),
        }
    }
}

/// The full document layout of a store, derived once from its record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSchema {
    fields: Vec<SchemaField>,
    payload: RecordShape,
}

impl DocumentSchema {
    /// Composes the document layout for `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidShape`] if the shape cannot be stored.
    pub fn compose(shape: &RecordShape) -> ItemStoreResult<Self> {
        shape.validate()?;

        Ok(Self {
            fields: vec![
                SchemaField::Identity,
                SchemaField::Revision,
                SchemaField::StableItemId,
                SchemaField::Timestamp,
                SchemaField::Author,
                SchemaField::Payload,
            ],
            payload: shape.clone(),
        })
    }

    /// Returns the fields in storage order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Returns the payload shape.
    pub fn payload_shape(&self) -> &RecordShape {
        &self.payload
    }

    /// Keys of every field except the payload, for header-only fetches.
    pub fn header_keys(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|field| **field != SchemaField::Payload)
            .map(SchemaField::key)
            .collect()
    }

    /// Filter selecting the live document of an item.
    pub fn live_filter(&self, item: ObjectId) -> Filter {
        Filter::eq(ID_KEY, item).and_eq(ITEM_ID_KEY, Bson::Null)
    }

    /// Filter selecting every archived copy of an item.
    pub fn archive_filter(&self, item: ObjectId) -> Filter {
        Filter::eq(ITEM_ID_KEY, item)
    }

    /// Filter selecting every live document.
    pub fn all_live_filter(&self) -> Filter {
        Filter::eq(ITEM_ID_KEY, Bson::Null)
    }

    /// Filter on payload fields, restricted to live documents.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Configuration`] if a clause uses a key the shape does not
    /// declare.
    pub fn payload_filter(&self, filter: Filter) -> ItemStoreResult<Filter> {
        for clause in filter.clauses() {
            let key = clause.path.first().map(String::as_str).unwrap_or_default();
            self.payload.require_key(key)?;
        }

        Ok(filter.nested(DATA_KEY).and(self.all_live_filter()))
    }

    /// Builds a new live document. The identity is left for the backend to assign.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if the payload has undeclared keys.
    pub fn live_document(&self, info: &ItemInfo, payload: Document) -> ItemStoreResult<Document> {
        self.check_payload(&payload)?;

        Ok(doc! {
            REV_KEY: rev_to_bson(info.rev),
            ITEM_ID_KEY: Bson::Null,
            TS_KEY: bson::DateTime::from_chrono(info.timestamp),
            AUTHOR_KEY: author_to_bson(&info.author),
            DATA_KEY: payload,
        })
    }

    /// Builds the archived copy of a superseded live document.
    pub fn archive_document(&self, header: &DocumentHeader, payload: Document) -> Document {
        doc! {
            REV_KEY: rev_to_bson(header.rev),
            ITEM_ID_KEY: header.item(),
            TS_KEY: bson::DateTime::from_chrono(header.timestamp),
            AUTHOR_KEY: author_to_bson(&header.author),
            DATA_KEY: payload,
        }
    }

    /// The fields to set on the live document when it moves to the revision in `info`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if the payload has undeclared keys.
    pub fn live_update(&self, info: &ItemInfo, payload: Document) -> ItemStoreResult<Document> {
        self.check_payload(&payload)?;

        Ok(doc! {
            REV_KEY: rev_to_bson(info.rev),
            TS_KEY: bson::DateTime::from_chrono(info.timestamp),
            AUTHOR_KEY: author_to_bson(&info.author),
            DATA_KEY: payload,
        })
    }

    /// Decodes the header fields of a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if a header field is missing or mistyped.
    pub fn decode_header(&self, document: &Document) -> ItemStoreResult<DocumentHeader> {
        let id = match document.get(ID_KEY) {
            Some(Bson::ObjectId(id)) => *id,
            other => return Err(malformed(ID_KEY, other)),
        };
        let rev = match document.get(REV_KEY) {
            Some(Bson::Int64(rev)) if *rev > 0 => *rev as u64,
            Some(Bson::Int32(rev)) if *rev > 0 => *rev as u64,
            other => return Err(malformed(REV_KEY, other)),
        };
        let item_id = match document.get(ITEM_ID_KEY) {
            None | Some(Bson::Null) => None,
            Some(Bson::ObjectId(item_id)) => Some(*item_id),
            other => return Err(malformed(ITEM_ID_KEY, other)),
        };
        let timestamp = match document.get(TS_KEY) {
            Some(Bson::DateTime(ts)) => ts.to_chrono(),
            other => return Err(malformed(TS_KEY, other)),
        };
        let author = match document.get(AUTHOR_KEY) {
            None | Some(Bson::Null) => None,
            Some(Bson::String(author)) => Some(AuthorId::new(author.clone())),
            other => return Err(malformed(AUTHOR_KEY, other)),
        };

        Ok(DocumentHeader { id, rev, item_id, timestamp, author })
    }

    /// Splits a stored document into its header and payload.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if the document does not follow the schema.
    pub fn decode(&self, mut document: Document) -> ItemStoreResult<(DocumentHeader, Document)> {
        let header = self.decode_header(&document)?;

        match document.remove(DATA_KEY) {
            Some(Bson::Document(payload)) => Ok((header, payload)),
            other => Err(malformed(DATA_KEY, other.as_ref())),
        }
    }

    fn check_payload(&self, payload: &Document) -> ItemStoreResult<()> {
        self.payload
            .check_keys(payload.keys().map(String::as_str))
    }
}

fn rev_to_bson(rev: u64) -> Bson {
    Bson::Int64(rev as i64)
}

fn author_to_bson(author: &Option<AuthorId>) -> Bson {
    author
        .as_ref()
        .map_or(Bson::Null, |author| Bson::String(author.as_str().to_string()))
}

fn malformed(key: &str, value: Option<&Bson>) -> ItemStoreError {
    ItemStoreError::Serialization(match value {
        Some(value) => format!("document field {key} has unexpected value {value}"),
        None => format!("document field {key} is missing"),
    })
}
