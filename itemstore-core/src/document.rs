//! Core traits for record types and their conversion to BSON payloads.
//!
//! A record is the caller's own payload type. Stores never see it directly: the typed
//! [`ItemStore`](crate::store::ItemStore) converts it to a BSON [`Document`] with
//! [`RecordExt`] before handing it to a backend.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{ItemStoreError, ItemStoreResult},
    shape::RecordShape,
};

/// Core trait that every payload type stored in an item store must implement.
///
/// The [`shape`](Record::shape) describes the type's fields statically; it is validated
/// once when a store is opened. Use `#[derive(Record)]` from the `itemstore` crate to
/// generate it.
///
/// # Example
///
/// ```ignore
/// use itemstore::Record;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Record)]
/// pub struct Note {
///     pub title: String,
///     pub body: String,
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the static description of this type.
    fn shape() -> RecordShape;
}

/// Extension trait converting records to and from BSON payload documents.
///
/// This trait is automatically implemented for all types that implement [`Record`].
pub trait RecordExt: Record {
    /// Serializes this record into a payload document.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if serialization fails or the record does not
    /// serialize to a document.
    fn to_document(&self) -> ItemStoreResult<Document>;

    /// Deserializes a record from a payload document.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] if the document does not match the type.
    fn from_document(document: Document) -> ItemStoreResult<Self>;
}

impl<R: Record> RecordExt for R {
    fn to_document(&self) -> ItemStoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(ItemStoreError::Serialization(format!(
                "{} serialized to {:?}, expected a document",
                R::shape().name(),
                other.element_type()
            ))),
        }
    }

    fn from_document(document: Document) -> ItemStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldDescriptor, FieldType, ShapeKind};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl Record for Point {
        fn shape() -> RecordShape {
            RecordShape::builder("Point", ShapeKind::Record)
                .field(FieldDescriptor::new("x", FieldType::Int))
                .field(FieldDescriptor::new("y", FieldType::Int))
                .build()
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Celsius(f64);

    impl Record for Celsius {
        fn shape() -> RecordShape {
            RecordShape::builder("Celsius", ShapeKind::Record)
                .field(FieldDescriptor::new("0", FieldType::Float).anonymous())
                .build()
        }
    }

    #[test]
    fn records_become_documents() {
        let document = Point { x: 3, y: -4 }.to_document().unwrap();

        assert_eq!(document.get("x"), Some(&Bson::Int64(3)));
        assert_eq!(Point::from_document(document).unwrap(), Point { x: 3, y: -4 });
    }

    #[test]
    fn newtypes_are_not_documents() {
        let err = Celsius(21.5).to_document().unwrap_err();

        assert!(matches!(err, ItemStoreError::Serialization(_)));
    }
}
