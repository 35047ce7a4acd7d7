//! Static record shape descriptors and the rules a shape must satisfy to be stored.
//!
//! A [`RecordShape`] describes the payload type of a store: its kind and its fields, each
//! with a semantic [`FieldType`] and the key it is stored under. Shapes are normally
//! generated by `#[derive(Record)]`, but can be assembled by hand with
//! [`RecordShape::builder`].
//!
//! # Example
//!
//! ```ignore
//! use itemstore_core::shape::{FieldDescriptor, FieldType, RecordShape, ShapeKind};
//!
//! let shape = RecordShape::builder("Sample", ShapeKind::Record)
//!     .field(FieldDescriptor::new("i", FieldType::Int))
//!     .field(FieldDescriptor::new("s", FieldType::String))
//!     .build();
//!
//! assert!(shape.validate().is_ok());
//! ```

use std::{collections::HashSet, fmt};
use thiserror::Error;

use crate::error::{ItemStoreError, ItemStoreResult};

/// What kind of type a shape describes. Only [`ShapeKind::Record`] can be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// A struct with named fields (or no fields at all).
    Record,
    /// An enum.
    Enum,
    /// A union.
    Union,
    /// A scalar such as an integer or a string.
    Primitive,
    /// A list-like type.
    Sequence,
    /// A key/value map.
    Map,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShapeKind::Record => "record",
            ShapeKind::Enum => "enum",
            ShapeKind::Union => "union",
            ShapeKind::Primitive => "primitive",
            ShapeKind::Sequence => "sequence",
            ShapeKind::Map => "map",
        })
    }
}

/// Semantic type of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Timestamp,
    /// UUIDs, object ids and similar opaque identifiers.
    Identifier,
    Optional(Box<FieldType>),
    Sequence(Box<FieldType>),
    Map,
    /// Any other serializable type, by type name.
    Other(String),
}

/// Describes one field of a record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The field name as declared in the type.
    pub name: String,
    /// The key the field is serialized under.
    pub key: String,
    /// The semantic type of the field.
    pub field_type: FieldType,
    /// Whether the field is publicly accessible.
    pub public: bool,
    /// Whether the field has no key of its own (a tuple position or a flattened struct).
    pub anonymous: bool,
}

impl FieldDescriptor {
    /// A public, named field stored under its own name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();

        Self {
            key: name.clone(),
            name,
            field_type,
            public: true,
            anonymous: false,
        }
    }

    /// Stores the field under `key` instead of its name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Marks the field as private.
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    /// Marks the field as anonymous or embedded.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// The reason a shape was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    #[error("kind is {0}, expected record")]
    NotARecord(ShapeKind),
    #[error("record has no fields")]
    NoFields,
    #[error("field {0} is anonymous or embedded")]
    AnonymousField(String),
    #[error("field {0} is not public")]
    PrivateField(String),
    #[error("storage key {0} is used by more than one field")]
    DuplicateKey(String),
}

/// Static description of a storable record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    name: String,
    kind: ShapeKind,
    fields: Vec<FieldDescriptor>,
}

impl RecordShape {
    /// Starts building a shape with the given type name and kind.
    pub fn builder(name: impl Into<String>, kind: ShapeKind) -> RecordShapeBuilder {
        RecordShapeBuilder {
            shape: RecordShape {
                name: name.into(),
                kind,
                fields: Vec::new(),
            },
        }
    }

    /// Returns the type name this shape describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of type this shape describes.
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by its storage key.
    pub fn field_by_key(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.key == key)
    }

    /// Fails with [`ItemStoreError::Configuration`] unless a field is stored under `key`.
    pub fn require_key(&self, key: &str) -> ItemStoreResult<&FieldDescriptor> {
        self.field_by_key(key).ok_or_else(|| {
            ItemStoreError::Configuration(format!("{} has no field stored under {key}", self.name))
        })
    }

    /// Fails with [`ItemStoreError::Serialization`] on the first key that no field is
    /// stored under.
    pub fn check_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> ItemStoreResult<()> {
        match keys
            .into_iter()
            .find(|key| self.field_by_key(key).is_none())
        {
            Some(key) => Err(ItemStoreError::Serialization(format!(
                "payload key {key} is not declared by {}",
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Checks that values of this shape can be stored safely.
    ///
    /// Rules are checked in order and the first violation is reported:
    /// the kind must be a record, it must declare at least one field, no field may be
    /// anonymous or embedded, every field must be public, and storage keys must be unique.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidShape`] describing the first violation.
    pub fn validate(&self) -> ItemStoreResult<()> {
        self.first_violation()
            .map_or(Ok(()), |violation| {
                Err(ItemStoreError::InvalidShape {
                    shape: self.name.clone(),
                    violation,
                })
            })
    }

    fn first_violation(&self) -> Option<ShapeViolation> {
        if self.kind != ShapeKind::Record {
            return Some(ShapeViolation::NotARecord(self.kind));
        }
        if self.fields.is_empty() {
            return Some(ShapeViolation::NoFields);
        }
        if let Some(field) = self.fields.iter().find(|f| f.anonymous) {
            return Some(ShapeViolation::AnonymousField(field.name.clone()));
        }
        if let Some(field) = self.fields.iter().find(|f| !f.public) {
            return Some(ShapeViolation::PrivateField(field.name.clone()));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        self.fields
            .iter()
            .find(|field| !seen.insert(field.key.as_str()))
            .map(|field| ShapeViolation::DuplicateKey(field.key.clone()))
    }
}

/// Fluent builder for [`RecordShape`].
#[derive(Debug, Clone)]
pub struct RecordShapeBuilder {
    shape: RecordShape,
}

impl RecordShapeBuilder {
    /// Appends a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.shape.fields.push(field);
        self
    }

    /// Builds the shape. Validation is deferred to [`RecordShape::validate`].
    pub fn build(self) -> RecordShape {
        self.shape
    }
}
