//! Error types and result types for item store operations.
//!
//! Every fallible operation returns [`ItemStoreResult<T>`]. Errors are grouped into four
//! broad classes, reported by [`ItemStoreError::kind`]:
//!
//! - [`ErrorKind::Configuration`] - setup problems (invalid record shapes, registry misuse).
//!   These are raised before any storage operation happens and are not worth retrying.
//! - [`ErrorKind::NotFound`] - the referenced item has no current revision.
//! - [`ErrorKind::Backend`] - the underlying storage or (de)serialization failed.
//! - [`ErrorKind::Consistency`] - a multi-step update left, or would have left, the
//!   revision history in a state that needs attention.

use bson::error::Error as BsonError;
use std::fmt::Display;
use thiserror::Error;

use crate::shape::ShapeViolation;

/// Broad classification of an [`ItemStoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid setup: record shape, backend name or backend configuration.
    Configuration,
    /// The item does not exist (or no longer exists).
    NotFound,
    /// The storage backend or the serialization layer failed.
    Backend,
    /// An update could not keep the live and archived revisions in step.
    Consistency,
}

/// Represents all possible errors that can occur when interacting with an item store.
#[derive(Error, Debug)]
pub enum ItemStoreError {
    /// The record shape cannot be stored.
    #[error("Cannot store {shape}: {violation}")]
    InvalidShape {
        /// Name of the rejected shape.
        shape: String,
        /// The first rule the shape violates.
        violation: ShapeViolation,
    },
    /// A backend was registered without a name.
    #[error("Backend name must not be empty")]
    EmptyBackendName,
    /// A backend with this name is already registered.
    #[error("Duplicate backend registration: {0}")]
    DuplicateBackend(String),
    /// No backend with this name is registered.
    #[error("No such backend: {0}")]
    UnknownBackend(String),
    /// Any other configuration problem (missing database name, undeclared lookup key, ...).
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The item has no current revision.
    /// The first argument is the item id, the second is the store name.
    #[error("Item {0} not found in store {1}")]
    ItemNotFound(String, String),
    /// Serialization/deserialization error when converting payloads to and from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error during {op} on {target}: {message}")]
    Backend {
        /// The backend operation that failed (e.g. `insert_one`).
        op: &'static str,
        /// What the operation was acting on: a collection, or a collection and item id.
        target: String,
        /// The backend's own message.
        message: String,
    },
    /// A unique constraint of the backend rejected an insert.
    #[error("Duplicate key during insert_one on {target}: {message}")]
    DuplicateKey {
        /// The collection the insert was aimed at.
        target: String,
        /// The backend's own message.
        message: String,
    },
    /// An archived copy was written but neither the live update nor its cleanup succeeded.
    #[error("Inconsistent revisions for item {id}: {message}")]
    Inconsistent {
        /// The item whose history is inconsistent.
        id: String,
        /// What was written and what failed.
        message: String,
    },
    /// The live document moved past the revision the update was based on.
    #[error("Revision conflict on item {id}: expected current revision {expected}")]
    RevisionConflict {
        /// The item that was updated concurrently.
        id: String,
        /// The revision this update read before writing.
        expected: u64,
    },
}

/// A specialized `Result` type for item store operations.
pub type ItemStoreResult<T> = Result<T, ItemStoreError>;

impl ItemStoreError {
    /// Builds a [`ItemStoreError::Backend`] from any displayable driver error.
    pub fn backend(op: &'static str, target: impl Into<String>, err: impl Display) -> Self {
        ItemStoreError::Backend {
            op,
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Builds a [`ItemStoreError::DuplicateKey`] from any displayable driver error.
    pub fn duplicate_key(target: impl Into<String>, err: impl Display) -> Self {
        ItemStoreError::DuplicateKey {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Returns the broad class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemStoreError::InvalidShape { .. }
            | ItemStoreError::EmptyBackendName
            | ItemStoreError::DuplicateBackend(_)
            | ItemStoreError::UnknownBackend(_)
            | ItemStoreError::Configuration(_) => ErrorKind::Configuration,
            ItemStoreError::ItemNotFound(..) => ErrorKind::NotFound,
            ItemStoreError::Serialization(_)
            | ItemStoreError::Backend { .. }
            | ItemStoreError::DuplicateKey { .. } => ErrorKind::Backend,
            ItemStoreError::Inconsistent { .. } | ItemStoreError::RevisionConflict { .. } => {
                ErrorKind::Consistency
            }
        }
    }

    /// Shorthand for `self.kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<BsonError> for ItemStoreError {
    fn from(err: BsonError) -> Self {
        ItemStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(ItemStoreError::EmptyBackendName.kind(), ErrorKind::Configuration);
        assert_eq!(
            ItemStoreError::UnknownBackend("nope".into()).kind(),
            ErrorKind::Configuration
        );
        assert!(ItemStoreError::ItemNotFound("x".into(), "things".into()).is_not_found());
        assert_eq!(
            ItemStoreError::backend("insert_one", "things", "connection reset").kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            ItemStoreError::duplicate_key("things", "E11000").kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            ItemStoreError::RevisionConflict { id: "x".into(), expected: 3 }.kind(),
            ErrorKind::Consistency
        );
    }

    #[test]
    fn backend_errors_carry_context() {
        let err = ItemStoreError::backend("delete_many", "things/65f0", "timed out");

        assert_eq!(
            err.to_string(),
            "Backend error during delete_many on things/65f0: timed out"
        );
    }
}
