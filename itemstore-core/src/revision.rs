//! The revision model shared by every store implementation.
//!
//! An item is identified by an [`ItemId`] that never changes. Each change produces a new
//! [`Revision`]: revision numbers start at 1 and grow by exactly one per update. The
//! highest-numbered revision is the current one; all others are archived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, backend-assigned identifier of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of whoever created a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuthorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Metadata describing one revision of an item, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// The item's stable identifier.
    pub id: ItemId,
    /// Revision number, starting at 1.
    pub rev: u64,
    /// When this revision was created, at millisecond resolution.
    pub timestamp: DateTime<Utc>,
    /// Who created this revision, when tracked.
    pub author: Option<AuthorId>,
}

impl ItemInfo {
    /// Metadata for the first revision of a newly created item.
    pub fn first(id: ItemId, author: Option<AuthorId>) -> Self {
        Self {
            id,
            rev: 1,
            timestamp: now(),
            author,
        }
    }

    /// Metadata for the revision that supersedes this one.
    ///
    /// The id is kept, the revision number grows by exactly one and the timestamp is
    /// taken afresh.
    pub fn next(&self, author: Option<AuthorId>) -> Self {
        Self {
            id: self.id.clone(),
            rev: self.rev + 1,
            timestamp: now(),
            author,
        }
    }
}

/// One immutable snapshot of an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision<T> {
    pub info: ItemInfo,
    pub payload: T,
}

impl<T> Revision<T> {
    pub fn new(info: ItemInfo, payload: T) -> Self {
        Self { info, payload }
    }

    /// Converts the payload, keeping the metadata.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Revision<U>, E> {
        Ok(Revision {
            info: self.info,
            payload: f(self.payload)?,
        })
    }
}

/// The current time truncated to milliseconds, the resolution BSON datetimes keep.
pub fn now() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_revision_keeps_identity() {
        let first = ItemInfo::first(ItemId::from("item-1"), None);
        let second = first.next(Some(AuthorId::from("alice")));

        assert_eq!(first.rev, 1);
        assert_eq!(second.rev, 2);
        assert_eq!(second.id, first.id);
        assert_eq!(second.author, Some(AuthorId::from("alice")));
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn timestamps_have_millisecond_resolution() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
