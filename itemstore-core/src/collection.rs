//! Revisioned item storage on top of a [`DocumentBackend`].
//!
//! [`DocumentItemStore`] keeps one live document per item, addressed by the identity the
//! backend assigned when the item was added, and one archived document per superseded
//! revision. See [`schema`](crate::schema) for the layout.
//!
//! # Updates
//!
//! An update is three backend calls:
//!
//! 1. read the live document;
//! 2. insert an archived copy of it;
//! 3. update the live document in place, guarded on the revision read in step 1.
//!
//! Steps 2 and 3 are not one transaction. If step 3 fails or matches nothing because
//! another writer got there first, the copy from step 2 is deleted again so history never
//! holds a duplicated or orphaned revision. Only if that cleanup also fails is
//! [`ItemStoreError::Inconsistent`] returned.

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use tracing::{debug, warn};

use crate::{
    backend::DocumentBackend,
    error::{ItemStoreError, ItemStoreResult},
    query::Filter,
    revision::{AuthorId, ItemId, ItemInfo, Revision},
    schema::{DocumentHeader, DocumentSchema, ID_KEY, REV_KEY},
    shape::RecordShape,
    store::RawItemStore,
};

/// A revisioned item store kept in one collection of a document backend.
///
/// The store name doubles as the collection name.
#[derive(Debug)]
pub struct DocumentItemStore<B: DocumentBackend> {
    name: String,
    schema: DocumentSchema,
    backend: B,
}

impl<B: DocumentBackend> DocumentItemStore<B> {
    /// Creates a store for payloads of `shape` in collection `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidShape`] if the shape cannot be stored.
    pub fn new(name: impl Into<String>, shape: RecordShape, backend: B) -> ItemStoreResult<Self> {
        let schema = DocumentSchema::compose(&shape)?;

        Ok(Self {
            name: name.into(),
            schema,
            backend,
        })
    }

    /// Returns the document layout of this store.
    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    /// Returns the backend this store writes to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn not_found(&self, id: &ItemId) -> ItemStoreError {
        ItemStoreError::ItemNotFound(id.to_string(), self.name.clone())
    }

    /// Ids that do not parse as object ids cannot name a stored item.
    fn object_id(&self, id: &ItemId) -> Option<ObjectId> {
        ObjectId::parse_str(id.as_str()).ok()
    }

    async fn live_document(&self, id: &ItemId) -> ItemStoreResult<(DocumentHeader, Document)> {
        let oid = self
            .object_id(id)
            .ok_or_else(|| self.not_found(id))?;

        let document = self
            .backend
            .find_one(&self.name, &self.schema.live_filter(oid), None)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        self.schema.decode(document)
    }

    /// Removes an archived copy after a failed live update.
    async fn discard_archive(
        &self,
        id: &ItemId,
        archive_id: ObjectId,
        cause: ItemStoreError,
    ) -> ItemStoreError {
        warn!(store = %self.name, %id, %archive_id, error = %cause, "Live update failed, discarding archived copy");

        match self
            .backend
            .delete_one(&self.name, &Filter::eq(ID_KEY, archive_id))
            .await
        {
            Ok(_) => cause,
            Err(cleanup) => ItemStoreError::Inconsistent {
                id: id.to_string(),
                message: format!(
                    "archived copy {archive_id} was written but the live update failed ({cause}) and the copy could not be removed ({cleanup})"
                ),
            },
        }
    }
}

#[async_trait]
impl<B: DocumentBackend> RawItemStore for DocumentItemStore<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &RecordShape {
        self.schema.payload_shape()
    }

    async fn add(&self, payload: Document, author: Option<AuthorId>) -> ItemStoreResult<ItemInfo> {
        // The id is only known once the backend has assigned it.
        let mut info = ItemInfo::first(ItemId::new(""), author);
        let document = self.schema.live_document(&info, payload)?;

        let oid = self
            .backend
            .insert_one(&self.name, document)
            .await?;
        info.id = ItemId::new(oid.to_hex());

        debug!(store = %self.name, id = %info.id, rev = info.rev, "Added item");
        Ok(info)
    }

    async fn get(&self, id: &ItemId) -> ItemStoreResult<(Document, ItemInfo)> {
        let (header, payload) = self.live_document(id).await?;
        let info = header.info();

        debug!(store = %self.name, %id, rev = info.rev, "Got item");
        Ok((payload, info))
    }

    async fn get_info(&self, id: &ItemId) -> ItemStoreResult<ItemInfo> {
        let oid = self
            .object_id(id)
            .ok_or_else(|| self.not_found(id))?;

        let header_keys = self.schema.header_keys();
        let document = self
            .backend
            .find_one(
                &self.name,
                &self.schema.live_filter(oid),
                Some(header_keys.as_slice()),
            )
            .await?
            .ok_or_else(|| self.not_found(id))?;
        let info = self.schema.decode_header(&document)?.info();

        debug!(store = %self.name, %id, rev = info.rev, "Got item info");
        Ok(info)
    }

    async fn update(
        &self,
        id: &ItemId,
        payload: Document,
        author: Option<AuthorId>,
    ) -> ItemStoreResult<ItemInfo> {
        let (current, current_payload) = self.live_document(id).await?;
        let next = current.info().next(author);
        let fields = self.schema.live_update(&next, payload)?;

        // A unique archive index rejects a second copy of the same revision, which
        // means another update archived it first.
        let archive_id = self
            .backend
            .insert_one(
                &self.name,
                self.schema.archive_document(&current, current_payload),
            )
            .await
            .map_err(|err| match err {
                ItemStoreError::DuplicateKey { .. } => ItemStoreError::RevisionConflict {
                    id: id.to_string(),
                    expected: current.rev,
                },
                other => other,
            })?;
        debug!(store = %self.name, %id, rev = current.rev, %archive_id, "Archived revision");

        let guard = self
            .schema
            .live_filter(current.id)
            .and_eq(REV_KEY, current.rev as i64);

        match self
            .backend
            .update_one(&self.name, &guard, fields)
            .await
        {
            Ok(0) => {
                let conflict = ItemStoreError::RevisionConflict {
                    id: id.to_string(),
                    expected: current.rev,
                };
                Err(self.discard_archive(id, archive_id, conflict).await)
            }
            Ok(_) => {
                debug!(store = %self.name, %id, rev = next.rev, "Updated item");
                Ok(next)
            }
            Err(err) => Err(self.discard_archive(id, archive_id, err).await),
        }
    }

    async fn delete(&self, id: &ItemId) -> ItemStoreResult<()> {
        let Some(oid) = self.object_id(id) else {
            return Ok(());
        };

        let live = self
            .backend
            .delete_one(&self.name, &self.schema.live_filter(oid))
            .await?;
        let archived = self
            .backend
            .delete_many(&self.name, &self.schema.archive_filter(oid))
            .await?;

        debug!(store = %self.name, %id, live, archived, "Deleted item");
        Ok(())
    }

    async fn history(&self, id: &ItemId) -> ItemStoreResult<Vec<Revision<Document>>> {
        let (current, current_payload) = self.live_document(id).await?;

        let mut revisions = self
            .backend
            .find_many(&self.name, &self.schema.archive_filter(current.id), None)
            .await?
            .into_iter()
            .map(|document| {
                let (header, payload) = self.schema.decode(document)?;
                Ok(Revision::new(header.info(), payload))
            })
            .collect::<ItemStoreResult<Vec<_>>>()?;

        revisions.push(Revision::new(current.info(), current_payload));
        revisions.sort_by_key(|revision| revision.info.rev);

        Ok(revisions)
    }

    async fn count(&self) -> ItemStoreResult<u64> {
        self.backend
            .count(&self.name, &self.schema.all_live_filter())
            .await
    }

    async fn find(&self, filter: &Filter) -> ItemStoreResult<Vec<ItemInfo>> {
        let filter = self.schema.payload_filter(filter.clone())?;
        let header_keys = self.schema.header_keys();

        self.backend
            .find_many(&self.name, &filter, Some(header_keys.as_slice()))
            .await?
            .iter()
            .map(|document| Ok(self.schema.decode_header(document)?.info()))
            .collect()
    }
}
