//! Named backends and the stores they open.
//!
//! A [`BackendRegistry`] is built once at startup: every backend kind registers a
//! [`StoreFactory`] under a unique name, after which the registry is shared (by reference
//! or behind an `Arc`) with whatever needs to open stores. Registration is append-only.
//!
//! # Example
//!
//! ```ignore
//! use itemstore::prelude::*;
//! use itemstore::memory::InMemoryStoreFactory;
//!
//! let mut registry = BackendRegistry::new();
//! registry.register("memory", InMemoryStoreFactory)?;
//!
//! let notes: ItemStore<Note> = registry.open("memory", "notes").await?;
//! ```

use async_trait::async_trait;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};
use tracing::info;

use crate::{
    document::Record,
    error::{ItemStoreError, ItemStoreResult},
    shape::RecordShape,
    store::{ItemStore, RawItemStore},
};

/// Opens stores of one backend kind.
#[async_trait]
pub trait StoreFactory: Send + Sync + Debug {
    /// Opens the store `name` for payloads of `shape`.
    ///
    /// Implementations must validate `shape` before touching storage.
    async fn open(&self, name: &str, shape: RecordShape) -> ItemStoreResult<Box<dyn RawItemStore>>;
}

/// Mapping from backend names to store factories.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn StoreFactory>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::EmptyBackendName`] for an empty name and
    /// [`ItemStoreError::DuplicateBackend`] if the name is taken. Both indicate a setup
    /// defect and should abort startup.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl StoreFactory + 'static,
    ) -> ItemStoreResult<()> {
        let name = name.into();

        if name.is_empty() {
            return Err(ItemStoreError::EmptyBackendName);
        }
        if self.factories.contains_key(&name) {
            return Err(ItemStoreError::DuplicateBackend(name));
        }

        info!(backend = %name, "Registered store backend");
        self.factories.insert(name, Arc::new(factory));

        Ok(())
    }

    /// Returns the factory registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::UnknownBackend`] if nothing is registered under `name`.
    pub fn lookup(&self, name: &str) -> ItemStoreResult<Arc<dyn StoreFactory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| ItemStoreError::UnknownBackend(name.to_string()))
    }

    /// Returns the registered backend names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Opens the store `store` of backend `backend` for records of type `R`.
    ///
    /// The shape of `R` is validated before the backend is asked for anything.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown backend or an invalid shape, or
    /// whatever the backend reports while opening the store.
    pub async fn open<R: Record>(&self, backend: &str, store: &str) -> ItemStoreResult<ItemStore<R>> {
        let shape = R::shape();
        shape.validate()?;

        let raw = self
            .lookup(backend)?
            .open(store, shape)
            .await?;

        info!(backend, store, record = raw.shape().name(), "Opened item store");
        ItemStore::new(raw)
    }
}
