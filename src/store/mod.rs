//! In-memory entity store: one concurrency-safe map shared by typed
//! repositories for users, service providers and sessions.
//!
//! Records are kept JSON-encoded inside the container. Encoding at the
//! store boundary is what lets a repository distinguish "key absent"
//! from "key present but payload does not match the record shape" -- the
//! latter is reported as a decode failure, never as NotFound.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::StoreError;
use crate::identity::{Session, User};
use crate::saml::ServiceProvider;

/// Namespace discriminant for the three collections. It is part of the
/// composite map key, so a user, a service provider and a session can
/// never collide even when they share an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    ServiceProviders,
    Sessions,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    collection: Collection,
    id: String,
}

/// The shared associative container. Values are inserted fully encoded
/// under a single write lock, so a reader never observes a partially
/// written record; readers proceed concurrently.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, JsonValue>>,
}

impl MemoryStore {
    fn put(&self, collection: Collection, id: &str, value: JsonValue) {
        let key = RecordKey { collection, id: id.to_string() };
        self.records.write().insert(key, value);
    }

    fn get(&self, collection: Collection, id: &str) -> Option<JsonValue> {
        let key = RecordKey { collection, id: id.to_string() };
        self.records.read().get(&key).cloned()
    }

    fn list(&self, collection: Collection) -> Vec<JsonValue> {
        let map = self.records.read();
        map.iter()
            .filter(|(key, _)| key.collection == collection)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

/// Typed view over one collection of the shared container.
pub struct Repository<T> {
    store: Arc<MemoryStore>,
    collection: Collection,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), collection: self.collection, _record: PhantomData }
    }
}

impl<T: Serialize + DeserializeOwned> Repository<T> {
    fn new(store: Arc<MemoryStore>, collection: Collection) -> Self {
        Self { store, collection, _record: PhantomData }
    }

    /// Insert or overwrite. Last write wins; no other record is touched.
    pub fn put(&self, id: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(|e| StoreError::Internal(e.to_string()))?;
        self.store.put(self.collection, id, value);
        Ok(())
    }

    /// Exact lookup. An absent key is `StoreError::NotFound`; a present
    /// key whose payload does not decode is `StoreError::Decode`.
    pub fn get(&self, id: &str) -> Result<T, StoreError> {
        let value = self.store.get(self.collection, id).ok_or(StoreError::NotFound)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Every record in the collection, in unspecified order. The snapshot
    /// is taken under one read lock; decoding happens after it is
    /// released. Concurrent writers may or may not be reflected.
    pub fn list(&self) -> Result<Vec<T>, StoreError> {
        self.store
            .list(self.collection)
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }
}

/// The three repositories backed by one shared container.
#[derive(Clone)]
pub struct EntityStore {
    pub users: Repository<User>,
    pub service_providers: Repository<ServiceProvider>,
    pub sessions: Repository<Session>,
}

impl EntityStore {
    pub fn new() -> Self {
        let inner = Arc::new(MemoryStore::default());
        Self {
            users: Repository::new(inner.clone(), Collection::Users),
            service_providers: Repository::new(inner.clone(), Collection::ServiceProviders),
            sessions: Repository::new(inner, Collection::Sessions),
        }
    }

    /// Bypasses record encoding so tests can plant malformed payloads.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, collection: Collection, id: &str, value: JsonValue) {
        self.users.store.put(collection, id, value);
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
