//! Primary datastore collaborator.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Read access to the records a mapping type indexes.
#[async_trait]
pub trait Datastore<T>: Send + Sync {
    /// Fetch one record. `Ok(None)` means it does not exist.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Every record identifier, used for full reindexing.
    async fn all_ids(&self) -> Result<Vec<String>>;
}

/// A record change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    /// The record was created or updated.
    Saved(T),
    /// The record was removed.
    Deleted(T),
}

impl<T> ChangeEvent<T> {
    /// The record the event is about.
    pub fn object(&self) -> &T {
        match self {
            ChangeEvent::Saved(object) | ChangeEvent::Deleted(object) => object,
        }
    }
}

/// A `BTreeMap`-backed datastore.
///
/// Mutations return the [`ChangeEvent`] a real datastore would emit, so they
/// can be handed straight to
/// [`IndexSynchronizer::handle_change`](crate::IndexSynchronizer::handle_change).
pub struct InMemoryDatastore<T> {
    records: RwLock<BTreeMap<String, T>>,
}

impl<T: Clone + Send + Sync> InMemoryDatastore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a record.
    pub async fn save(&self, id: impl Into<String>, object: T) -> ChangeEvent<T> {
        self.records.write().await.insert(id.into(), object.clone());
        ChangeEvent::Saved(object)
    }

    /// Update a record in place. `None` if it does not exist.
    pub async fn update<F>(&self, id: &str, f: F) -> Option<ChangeEvent<T>>
    where
        F: FnOnce(&mut T),
    {
        let mut records = self.records.write().await;
        let object = records.get_mut(id)?;
        f(object);
        Some(ChangeEvent::Saved(object.clone()))
    }

    /// Remove a record. `None` if it did not exist.
    pub async fn delete(&self, id: &str) -> Option<ChangeEvent<T>> {
        self.records
            .write()
            .await
            .remove(id)
            .map(ChangeEvent::Deleted)
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<T: Clone + Send + Sync> Default for InMemoryDatastore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Datastore<T> for InMemoryDatastore<T> {
    async fn fetch_by_id(&self, id: &str) -> Result<Option<T>> {
        Ok(self.get(id).await)
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_fetch() {
        let store = InMemoryDatastore::new();
        let event = store.save("1", "hello".to_string()).await;

        assert_eq!(event, ChangeEvent::Saved("hello".to_string()));
        assert_eq!(
            store.fetch_by_id("1").await.unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(store.fetch_by_id("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_and_delete_emit_events() {
        let store = InMemoryDatastore::new();
        store.save("1", 1u32).await;

        let event = store.update("1", |n| *n += 1).await;
        assert_eq!(event, Some(ChangeEvent::Saved(2)));
        assert_eq!(store.update("9", |n| *n += 1).await, None);

        let event = store.delete("1").await;
        assert_eq!(event.as_ref().map(ChangeEvent::object), Some(&2));
        assert!(store.delete("1").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_all_ids_sorted() {
        let store = InMemoryDatastore::new();
        store.save("b", ()).await;
        store.save("a", ()).await;

        assert_eq!(store.all_ids().await.unwrap(), vec!["a", "b"]);
    }
}
