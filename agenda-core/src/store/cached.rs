//! Read-through caching in front of an [`EventStore`].

use std::sync::Arc;

use crate::cache::TimedCache;
use crate::error::AgendaResult;
use crate::event::{Event, EventDraft, EventPatch};
use crate::store::{DateRange, EventStore};

/// Wraps a store so queries go through a [`TimedCache`].
///
/// Any write by an owner drops that owner's cached queries.
pub struct CachedEventStore<S> {
    inner: Arc<S>,
    cache: Arc<TimedCache<Vec<Event>>>,
}

impl<S> CachedEventStore<S> {
    pub fn new(inner: Arc<S>, cache: Arc<TimedCache<Vec<Event>>>) -> Self {
        CachedEventStore { inner, cache }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<TimedCache<Vec<Event>>> {
        &self.cache
    }

    /// Drop every cached query for `owner`.
    pub fn invalidate(&self, owner: &str) {
        tracing::debug!(owner, "Invalidating cached events");
        self.cache.invalidate_prefix(&owner_prefix(owner));
    }
}

fn owner_prefix(owner: &str) -> String {
    format!("events:{owner}:")
}

fn query_key(owner: &str, range: &DateRange) -> String {
    format!("{}{}", owner_prefix(owner), range.cache_key())
}

impl<S> EventStore for CachedEventStore<S>
where
    S: EventStore + 'static,
{
    async fn add(&self, owner: &str, draft: &EventDraft) -> AgendaResult<Event> {
        let result = self.inner.add(owner, draft).await;
        self.invalidate(owner);
        result
    }

    async fn update(&self, owner: &str, id: &str, patch: &EventPatch) -> AgendaResult<()> {
        let result = self.inner.update(owner, id, patch).await;
        self.invalidate(owner);
        result
    }

    async fn delete(&self, owner: &str, id: &str) -> AgendaResult<()> {
        let result = self.inner.delete(owner, id).await;
        self.invalidate(owner);
        result
    }

    async fn query(&self, owner: &str, range: &DateRange) -> AgendaResult<Vec<Event>> {
        let inner = Arc::clone(&self.inner);
        let owner_owned = owner.to_string();
        let range_owned = *range;
        self.cache
            .remember(&query_key(owner, range), move || async move {
                inner.query(&owner_owned, &range_owned).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use std::time::Duration;

    fn cached() -> (Arc<MemoryEventStore>, CachedEventStore<MemoryEventStore>) {
        let inner = Arc::new(MemoryEventStore::new());
        let cache = Arc::new(TimedCache::new(Duration::from_secs(60)));
        (inner.clone(), CachedEventStore::new(inner, cache))
    }

    #[tokio::test]
    async fn test_query_is_cached_until_write() {
        let (inner, store) = cached();
        store
            .add("alice", &EventDraft::new("one", "2024-01-01T09:00:00Z"))
            .await
            .unwrap();
        assert_eq!(store.query("alice", &DateRange::all()).await.unwrap().len(), 1);

        // Bypasses the wrapper, so the cached result is served.
        inner
            .add("alice", &EventDraft::new("two", "2024-01-02T09:00:00Z"))
            .await
            .unwrap();
        assert_eq!(store.query("alice", &DateRange::all()).await.unwrap().len(), 1);

        store
            .add("alice", &EventDraft::new("three", "2024-01-03T09:00:00Z"))
            .await
            .unwrap();
        assert_eq!(store.query("alice", &DateRange::all()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_write_still_invalidates() {
        let (inner, store) = cached();
        store.query("alice", &DateRange::all()).await.unwrap();
        assert_eq!(store.cache().len(), 1);

        inner.set_rejecting(true);
        assert!(store.delete("alice", "x").await.is_err());
        assert!(store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_is_per_owner() {
        let (_, store) = cached();
        store.query("alice", &DateRange::all()).await.unwrap();
        store.query("bob", &DateRange::all()).await.unwrap();

        store
            .add("alice", &EventDraft::new("one", "2024-01-01T09:00:00Z"))
            .await
            .unwrap();
        assert_eq!(store.cache().len(), 1);
        assert!(store.cache().get(&query_key("bob", &DateRange::all())).is_some());
    }
}
