//! In-memory event store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::error::{AgendaError, AgendaResult};
use crate::event::{Event, EventDraft, EventPatch};
use crate::store::{DateRange, EventStore};
use crate::time;

/// One write, as recorded in the store's journal.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Add { owner: String, id: String },
    Update { owner: String, id: String, patch: EventPatch },
    Delete { owner: String, id: String },
}

impl StoreWrite {
    pub fn id(&self) -> &str {
        match self {
            StoreWrite::Add { id, .. } | StoreWrite::Update { id, .. } | StoreWrite::Delete { id, .. } => id,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    /// owner -> id -> event
    events: HashMap<String, HashMap<String, Event>>,
    writes: Vec<StoreWrite>,
}

/// [`EventStore`] backed by a map, with a journal of every write.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    state: RwLock<MemoryState>,
    rejecting: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with a store error.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Put an event in place as-is, without journaling it.
    pub async fn insert(&self, owner: &str, event: Event) {
        self.state
            .write()
            .await
            .events
            .entry(owner.to_string())
            .or_default()
            .insert(event.id.clone(), event);
    }

    pub async fn get(&self, owner: &str, id: &str) -> Option<Event> {
        self.state
            .read()
            .await
            .events
            .get(owner)
            .and_then(|events| events.get(id))
            .cloned()
    }

    /// Every write so far, oldest first.
    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.state.read().await.writes.clone()
    }

    pub async fn len(&self, owner: &str) -> usize {
        self.state
            .read()
            .await
            .events
            .get(owner)
            .map_or(0, HashMap::len)
    }

    fn check_writable(&self) -> AgendaResult<()> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(AgendaError::Store("store is rejecting writes".into()));
        }
        Ok(())
    }
}

impl EventStore for MemoryEventStore {
    async fn add(&self, owner: &str, draft: &EventDraft) -> AgendaResult<Event> {
        self.check_writable()?;

        let event = Event::new(uuid::Uuid::new_v4().to_string(), draft.clone());
        let mut state = self.state.write().await;
        state
            .events
            .entry(owner.to_string())
            .or_default()
            .insert(event.id.clone(), event.clone());
        state.writes.push(StoreWrite::Add {
            owner: owner.to_string(),
            id: event.id.clone(),
        });

        tracing::debug!(owner, event_id = %event.id, "Added event");
        Ok(event)
    }

    async fn update(&self, owner: &str, id: &str, patch: &EventPatch) -> AgendaResult<()> {
        self.check_writable()?;

        let mut state = self.state.write().await;
        let event = state
            .events
            .get_mut(owner)
            .and_then(|events| events.get_mut(id))
            .ok_or_else(|| AgendaError::Store(format!("no event '{id}' for owner '{owner}'")))?;
        event.apply(patch);
        state.writes.push(StoreWrite::Update {
            owner: owner.to_string(),
            id: id.to_string(),
            patch: patch.clone(),
        });

        tracing::debug!(owner, event_id = id, "Updated event");
        Ok(())
    }

    async fn delete(&self, owner: &str, id: &str) -> AgendaResult<()> {
        self.check_writable()?;

        let mut state = self.state.write().await;
        if let Some(events) = state.events.get_mut(owner) {
            events.remove(id);
        }
        state.writes.push(StoreWrite::Delete {
            owner: owner.to_string(),
            id: id.to_string(),
        });

        tracing::debug!(owner, event_id = id, "Deleted event");
        Ok(())
    }

    async fn query(&self, owner: &str, range: &DateRange) -> AgendaResult<Vec<Event>> {
        let state = self.state.read().await;
        let Some(events) = state.events.get(owner) else {
            return Ok(Vec::new());
        };

        let unbounded = range.from.is_none() && range.to.is_none();
        let mut matched: Vec<_> = events
            .values()
            .filter(|e| match time::to_instant(e.data.start.as_ref()) {
                Some(start) => range.contains(start),
                None => unbounded,
            })
            .cloned()
            .collect();
        matched.sort_by_key(|e| {
            let start = time::to_instant(e.data.start.as_ref());
            (start.is_none(), start, e.id.clone())
        });

        tracing::debug!(owner, range = %range.cache_key(), count = matched.len(), "Queried events");
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_add_update_delete() {
        let store = MemoryEventStore::new();
        let event = store
            .add("alice", &EventDraft::new("Lunch", "2024-01-05T12:00:00Z"))
            .await
            .unwrap();
        assert!(!event.id.is_empty());

        store
            .update("alice", &event.id, &EventPatch::completed(true))
            .await
            .unwrap();
        assert!(store.get("alice", &event.id).await.unwrap().data.completed);

        store.delete("alice", &event.id).await.unwrap();
        assert_eq!(store.get("alice", &event.id).await, None);

        let kinds: Vec<_> = store
            .writes()
            .await
            .iter()
            .map(|w| match w {
                StoreWrite::Add { .. } => "add",
                StoreWrite::Update { .. } => "update",
                StoreWrite::Delete { .. } => "delete",
            })
            .collect();
        assert_eq!(kinds, vec!["add", "update", "delete"]);
    }

    #[tokio::test]
    async fn test_update_missing_event_fails() {
        let store = MemoryEventStore::new();
        let result = store.update("alice", "nope", &EventPatch::completed(true)).await;
        assert!(matches!(result, Err(AgendaError::Store(_))));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejecting_store() {
        let store = MemoryEventStore::new();
        store.set_rejecting(true);
        let result = store.add("alice", &EventDraft::new("x", "2024-01-01")).await;
        assert!(matches!(result, Err(AgendaError::Store(_))));
        assert_eq!(store.len("alice").await, 0);
    }

    #[tokio::test]
    async fn test_query_filters_by_owner_and_range_sorted() {
        let store = MemoryEventStore::new();
        for (owner, title, start) in [
            ("alice", "late", "2024-01-20T09:00:00Z"),
            ("alice", "early", "2024-01-02T09:00:00Z"),
            ("alice", "february", "2024-02-02T09:00:00Z"),
            ("bob", "other", "2024-01-03T09:00:00Z"),
        ] {
            store.add(owner, &EventDraft::new(title, start)).await.unwrap();
        }

        let january = DateRange::between(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        )
        .unwrap();
        let titles: Vec<_> = store
            .query("alice", &january)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.data.title)
            .collect();
        assert_eq!(titles, vec!["early", "late"]);

        assert_eq!(store.query("alice", &DateRange::all()).await.unwrap().len(), 3);
        assert!(store.query("carol", &DateRange::all()).await.unwrap().is_empty());
    }
}
