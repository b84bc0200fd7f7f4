//! Event store contract.
//!
//! The engine talks to persistence only through [`EventStore`]. Events are
//! scoped per owner; the owner id is an opaque string handed in by the caller.

mod date_range;
pub mod cached;
pub mod memory;

use std::future::Future;

pub use cached::CachedEventStore;
pub use date_range::DateRange;
pub use memory::{MemoryEventStore, StoreWrite};

use crate::error::AgendaResult;
use crate::event::{Event, EventDraft, EventPatch};

/// Document store holding an owner's events.
///
/// Implementations report failures as `AgendaError::Store`.
pub trait EventStore: Send + Sync {
    /// Persist a new event and return it with its assigned id.
    fn add(
        &self,
        owner: &str,
        draft: &EventDraft,
    ) -> impl Future<Output = AgendaResult<Event>> + Send;

    /// Write the fields set in `patch` onto an existing event.
    fn update(
        &self,
        owner: &str,
        id: &str,
        patch: &EventPatch,
    ) -> impl Future<Output = AgendaResult<()>> + Send;

    fn delete(&self, owner: &str, id: &str) -> impl Future<Output = AgendaResult<()>> + Send;

    /// Events whose start falls in `range`, sorted by start ascending.
    fn query(
        &self,
        owner: &str,
        range: &DateRange,
    ) -> impl Future<Output = AgendaResult<Vec<Event>>> + Send;
}
