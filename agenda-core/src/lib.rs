//! Core of the agenda calendar.
//!
//! This crate provides:
//! - `Event` and related types as they are stored
//! - `recurrence` for building, rewriting and expanding recurrence rules
//! - `view` for converting stored events into renderable occurrences
//! - `mutation` for creating, editing and deleting events, including edits to
//!   one or more occurrences of a recurring series
//! - `store` for the event store contract plus in-memory and cached stores

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod mutation;
pub mod recurrence;
pub mod store;
pub mod time;
pub mod view;

pub use cache::TimedCache;
pub use config::Settings;
pub use error::{AgendaError, AgendaResult};
pub use event::{Event, EventChanges, EventDraft, EventPatch};
pub use mutation::{
    EditAction, EditOutcome, EditRequest, EditScope, EditWarning, EngineOptions,
    EventMutationEngine,
};
pub use store::{CachedEventStore, DateRange, EventStore, MemoryEventStore};
pub use time::{NormalizedTime, TimeValue};
pub use view::Occurrence;
