//! Event mutation: plain CRUD plus scope-aware edits to recurring series.
//!
//! An edit to a series picks one of three scopes:
//!
//! - `This`: the occurrence is added to the root's exception dates, and for
//!   anything but a delete a standalone replacement event is created.
//! - `Future`: the root's rule gets an `UNTIL` the day before the occurrence,
//!   and for anything but a delete a new series starts at the occurrence.
//! - `All`: the root itself is updated, completed or deleted.

mod engine;
mod scope;

pub use engine::{EngineOptions, EventMutationEngine};
pub use scope::{EditAction, EditOutcome, EditRequest, EditScope, EditWarning};
