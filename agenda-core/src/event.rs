//! Stored event types.
//!
//! Field names on the wire follow the document shape the store already holds
//! (`startTime`, `rrule`, `exdates`, ...), so records written here read back
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::TimeValue;

/// A persisted event: the store-assigned id plus its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(flatten)]
    pub data: EventDraft,
}

impl Event {
    pub fn new(id: impl Into<String>, data: EventDraft) -> Self {
        Event {
            id: id.into(),
            data,
        }
    }

    /// A series root carries a non-empty recurrence rule.
    pub fn is_series_root(&self) -> bool {
        self.data.is_recurring()
    }

    /// The id of the event this one was materialized from, or its own id.
    pub fn original_event_id(&self) -> &str {
        self.data.original_event_id.as_deref().unwrap_or(&self.id)
    }

    /// Apply a patch locally, the same way the store applies it.
    pub fn apply(&mut self, patch: &EventPatch) {
        self.data.apply(patch);
    }
}

/// Event data without an id: what gets sent to `add`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "startTime")]
    pub start: Option<TimeValue>,
    #[serde(default, rename = "endTime")]
    pub end: Option<TimeValue>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, rename = "rrule")]
    pub recurrence_rule: Option<String>,
    #[serde(default, rename = "exdates")]
    pub exception_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: impl Into<TimeValue>) -> Self {
        EventDraft {
            title: title.into(),
            start: Some(start.into()),
            ..Default::default()
        }
    }

    pub fn with_end(mut self, end: impl Into<TimeValue>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence_rule = Some(rule.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    pub fn apply(&mut self, patch: &EventPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(start) = &patch.start {
            self.start = Some(start.clone());
        }
        if let Some(end) = &patch.end {
            self.end = Some(end.clone());
        }
        if let Some(all_day) = patch.all_day {
            self.all_day = all_day;
        }
        if let Some(rule) = &patch.recurrence_rule {
            self.recurrence_rule = rule.clone();
        }
        if let Some(exception_dates) = &patch.exception_dates {
            self.exception_dates = exception_dates.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(priority) = &patch.priority {
            self.priority = Some(priority.clone());
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

/// A partial update. Only the fields that are set get written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeValue>,
    #[serde(default, rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    /// `Some(None)` clears the rule.
    #[serde(default, rename = "rrule", skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<Option<String>>,
    #[serde(default, rename = "exdates", skip_serializing_if = "Option::is_none")]
    pub exception_dates: Option<Vec<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn completed(completed: bool) -> Self {
        EventPatch {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }
}

/// Changes requested for a recurring edit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub end: Option<TimeValue>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub completed: Option<bool>,
    /// Replaces the pattern of the new series on a this-and-future edit.
    #[serde(default, rename = "rrule")]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl EventChanges {
    pub fn title(title: impl Into<String>) -> Self {
        EventChanges {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        EventChanges {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// The changes as a store patch (start/end passed through as given).
    pub fn to_patch(&self) -> EventPatch {
        EventPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            all_day: self.all_day,
            recurrence_rule: self.recurrence_rule.clone().map(Some),
            exception_dates: None,
            completed: self.completed,
            priority: self.priority.clone(),
            updated_at: None,
        }
    }
}
