//! Conversion between stored events and the calendar's view model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventDraft};
use crate::time::{self, NormalizedTime, TimeValue};

/// Title shown for events saved without one.
pub const UNTITLED: &str = "(No title)";

/// One renderable calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub recurring: bool,
    #[serde(default)]
    pub rrule: Option<String>,
    #[serde(default)]
    pub exception_dates: Vec<DateTime<Utc>>,
    pub completed: bool,
    pub original_event_id: String,
    /// The instant this entry stands for within its series.
    pub occurrence_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl Occurrence {
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end.map(|end| end - self.start)
    }
}

/// Convert a stored event for display. `None` if it has no usable start.
pub fn to_view(event: &Event) -> Option<Occurrence> {
    let data = &event.data;

    let start = match time::normalize(data.start.as_ref()) {
        Some(NormalizedTime::Valid(start)) => start,
        Some(NormalizedTime::Invalid { raw }) => {
            tracing::error!(event_id = %event.id, raw = %raw, "Event has an unreadable start time, skipping");
            return None;
        }
        None => {
            tracing::error!(event_id = %event.id, "Event has no start time, skipping");
            return None;
        }
    };

    let end = match time::normalize(data.end.as_ref()) {
        Some(NormalizedTime::Valid(end)) => Some(end),
        Some(NormalizedTime::Invalid { raw }) => {
            tracing::warn!(event_id = %event.id, raw = %raw, "Dropping unreadable end time");
            None
        }
        None => None,
    };

    let title = if data.title.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        data.title.clone()
    };

    Some(Occurrence {
        id: event.id.clone(),
        title,
        description: data.description.clone(),
        start,
        end,
        all_day: data.all_day,
        recurring: data.is_recurring(),
        rrule: data.recurrence_rule.clone(),
        exception_dates: data.exception_dates.clone(),
        completed: data.completed,
        original_event_id: event.original_event_id().to_string(),
        occurrence_date: start,
        priority: data.priority.clone(),
    })
}

/// Convert a view entry back into storable event data.
pub fn from_view(view: &Occurrence) -> EventDraft {
    let (recurrence_rule, exception_dates) = if view.recurring {
        (view.rrule.clone(), view.exception_dates.clone())
    } else {
        (None, Vec::new())
    };

    EventDraft {
        title: view.title.clone(),
        description: view.description.clone(),
        start: Some(TimeValue::Instant(view.start)),
        end: view.end.map(TimeValue::Instant),
        all_day: view.all_day,
        recurrence_rule,
        exception_dates,
        completed: view.completed,
        original_event_id: (view.original_event_id != view.id)
            .then(|| view.original_event_id.clone()),
        priority: view.priority.clone(),
        updated_at: None,
    }
}

/// Convert a batch, leaving out events that can't be rendered.
pub fn to_views(events: &[Event]) -> Vec<Occurrence> {
    let views: Vec<_> = events.iter().filter_map(to_view).collect();
    if views.len() < events.len() {
        tracing::debug!(
            total = events.len(),
            skipped = events.len() - views.len(),
            "Skipped unrenderable events"
        );
    }
    views
}
