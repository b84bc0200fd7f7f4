//! RRULE expansion for recurring events.
//!
//! Expands a series root into the occurrences that fall within a date range,
//! skipping its exception dates.

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;

use crate::error::{AgendaError, AgendaResult};
use crate::event::Event;
use crate::recurrence::rule::{RecurrenceRule, UNTIL, until_inclusive_end};
use crate::store::DateRange;
use crate::view::{self, Occurrence};

/// Upper bound on occurrences produced by a single expansion.
pub const MAX_EXPANDED_OCCURRENCES: u16 = 365;

const ICS_UTC: &str = "%Y%m%dT%H%M%SZ";

/// Expand `event` into occurrences within `range`.
///
/// A non-recurring event yields its own view when its start is in range.
pub fn expand(event: &Event, range: &DateRange) -> AgendaResult<Vec<Occurrence>> {
    expand_with_limit(event, range, MAX_EXPANDED_OCCURRENCES)
}

pub fn expand_with_limit(
    event: &Event,
    range: &DateRange,
    limit: u16,
) -> AgendaResult<Vec<Occurrence>> {
    let Some(root) = view::to_view(event) else {
        return Ok(Vec::new());
    };

    let Some(rule) = root.rrule.as_deref().filter(|_| root.recurring) else {
        return Ok(if range.contains(root.start) {
            vec![root]
        } else {
            Vec::new()
        });
    };

    let Some(rrule_str) = build_rrule_string(root.start, rule, &root.exception_dates) else {
        // UNTIL ends before the first occurrence.
        return Ok(Vec::new());
    };

    let mut rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        AgendaError::InvalidRule(format!(
            "Failed to parse RRULE for event '{}': {}",
            event.id, e
        ))
    })?;

    // Subtract/add 1 second to make the range inclusive (after/before are exclusive).
    let tz: rrule::Tz = Utc.into();
    if let Some(from) = range.from {
        let from = from.checked_sub_signed(Duration::seconds(1)).unwrap_or(from);
        rrule_set = rrule_set.after(from.with_timezone(&tz));
    }
    if let Some(to) = range.to {
        let to = to.checked_add_signed(Duration::seconds(1)).unwrap_or(to);
        rrule_set = rrule_set.before(to.with_timezone(&tz));
    }

    let result = rrule_set.all(limit);
    if result.limited {
        tracing::debug!(event_id = %event.id, limit, "Expansion hit the occurrence limit");
    }

    let duration = root.duration();
    let occurrences = result
        .dates
        .iter()
        .map(|dt| {
            let start = dt.with_timezone(&Utc);
            Occurrence {
                start,
                end: duration.and_then(|d| start.checked_add_signed(d)),
                occurrence_date: start,
                ..root.clone()
            }
        })
        .collect::<Vec<_>>();

    tracing::trace!(event_id = %event.id, count = occurrences.len(), "Expanded series");
    Ok(occurrences)
}

/// Build an iCalendar-format DTSTART/RRULE/EXDATE block for the rrule parser.
///
/// Returns `None` when the rule's UNTIL is already past before `start`.
fn build_rrule_string(
    start: DateTime<Utc>,
    rule: &str,
    exception_dates: &[DateTime<Utc>],
) -> Option<String> {
    let mut rule = RecurrenceRule::parse(rule);

    if let Some(until) = rule.until().map(until_inclusive_end) {
        if until < start {
            return None;
        }
        rule.set(UNTIL, until.format(ICS_UTC).to_string());
    }

    let mut lines = vec![
        format!("DTSTART:{}", start.format(ICS_UTC)),
        format!("RRULE:{rule}"),
    ];
    lines.extend(
        exception_dates
            .iter()
            .map(|exdate| format!("EXDATE:{}", exdate.format(ICS_UTC))),
    );

    Some(lines.join("\n"))
}
