//! Recurrence rule strings (`FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`).
//!
//! [`RecurrenceRule`] is a lossless, best-effort view of a rule string: parts
//! keep their order and unknown or malformed parts survive a round trip, so a
//! rule written by some other client is never mangled by a rewrite.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::error::{AgendaError, AgendaResult};
use crate::recurrence::Frequency;

pub const FREQ: &str = "FREQ";
pub const INTERVAL: &str = "INTERVAL";
pub const BYDAY: &str = "BYDAY";
pub const BYMONTHDAY: &str = "BYMONTHDAY";
pub const COUNT: &str = "COUNT";
pub const UNTIL: &str = "UNTIL";

/// Format of the `UNTIL` value. Until dates are day-granular, so the time
/// part is always midnight UTC.
const UNTIL_FORMAT: &str = "%Y%m%dT000000Z";

/// One `KEY=VALUE` part. `value` is `None` when the part had no `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePart {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecurrenceRule {
    parts: Vec<RulePart>,
}

impl RecurrenceRule {
    /// Split on `;` then on the first `=`. Never fails; keys are upper-cased
    /// and an `RRULE:` prefix is dropped.
    pub fn parse(rule: &str) -> Self {
        let rule = rule.trim();
        let rule = rule.strip_prefix("RRULE:").unwrap_or(rule);

        let parts = rule
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => RulePart {
                    key: k.trim().to_ascii_uppercase(),
                    value: Some(v.trim().to_string()),
                },
                None => RulePart {
                    key: p.to_ascii_uppercase(),
                    value: None,
                },
            })
            .collect();

        RecurrenceRule { parts }
    }

    pub fn parts(&self) -> &[RulePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parts.iter().any(|p| p.key == key)
    }

    /// Replace the value of `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.parts.iter_mut().find(|p| p.key == key) {
            Some(part) => part.value = value,
            None => self.parts.push(RulePart {
                key: key.to_string(),
                value,
            }),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.parts.retain(|p| p.key != key);
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.get(FREQ).and_then(|f| f.parse().ok())
    }

    /// The `UNTIL` value as an instant, if present and readable.
    pub fn until(&self) -> Option<DateTime<Utc>> {
        self.get(UNTIL).and_then(parse_until)
    }

    /// Check the parts a rewrite depends on: a known `FREQ` and no bare keys.
    pub fn validate_structure(&self) -> AgendaResult<()> {
        if self.parts.is_empty() {
            return Err(AgendaError::InvalidRule("rule is empty".into()));
        }
        if let Some(part) = self.parts.iter().find(|p| p.value.is_none()) {
            return Err(AgendaError::InvalidRule(format!(
                "part '{}' has no value",
                part.key
            )));
        }
        if self.frequency().is_none() {
            return Err(AgendaError::InvalidRule(format!(
                "missing or unknown FREQ in '{self}'"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .parts
            .iter()
            .map(|p| match &p.value {
                Some(v) => format!("{}={}", p.key, v),
                None => p.key.clone(),
            })
            .collect::<Vec<_>>()
            .join(";");
        f.write_str(&joined)
    }
}

/// Serialize an until instant as a rule value.
pub fn format_until(until: DateTime<Utc>) -> String {
    until.format(UNTIL_FORMAT).to_string()
}

/// Read an `UNTIL` value: `YYYYMMDDTHHMMSSZ` or a bare `YYYYMMDD`.
pub fn parse_until(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Last instant covered by an `UNTIL` value. A midnight value is taken as the
/// whole UTC day it names, capped at the last representable instant.
pub fn until_inclusive_end(until: DateTime<Utc>) -> DateTime<Utc> {
    if until.num_seconds_from_midnight() == 0 && until.nanosecond() == 0 {
        until
            .checked_add_signed(Duration::days(1) - Duration::seconds(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    } else {
        until
    }
}

/// Set `UNTIL` on a rule string and drop any `COUNT`.
///
/// Returns `InvalidRule` when the string can't be safely rewritten; see
/// [`with_until`] for the forgiving variant.
pub fn try_with_until(rule: &str, until: DateTime<Utc>) -> AgendaResult<String> {
    let mut parsed = RecurrenceRule::parse(rule);
    parsed.validate_structure()?;

    parsed.remove(COUNT);
    parsed.set(UNTIL, format_until(until));

    tracing::trace!(before = rule, after = %parsed, "Rewrote rule termination");
    Ok(parsed.to_string())
}

/// Like [`try_with_until`], but a rule that can't be rewritten comes back
/// unchanged so a foreign rule string never blocks an otherwise valid edit.
pub fn with_until(rule: &str, until: DateTime<Utc>) -> String {
    match try_with_until(rule, until) {
        Ok(rewritten) => rewritten,
        Err(e) => {
            tracing::warn!(rule, error = %e, "Could not set UNTIL, keeping rule unchanged");
            rule.to_string()
        }
    }
}

/// Rule for a series continuing from `start`: `COUNT` is dropped, and `UNTIL`
/// is dropped too if it ends before `start`.
pub fn restart(rule: &str, start: DateTime<Utc>) -> String {
    let mut parsed = RecurrenceRule::parse(rule);
    parsed.remove(COUNT);
    if parsed
        .until()
        .is_some_and(|until| until_inclusive_end(until) < start)
    {
        parsed.remove(UNTIL);
    }
    parsed.to_string()
}

/// Frequency of a rule string, if it has a readable one.
pub fn frequency_of(rule: &str) -> Option<Frequency> {
    RecurrenceRule::parse(rule).frequency()
}
