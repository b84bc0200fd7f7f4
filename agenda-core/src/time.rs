//! Time value normalization.
//!
//! Stored events carry their times in whatever shape the document store handed
//! back: a native instant, a wire timestamp object (`{seconds, nanoseconds}`),
//! epoch milliseconds or a date string. Everything is funneled through
//! [`normalize`] into a UTC instant.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A time value in any of the shapes the store may return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// A native instant (serialized as RFC 3339).
    Instant(DateTime<Utc>),
    /// Wire timestamp. A bare `{seconds}` object is plain epoch seconds.
    Timestamp {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
    /// Epoch milliseconds.
    Millis(i64),
    /// Epoch milliseconds written as a JSON float, e.g. `1704445200000.0`.
    FractionalMillis(f64),
    /// A date or date-time string.
    Text(String),
}

impl TimeValue {
    pub fn epoch_seconds(seconds: i64) -> Self {
        TimeValue::Timestamp {
            seconds,
            nanoseconds: 0,
        }
    }

    /// Shorthand for `normalize(Some(self))`.
    pub fn normalize(&self) -> NormalizedTime {
        normalize_value(self)
    }
}

impl From<DateTime<Utc>> for TimeValue {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeValue::Instant(dt)
    }
}

impl From<&str> for TimeValue {
    fn from(s: &str) -> Self {
        TimeValue::Text(s.to_string())
    }
}

impl From<String> for TimeValue {
    fn from(s: String) -> Self {
        TimeValue::Text(s)
    }
}

/// Result of normalizing a [`TimeValue`].
///
/// An unparsable value is not an error: batch callers need to tell "no time"
/// (`None` from [`normalize`]) apart from "bad time" without aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedTime {
    Valid(DateTime<Utc>),
    Invalid { raw: String },
}

impl NormalizedTime {
    pub fn is_valid(&self) -> bool {
        matches!(self, NormalizedTime::Valid(_))
    }

    pub fn valid(&self) -> Option<DateTime<Utc>> {
        match self {
            NormalizedTime::Valid(dt) => Some(*dt),
            NormalizedTime::Invalid { .. } => None,
        }
    }
}

/// Normalize an optional time value. `None` in means `None` out.
pub fn normalize(value: Option<&TimeValue>) -> Option<NormalizedTime> {
    value.map(normalize_value)
}

/// Normalize straight to a valid instant, discarding invalid values.
pub fn to_instant(value: Option<&TimeValue>) -> Option<DateTime<Utc>> {
    normalize(value).and_then(|n| n.valid())
}

fn normalize_value(value: &TimeValue) -> NormalizedTime {
    let parsed = match value {
        TimeValue::Instant(dt) => Some(*dt),
        TimeValue::Timestamp {
            seconds,
            nanoseconds,
        } => Utc.timestamp_opt(*seconds, *nanoseconds).single(),
        TimeValue::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
        TimeValue::FractionalMillis(ms) => from_fractional_millis(*ms),
        TimeValue::Text(s) => parse_text(s.trim()),
    };

    match parsed {
        Some(dt) => NormalizedTime::Valid(dt),
        None => NormalizedTime::Invalid {
            raw: raw_string(value),
        },
    }
}

fn raw_string(value: &TimeValue) -> String {
    match value {
        TimeValue::Instant(dt) => dt.to_rfc3339(),
        TimeValue::Timestamp {
            seconds,
            nanoseconds,
        } => format!("{{seconds: {seconds}, nanoseconds: {nanoseconds}}}"),
        TimeValue::Millis(ms) => ms.to_string(),
        TimeValue::FractionalMillis(ms) => ms.to_string(),
        TimeValue::Text(s) => s.clone(),
    }
}

fn from_fractional_millis(ms: f64) -> Option<DateTime<Utc>> {
    let whole = ms.floor();
    if !whole.is_finite() || whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return None;
    }
    let sub_millis = Duration::nanoseconds(((ms - whole) * 1_000_000.0).round() as i64);
    Utc.timestamp_millis_opt(whole as i64)
        .single()?
        .checked_add_signed(sub_millis)
}

/// Parse the date string formats seen in stored events. Strings without an
/// offset are taken as UTC.
fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y%m%dT%H%M%SZ",
        "%Y%m%dT%H%M%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_none_stays_none() {
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_instant_passes_through() {
        let dt = utc(2024, 1, 5, 9, 0);
        assert_eq!(
            normalize(Some(&TimeValue::Instant(dt))),
            Some(NormalizedTime::Valid(dt))
        );
    }

    #[test]
    fn test_epoch_seconds_and_timestamp() {
        let dt = utc(2024, 1, 5, 9, 0);
        let seconds = dt.timestamp();
        assert_eq!(TimeValue::epoch_seconds(seconds).normalize().valid(), Some(dt));

        let with_nanos = TimeValue::Timestamp {
            seconds,
            nanoseconds: 500_000_000,
        };
        assert_eq!(
            with_nanos.normalize().valid().unwrap().timestamp_subsec_millis(),
            500
        );
    }

    #[test]
    fn test_millis() {
        let dt = utc(2024, 1, 5, 9, 0);
        assert_eq!(
            TimeValue::Millis(dt.timestamp_millis()).normalize().valid(),
            Some(dt)
        );
    }

    #[test]
    fn test_text_formats() {
        let dt = utc(2024, 1, 5, 9, 0);
        for s in [
            "2024-01-05T09:00:00Z",
            "2024-01-05T10:00:00+01:00",
            "2024-01-05T09:00:00.000Z",
            "2024-01-05T09:00",
            "2024-01-05T09:00:00",
            "20240105T090000Z",
        ] {
            assert_eq!(TimeValue::from(s).normalize().valid(), Some(dt), "{s}");
        }
        assert_eq!(
            TimeValue::from("2024-01-05").normalize().valid(),
            Some(utc(2024, 1, 5, 0, 0))
        );
    }

    #[test]
    fn test_unparsable_text_is_invalid_not_none() {
        let normalized = normalize(Some(&TimeValue::from("next tuesday"))).unwrap();
        assert!(!normalized.is_valid());
        assert_eq!(
            normalized,
            NormalizedTime::Invalid {
                raw: "next tuesday".to_string()
            }
        );
    }

    #[test]
    fn test_out_of_range_seconds_is_invalid() {
        assert!(!TimeValue::epoch_seconds(i64::MAX).normalize().is_valid());
    }

    #[test]
    fn test_deserialize_wire_shapes() {
        let values: Vec<TimeValue> = serde_json::from_str(
            r#"["2024-01-05T09:00:00Z", {"seconds": 1704445200, "nanoseconds": 0}, {"seconds": 1704445200}, 1704445200000, "garbage"]"#,
        )
        .unwrap();

        let dt = utc(2024, 1, 5, 9, 0);
        assert_eq!(values[0], TimeValue::Instant(dt));
        assert_eq!(values[1].normalize().valid(), Some(dt));
        assert_eq!(values[2].normalize().valid(), Some(dt));
        assert_eq!(values[3], TimeValue::Millis(1_704_445_200_000));
        assert_eq!(values[4], TimeValue::Text("garbage".to_string()));
    }

    #[test]
    fn test_deserialize_float_millis() {
        let dt = utc(2024, 1, 5, 9, 0);
        let value: TimeValue = serde_json::from_str("1704445200000.0").unwrap();
        assert_eq!(value, TimeValue::FractionalMillis(1_704_445_200_000.0));
        assert_eq!(value.normalize().valid(), Some(dt));

        let half: TimeValue = serde_json::from_str("1704445200000.5").unwrap();
        assert_eq!(
            half.normalize().valid(),
            Some(dt + Duration::microseconds(500))
        );

        assert!(!TimeValue::FractionalMillis(1e300).normalize().is_valid());
        assert_eq!(
            TimeValue::FractionalMillis(f64::NAN).normalize(),
            NormalizedTime::Invalid {
                raw: "NaN".to_string()
            }
        );
    }
}
