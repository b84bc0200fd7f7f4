//! Date range for filtering events.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AgendaError, AgendaResult};

/// Date range for filtering events.
/// None values mean unbounded in that direction. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Everything.
    pub fn all() -> Self {
        DateRange::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> AgendaResult<Self> {
        if to < from {
            return Err(AgendaError::InvalidRange(format!(
                "range ends ({to}) before it starts ({from})"
            )));
        }
        Ok(DateRange {
            from: Some(from),
            to: Some(to),
        })
    }

    /// Parse YYYY-MM-DD bounds: `from` at start of day, `to` at end of day.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> AgendaResult<Self> {
        let from = from.map(|s| parse_date(s, 0, 0, 0)).transpose()?;
        let to = to.map(|s| parse_date(s, 23, 59, 59)).transpose()?;
        match (from, to) {
            (Some(from), Some(to)) => Self::between(from, to),
            _ => Ok(DateRange { from, to }),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
    }

    /// Stable string form, used in cache keys.
    pub fn cache_key(&self) -> String {
        let bound = |b: Option<DateTime<Utc>>| b.map_or_else(|| "*".to_string(), |dt| dt.timestamp().to_string());
        format!("{}..{}", bound(self.from), bound(self.to))
    }
}

fn parse_date(s: &str, h: u32, m: u32, sec: u32) -> AgendaResult<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(h, m, sec))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AgendaError::InvalidRange(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_args() {
        let range = DateRange::from_args(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(range.from, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(range.to, Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()));

        assert!(matches!(
            DateRange::from_args(Some("01/01/2024"), None),
            Err(AgendaError::InvalidRange(_))
        ));
        assert!(matches!(
            DateRange::from_args(Some("2024-02-01"), Some("2024-01-01")),
            Err(AgendaError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let range = DateRange::between(from, to).unwrap();

        assert!(range.contains(from));
        assert!(range.contains(to));
        assert!(!range.contains(to + chrono::Duration::seconds(1)));
        assert!(DateRange::all().contains(from));
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(DateRange::all().cache_key(), "*..*");
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let range = DateRange { from: Some(from), to: None };
        assert_eq!(range.cache_key(), "1704067200..*");
    }
}
