//! Structured recurrence options and rule building.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, AgendaResult};
use crate::recurrence::rule::{
    BYDAY, BYMONTHDAY, COUNT, FREQ, INTERVAL, RecurrenceRule, UNTIL, format_until, parse_until,
};
use crate::time::TimeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            other => Err(AgendaError::InvalidRule(format!("unknown FREQ '{other}'"))),
        }
    }
}

/// Two-letter RFC 5545 weekday code.
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn parse_weekday_code(code: &str) -> AgendaResult<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        other => Err(AgendaError::InvalidRule(format!("unknown weekday '{other}'"))),
    }
}

/// How a series ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Termination {
    #[default]
    Never,
    /// Number of occurrences. Zero is treated as unbounded.
    Count(u32),
    /// Last day of the series, inclusive.
    Until(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceOptions {
    pub frequency: Frequency,
    /// Zero is treated as 1.
    pub interval: u32,
    /// Only used for weekly rules.
    pub by_weekday: Vec<Weekday>,
    /// Only used for monthly rules.
    pub by_month_day: Option<i8>,
    pub termination: Termination,
}

impl RecurrenceOptions {
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceOptions {
            frequency,
            interval: 1,
            by_weekday: Vec::new(),
            by_month_day: None,
            termination: Termination::Never,
        }
    }

    /// Serialize to a rule string. `COUNT` and `UNTIL` are never both emitted.
    pub fn to_rule(&self) -> String {
        let mut parts = vec![format!("{FREQ}={}", self.frequency)];

        if self.interval > 1 {
            parts.push(format!("{INTERVAL}={}", self.interval));
        }

        if self.frequency == Frequency::Weekly && !self.by_weekday.is_empty() {
            let mut days = self.by_weekday.clone();
            days.sort_by_key(|d| d.num_days_from_monday());
            days.dedup();
            let codes: Vec<&str> = days.into_iter().map(weekday_code).collect();
            parts.push(format!("{BYDAY}={}", codes.join(",")));
        }

        if self.frequency == Frequency::Monthly {
            if let Some(day) = self.by_month_day {
                parts.push(format!("{BYMONTHDAY}={day}"));
            }
        }

        match self.termination {
            Termination::Count(n) if n > 0 => parts.push(format!("{COUNT}={n}")),
            Termination::Until(until) => parts.push(format!("{UNTIL}={}", format_until(until))),
            Termination::Count(_) | Termination::Never => {}
        }

        parts.join(";")
    }
}

impl TryFrom<&RecurrenceRule> for RecurrenceOptions {
    type Error = AgendaError;

    /// Strict conversion; unknown parts are ignored but the known ones must be
    /// well-formed.
    fn try_from(rule: &RecurrenceRule) -> AgendaResult<Self> {
        let frequency: Frequency = rule
            .get(FREQ)
            .ok_or_else(|| AgendaError::InvalidRule(format!("missing FREQ in '{rule}'")))?
            .parse()?;

        let mut options = RecurrenceOptions::new(frequency);

        if let Some(interval) = rule.get(INTERVAL) {
            options.interval = parse_number(INTERVAL, interval)?;
        }

        if let Some(days) = rule.get(BYDAY) {
            options.by_weekday = days
                .split(',')
                .filter(|d| !d.trim().is_empty())
                .map(parse_weekday_code)
                .collect::<AgendaResult<_>>()?;
        }

        if let Some(day) = rule.get(BYMONTHDAY) {
            options.by_month_day = Some(parse_number(BYMONTHDAY, day)?);
        }

        options.termination = match (rule.get(COUNT), rule.get(UNTIL)) {
            (Some(_), Some(_)) => {
                return Err(AgendaError::InvalidRule(format!(
                    "COUNT and UNTIL are mutually exclusive in '{rule}'"
                )));
            }
            (Some(count), None) => Termination::Count(parse_number(COUNT, count)?),
            (None, Some(until)) => Termination::Until(parse_until(until).ok_or_else(|| {
                AgendaError::InvalidRule(format!("unreadable UNTIL '{until}'"))
            })?),
            (None, None) => Termination::Never,
        };

        Ok(options)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> AgendaResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgendaError::InvalidRule(format!("{key}={value} is not a valid number")))
}

/// What the user picked in the repeat selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom(RecurrenceOptions),
}

/// Build a rule string; `None` when no repeat was requested.
pub fn build(repeat: &Repeat) -> Option<String> {
    let rule = match repeat {
        Repeat::None => return None,
        Repeat::Daily => RecurrenceOptions::new(Frequency::Daily).to_rule(),
        Repeat::Weekly => RecurrenceOptions::new(Frequency::Weekly).to_rule(),
        Repeat::Monthly => RecurrenceOptions::new(Frequency::Monthly).to_rule(),
        Repeat::Yearly => RecurrenceOptions::new(Frequency::Yearly).to_rule(),
        Repeat::Custom(options) => options.to_rule(),
    };
    tracing::trace!(rule = %rule, "Built recurrence rule");
    Some(rule)
}

/// The repeat section of the event form, as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatForm {
    #[serde(default)]
    pub repeat: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub month_day: Option<i8>,
    /// `"never"`, `"count"` or `"until"`.
    #[serde(default)]
    pub end_type: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub until: Option<TimeValue>,
}

impl TryFrom<&RepeatForm> for Repeat {
    type Error = AgendaError;

    fn try_from(form: &RepeatForm) -> AgendaResult<Self> {
        let repeat = form.repeat.as_deref().map(str::to_ascii_lowercase);
        match repeat.as_deref() {
            None | Some("") | Some("none") => Ok(Repeat::None),
            Some("daily") => Ok(Repeat::Daily),
            Some("weekly") => Ok(Repeat::Weekly),
            Some("monthly") => Ok(Repeat::Monthly),
            Some("yearly") => Ok(Repeat::Yearly),
            Some("custom") => {
                let frequency = match form.frequency.as_deref() {
                    Some(f) => f.parse()?,
                    None => Frequency::Weekly,
                };

                let mut options = RecurrenceOptions::new(frequency);
                options.interval = form.interval.unwrap_or(1).max(1);
                options.by_weekday = form
                    .days
                    .iter()
                    .map(|d| parse_weekday_code(d))
                    .collect::<AgendaResult<_>>()?;
                options.by_month_day = form.month_day;
                options.termination = match form.end_type.as_deref() {
                    Some("count") => form
                        .count
                        .filter(|c| *c > 0)
                        .map(Termination::Count)
                        .unwrap_or_default(),
                    Some("until") => match &form.until {
                        Some(until) => Termination::Until(until.normalize().valid().ok_or_else(
                            || AgendaError::InvalidInstant(format!("repeat until: {until:?}")),
                        )?),
                        None => Termination::Never,
                    },
                    _ => Termination::Never,
                };

                Ok(Repeat::Custom(options))
            }
            Some(other) => Err(AgendaError::InvalidRule(format!(
                "unknown repeat option '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_presets() {
        assert_eq!(build(&Repeat::None), None);
        assert_eq!(build(&Repeat::Daily).as_deref(), Some("FREQ=DAILY"));
        assert_eq!(build(&Repeat::Weekly).as_deref(), Some("FREQ=WEEKLY"));
        assert_eq!(build(&Repeat::Monthly).as_deref(), Some("FREQ=MONTHLY"));
        assert_eq!(build(&Repeat::Yearly).as_deref(), Some("FREQ=YEARLY"));
    }

    #[test]
    fn test_custom_weekly_with_interval_and_days() {
        let mut options = RecurrenceOptions::new(Frequency::Weekly);
        options.interval = 2;
        options.by_weekday = vec![Weekday::Wed, Weekday::Mon, Weekday::Wed];

        assert_eq!(
            build(&Repeat::Custom(options)).as_deref(),
            Some("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE")
        );
    }

    #[test]
    fn test_by_rules_only_for_matching_frequency() {
        let mut options = RecurrenceOptions::new(Frequency::Daily);
        options.by_weekday = vec![Weekday::Mon];
        options.by_month_day = Some(3);
        assert_eq!(options.to_rule(), "FREQ=DAILY");

        options.frequency = Frequency::Monthly;
        assert_eq!(options.to_rule(), "FREQ=MONTHLY;BYMONTHDAY=3");
    }

    #[test]
    fn test_termination() {
        let mut options = RecurrenceOptions::new(Frequency::Daily);
        options.termination = Termination::Count(5);
        assert_eq!(options.to_rule(), "FREQ=DAILY;COUNT=5");

        options.termination = Termination::Count(0);
        assert_eq!(options.to_rule(), "FREQ=DAILY");

        options.termination =
            Termination::Until(Utc.with_ymd_and_hms(2024, 6, 30, 15, 0, 0).unwrap());
        assert_eq!(options.to_rule(), "FREQ=DAILY;UNTIL=20240630T000000Z");
    }

    #[test]
    fn test_never_emits_count_and_until_together() {
        let until = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        for frequency in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            for termination in [
                Termination::Never,
                Termination::Count(0),
                Termination::Count(3),
                Termination::Until(until),
            ] {
                let mut options = RecurrenceOptions::new(frequency);
                options.termination = termination;
                let rule = options.to_rule();
                assert!(
                    !(rule.contains("COUNT=") && rule.contains("UNTIL=")),
                    "{rule}"
                );
            }
        }
    }

    #[test]
    fn test_form_payload_scenario() {
        let form: RepeatForm = serde_json::from_str(
            r#"{"repeat":"custom","frequency":"WEEKLY","interval":2,"days":["MO","WE"]}"#,
        )
        .unwrap();
        let repeat = Repeat::try_from(&form).unwrap();
        assert_eq!(
            build(&repeat).as_deref(),
            Some("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE")
        );
    }

    #[test]
    fn test_form_until_and_count() {
        let form: RepeatForm = serde_json::from_str(
            r#"{"repeat":"custom","frequency":"DAILY","endType":"until","until":"2024-02-01"}"#,
        )
        .unwrap();
        assert_eq!(
            build(&Repeat::try_from(&form).unwrap()).as_deref(),
            Some("FREQ=DAILY;UNTIL=20240201T000000Z")
        );

        let form: RepeatForm = serde_json::from_str(
            r#"{"repeat":"custom","frequency":"MONTHLY","monthDay":15,"endType":"count","count":4}"#,
        )
        .unwrap();
        assert_eq!(
            build(&Repeat::try_from(&form).unwrap()).as_deref(),
            Some("FREQ=MONTHLY;BYMONTHDAY=15;COUNT=4")
        );
    }

    #[test]
    fn test_form_rejects_unknown_values() {
        let form = RepeatForm {
            repeat: Some("fortnightly".into()),
            ..Default::default()
        };
        assert!(Repeat::try_from(&form).is_err());

        let form = RepeatForm {
            repeat: Some("custom".into()),
            days: vec!["XX".into()],
            ..Default::default()
        };
        assert!(Repeat::try_from(&form).is_err());
    }

    #[test]
    fn test_options_from_rule() {
        let rule = RecurrenceRule::parse("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=6");
        let options = RecurrenceOptions::try_from(&rule).unwrap();
        assert_eq!(options.frequency, Frequency::Weekly);
        assert_eq!(options.interval, 2);
        assert_eq!(options.by_weekday, vec![Weekday::Mon, Weekday::Wed]);
        assert_eq!(options.termination, Termination::Count(6));
        assert_eq!(options.to_rule(), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;COUNT=6");
    }

    #[test]
    fn test_options_from_rule_rejects_both_terminations() {
        let rule = RecurrenceRule::parse("FREQ=DAILY;COUNT=2;UNTIL=20240101T000000Z");
        assert!(RecurrenceOptions::try_from(&rule).is_err());

        let rule = RecurrenceRule::parse("FREQ=DAILY;INTERVAL=two");
        assert!(RecurrenceOptions::try_from(&rule).is_err());
    }
}
