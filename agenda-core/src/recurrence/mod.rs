//! Recurrence rules: building, rewriting and expanding them.

pub mod expand;
pub mod options;
pub mod rule;

pub use expand::{MAX_EXPANDED_OCCURRENCES, expand, expand_with_limit};
pub use options::{Frequency, RecurrenceOptions, Repeat, RepeatForm, Termination, build};
pub use rule::{RecurrenceRule, frequency_of, restart, try_with_until, with_until};
