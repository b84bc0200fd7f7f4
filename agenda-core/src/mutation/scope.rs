//! Edit scope, action and outcome types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgendaError;
use crate::event::{Event, EventChanges};
use crate::time::TimeValue;

/// Which occurrences of a series an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditScope {
    /// Only the chosen occurrence.
    This,
    /// The chosen occurrence and every later one.
    Future,
    /// The whole series.
    All,
}

impl EditScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditScope::This => "this",
            EditScope::Future => "future",
            EditScope::All => "all",
        }
    }
}

impl fmt::Display for EditScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditScope {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "this" => Ok(EditScope::This),
            "future" => Ok(EditScope::Future),
            "all" => Ok(EditScope::All),
            _ => Err(AgendaError::UnknownScope(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditAction {
    Update,
    Delete,
    Complete,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::Update => "update",
            EditAction::Delete => "delete",
            EditAction::Complete => "complete",
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditAction {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(EditAction::Update),
            "delete" => Ok(EditAction::Delete),
            "complete" => Ok(EditAction::Complete),
            _ => Err(AgendaError::UnknownAction(s.to_string())),
        }
    }
}

/// A recurring edit as it arrives from a client, scope and action unparsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub scope: String,
    pub action: String,
    pub occurrence: TimeValue,
    #[serde(default)]
    pub changes: EventChanges,
}

/// Something that went wrong without stopping the edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditWarning {
    /// The old series' rule couldn't be given an end date and was saved as it was.
    RuleNotTruncated { rule: String, reason: String },
}

impl fmt::Display for EditWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditWarning::RuleNotTruncated { rule, reason } => {
                write!(f, "rule '{rule}' was not truncated: {reason}")
            }
        }
    }
}

/// Result of a recurring edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditOutcome {
    /// The series root after the edit; `None` if it was deleted.
    pub root: Option<Event>,
    /// Replacement event or new series, if one was created.
    pub created: Option<Event>,
    pub warnings: Vec<EditWarning>,
}
