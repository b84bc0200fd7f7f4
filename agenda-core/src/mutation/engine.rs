//! Event writes, including edits to one or more occurrences of a series.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::RecurrenceConfig;
use crate::error::{AgendaError, AgendaResult};
use crate::event::{Event, EventChanges, EventDraft, EventPatch};
use crate::mutation::scope::{EditAction, EditOutcome, EditRequest, EditScope, EditWarning};
use crate::recurrence::{self, MAX_EXPANDED_OCCURRENCES};
use crate::store::{DateRange, EventStore};
use crate::time::{self, NormalizedTime, TimeValue};
use crate::view::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Length of a replacement occurrence when its series has no usable end.
    pub default_duration: Duration,
    pub max_occurrences: u16,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            default_duration: Duration::hours(1),
            max_occurrences: MAX_EXPANDED_OCCURRENCES,
        }
    }
}

impl TryFrom<&RecurrenceConfig> for EngineOptions {
    type Error = AgendaError;

    fn try_from(config: &RecurrenceConfig) -> AgendaResult<Self> {
        let default_duration = Duration::from_std(config.default_duration()?).map_err(|e| {
            AgendaError::Config(format!("recurrence.default_duration out of range: {e}"))
        })?;
        if default_duration <= Duration::zero() {
            return Err(AgendaError::Config(
                "recurrence.default_duration must be greater than zero".to_string(),
            ));
        }
        Ok(EngineOptions {
            default_duration,
            max_occurrences: config.max_occurrences,
        })
    }
}

/// Applies creates, updates and deletes to an [`EventStore`].
pub struct EventMutationEngine<S> {
    store: Arc<S>,
    options: EngineOptions,
}

impl<S: EventStore> EventMutationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: EngineOptions) -> Self {
        EventMutationEngine { store, options }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Store a new event. Times are checked and written as instants.
    pub async fn create(&self, owner: &str, mut draft: EventDraft) -> AgendaResult<Event> {
        let start = valid_instant("start", draft.start.as_ref())?;
        let end = valid_instant("end", draft.end.as_ref())?;
        check_order(start, end)?;

        draft.start = start.map(TimeValue::Instant);
        draft.end = end.map(TimeValue::Instant);
        draft.updated_at = Some(Utc::now());

        tracing::debug!(owner, title = %draft.title, "Creating event");
        self.store.add(owner, &draft).await
    }

    pub async fn update(&self, owner: &str, id: &str, mut patch: EventPatch) -> AgendaResult<()> {
        let start = valid_instant("start", patch.start.as_ref())?;
        let end = valid_instant("end", patch.end.as_ref())?;
        check_order(start, end)?;

        patch.start = start.map(TimeValue::Instant);
        patch.end = end.map(TimeValue::Instant);
        patch.updated_at = Some(Utc::now());

        tracing::debug!(owner, event_id = id, "Updating event");
        self.store.update(owner, id, &patch).await
    }

    pub async fn delete(&self, owner: &str, id: &str) -> AgendaResult<()> {
        tracing::debug!(owner, event_id = id, "Deleting event");
        self.store.delete(owner, id).await
    }

    pub async fn toggle_completed(&self, owner: &str, id: &str, completed: bool) -> AgendaResult<()> {
        self.update(owner, id, EventPatch::completed(completed)).await
    }

    /// Delete all of `events`. Every delete is attempted; the first failure is returned.
    pub async fn clear_all(&self, owner: &str, events: &[Event]) -> AgendaResult<()> {
        tracing::info!(owner, count = events.len(), "Deleting all events");
        let results =
            futures::future::join_all(events.iter().map(|e| self.store.delete(owner, &e.id))).await;
        results.into_iter().collect()
    }

    /// Query the store and expand series into renderable occurrences.
    pub async fn occurrences(&self, owner: &str, range: &DateRange) -> AgendaResult<Vec<Occurrence>> {
        let events = self.store.query(owner, &DateRange::all()).await?;

        let mut occurrences = Vec::new();
        for event in &events {
            match recurrence::expand_with_limit(event, range, self.options.max_occurrences) {
                Ok(expanded) => occurrences.extend(expanded),
                Err(e) => {
                    tracing::warn!(owner, event_id = %event.id, error = %e, "Skipping series that failed to expand");
                }
            }
        }
        occurrences.sort_by_key(|o| o.start);
        Ok(occurrences)
    }

    /// Parse an [`EditRequest`] and apply it.
    pub async fn apply_request(
        &self,
        owner: &str,
        root: &Event,
        request: &EditRequest,
    ) -> AgendaResult<EditOutcome> {
        let scope: EditScope = request.scope.parse()?;
        let action: EditAction = request.action.parse()?;
        self.apply_recurring_edit(owner, root, &request.occurrence, scope, action, &request.changes)
            .await
    }

    /// Apply an edit to one occurrence, that occurrence and the rest, or the
    /// whole series.
    ///
    /// Everything is validated before the first write. Writes are issued in
    /// order and are not rolled back if a later one fails.
    pub async fn apply_recurring_edit(
        &self,
        owner: &str,
        root: &Event,
        occurrence: &TimeValue,
        scope: EditScope,
        action: EditAction,
        changes: &EventChanges,
    ) -> AgendaResult<EditOutcome> {
        let occurrence = match occurrence.normalize() {
            NormalizedTime::Valid(dt) => dt,
            NormalizedTime::Invalid { raw } => {
                return Err(AgendaError::InvalidInstant(format!("occurrence: '{raw}'")));
            }
        };
        let change_start = valid_instant("start", changes.start.as_ref())?;
        let change_end = valid_instant("end", changes.end.as_ref())?;

        let plan = EditPlan {
            root,
            occurrence,
            change_start,
            change_end,
            duration: series_duration(root),
            default_duration: (scope == EditScope::This).then_some(self.options.default_duration),
            changes,
            scope,
            action,
        };
        if scope == EditScope::Future {
            plan.until()?;
        }
        if action != EditAction::Delete {
            plan.check()?;
        }

        tracing::info!(
            owner,
            event_id = %root.id,
            %scope,
            %action,
            occurrence = %occurrence,
            "Applying recurring edit"
        );

        match scope {
            EditScope::All => self.edit_all(owner, &plan).await,
            EditScope::This => self.edit_this(owner, &plan).await,
            EditScope::Future => self.edit_future(owner, &plan).await,
        }
    }

    async fn edit_all(&self, owner: &str, plan: &EditPlan<'_>) -> AgendaResult<EditOutcome> {
        let root = plan.root;
        let patch = match plan.action {
            EditAction::Delete => {
                self.store.delete(owner, &root.id).await?;
                return Ok(EditOutcome::default());
            }
            EditAction::Update => EventPatch {
                start: plan.change_start.map(TimeValue::Instant),
                end: plan.change_end.map(TimeValue::Instant),
                ..plan.changes.to_patch()
            },
            EditAction::Complete => EventPatch::completed(plan.completed()),
        };

        Ok(EditOutcome {
            root: Some(self.patch_root(owner, root, patch).await?),
            ..Default::default()
        })
    }

    async fn edit_this(&self, owner: &str, plan: &EditPlan<'_>) -> AgendaResult<EditOutcome> {
        let root = plan.root;

        let mut exception_dates = root.data.exception_dates.clone();
        if !exception_dates.contains(&plan.occurrence) {
            exception_dates.push(plan.occurrence);
        }
        let root = self
            .patch_root(
                owner,
                root,
                EventPatch {
                    exception_dates: Some(exception_dates),
                    ..Default::default()
                },
            )
            .await?;

        if plan.action == EditAction::Delete {
            return Ok(EditOutcome {
                root: Some(root),
                ..Default::default()
            });
        }

        let start = plan.start();
        let end = plan.end()?;
        let changes = plan.changes;

        let draft = EventDraft {
            title: changes
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| root.data.title.clone()),
            description: changes
                .description
                .clone()
                .or_else(|| root.data.description.clone()),
            start: Some(TimeValue::Instant(start)),
            end: end.map(TimeValue::Instant),
            all_day: changes.all_day.unwrap_or(root.data.all_day),
            recurrence_rule: None,
            exception_dates: Vec::new(),
            completed: match plan.action {
                EditAction::Complete => plan.completed(),
                _ => changes.completed.unwrap_or(false),
            },
            original_event_id: Some(root.id.clone()),
            priority: changes.priority.clone().or_else(|| root.data.priority.clone()),
            updated_at: Some(Utc::now()),
        };

        let created = self.store.add(owner, &draft).await?;
        tracing::debug!(owner, event_id = %created.id, original_event_id = %root.id, "Created replacement occurrence");

        Ok(EditOutcome {
            root: Some(root),
            created: Some(created),
            warnings: Vec::new(),
        })
    }

    async fn edit_future(&self, owner: &str, plan: &EditPlan<'_>) -> AgendaResult<EditOutcome> {
        let root = plan.root;
        let original_rule = root.data.recurrence_rule.clone().unwrap_or_default();
        let until = plan.until()?;

        let mut warnings = Vec::new();
        let truncated = match recurrence::try_with_until(&original_rule, until) {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::warn!(owner, event_id = %root.id, rule = %original_rule, error = %e, "Could not end series, keeping its rule");
                warnings.push(EditWarning::RuleNotTruncated {
                    rule: original_rule.clone(),
                    reason: e.to_string(),
                });
                root.data.recurrence_rule.clone()
            }
        };
        let root = self
            .patch_root(
                owner,
                root,
                EventPatch {
                    recurrence_rule: Some(truncated),
                    ..Default::default()
                },
            )
            .await?;

        if plan.action == EditAction::Delete {
            return Ok(EditOutcome {
                root: Some(root),
                created: None,
                warnings,
            });
        }

        let start = plan.start();
        let end = plan.end()?;
        let changes = plan.changes;

        let rule = match changes.recurrence_rule.as_deref() {
            Some(rule) if !rule.trim().is_empty() => rule.to_string(),
            _ => recurrence::restart(&original_rule, start),
        };

        let mut draft = EventDraft {
            start: Some(TimeValue::Instant(start)),
            end: end.map(TimeValue::Instant),
            recurrence_rule: Some(rule),
            exception_dates: Vec::new(),
            original_event_id: None,
            updated_at: Some(Utc::now()),
            ..plan.root.data.clone()
        };
        draft.apply(&EventPatch {
            title: changes.title.clone().filter(|t| !t.trim().is_empty()),
            description: changes.description.clone(),
            all_day: changes.all_day,
            completed: match plan.action {
                EditAction::Complete => Some(plan.completed()),
                _ => changes.completed,
            },
            priority: changes.priority.clone(),
            ..Default::default()
        });

        let created = self.store.add(owner, &draft).await?;
        tracing::debug!(owner, event_id = %created.id, previous_series = %root.id, "Created new series");

        Ok(EditOutcome {
            root: Some(root),
            created: Some(created),
            warnings,
        })
    }

    /// Write `patch` onto the root and return the root as it now stands.
    async fn patch_root(&self, owner: &str, root: &Event, mut patch: EventPatch) -> AgendaResult<Event> {
        patch.updated_at = Some(Utc::now());
        self.store.update(owner, &root.id, &patch).await?;

        let mut updated = root.clone();
        updated.apply(&patch);
        Ok(updated)
    }
}

/// Inputs of one recurring edit, resolved and validated up front.
struct EditPlan<'a> {
    root: &'a Event,
    occurrence: DateTime<Utc>,
    change_start: Option<DateTime<Utc>>,
    change_end: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    /// Used when the series has no duration. Only a single replaced occurrence gets one.
    default_duration: Option<Duration>,
    changes: &'a EventChanges,
    scope: EditScope,
    action: EditAction,
}

impl EditPlan<'_> {
    /// Start of the replacement event or new series.
    fn start(&self) -> DateTime<Utc> {
        self.change_start.unwrap_or(self.occurrence)
    }

    /// End of the replacement event or new series.
    fn end(&self) -> AgendaResult<Option<DateTime<Utc>>> {
        if let Some(end) = self.change_end {
            return Ok(Some(end));
        }
        let Some(duration) = self.duration.or(self.default_duration) else {
            return Ok(None);
        };
        let start = self.start();
        start
            .checked_add_signed(duration)
            .map(Some)
            .ok_or_else(|| AgendaError::InvalidInstant(format!("end: {start} plus {duration} is out of range")))
    }

    /// Where a series truncated at this occurrence ends: the day before.
    fn until(&self) -> AgendaResult<DateTime<Utc>> {
        self.occurrence
            .checked_sub_signed(Duration::days(1))
            .ok_or_else(|| {
                AgendaError::InvalidInstant(format!(
                    "occurrence: {} has no day before it",
                    self.occurrence
                ))
            })
    }

    fn completed(&self) -> bool {
        self.changes.completed.unwrap_or(true)
    }

    /// The resulting event must end after it starts.
    fn check(&self) -> AgendaResult<()> {
        if self.scope == EditScope::All {
            let data = &self.root.data;
            let start = self.change_start.or_else(|| time::to_instant(data.start.as_ref()));
            let end = self.change_end.or_else(|| time::to_instant(data.end.as_ref()));
            return check_order(start, end);
        }

        check_order(Some(self.start()), self.end()?)
    }
}

/// Root end minus root start, when both are usable and in order.
fn series_duration(root: &Event) -> Option<Duration> {
    let start = time::to_instant(root.data.start.as_ref())?;
    let end = time::to_instant(root.data.end.as_ref())?;
    (end > start).then(|| end - start)
}

fn valid_instant(field: &str, value: Option<&TimeValue>) -> AgendaResult<Option<DateTime<Utc>>> {
    match time::normalize(value) {
        None => Ok(None),
        Some(NormalizedTime::Valid(dt)) => Ok(Some(dt)),
        Some(NormalizedTime::Invalid { raw }) => {
            Err(AgendaError::InvalidInstant(format!("{field}: '{raw}'")))
        }
    }
}

fn check_order(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> AgendaResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end <= start => Err(AgendaError::InvalidRange(format!(
            "end ({end}) is not after start ({start})"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn engine() -> EventMutationEngine<MemoryEventStore> {
        EventMutationEngine::new(Arc::new(MemoryEventStore::new()))
    }

    #[tokio::test]
    async fn test_create_writes_canonical_instants() {
        let engine = engine();
        let event = engine
            .create(
                "alice",
                EventDraft::new("Lunch", TimeValue::epoch_seconds(utc(5, 12).timestamp()))
                    .with_end("2024-01-05T13:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(event.data.start, Some(TimeValue::Instant(utc(5, 12))));
        assert_eq!(event.data.end, Some(TimeValue::Instant(utc(5, 13))));
        assert!(event.data.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_times() {
        let engine = engine();

        let bad_start = engine
            .create("alice", EventDraft::new("x", "whenever"))
            .await;
        assert!(matches!(bad_start, Err(AgendaError::InvalidInstant(_))));

        let inverted = engine
            .create(
                "alice",
                EventDraft::new("x", "2024-01-05T12:00:00Z").with_end("2024-01-05T11:00:00Z"),
            )
            .await;
        assert!(matches!(inverted, Err(AgendaError::InvalidRange(_))));

        assert!(engine.store().writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_completed() {
        let engine = engine();
        let event = engine
            .create("alice", EventDraft::new("Task", "2024-01-05T12:00:00Z"))
            .await
            .unwrap();

        engine.toggle_completed("alice", &event.id, true).await.unwrap();
        assert!(engine.store().get("alice", &event.id).await.unwrap().data.completed);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let engine = engine();
        let mut events = Vec::new();
        for day in 1..=3 {
            events.push(
                engine
                    .create("alice", EventDraft::new("x", utc(day, 9)))
                    .await
                    .unwrap(),
            );
        }

        engine.clear_all("alice", &events).await.unwrap();
        assert_eq!(engine.store().len("alice").await, 0);
    }

    #[tokio::test]
    async fn test_occurrences_expands_series() {
        let engine = engine();
        engine
            .create(
                "alice",
                EventDraft::new("Standup", utc(1, 9))
                    .with_end(utc(1, 10))
                    .with_rule("FREQ=DAILY;COUNT=3"),
            )
            .await
            .unwrap();
        engine
            .create("alice", EventDraft::new("Lunch", utc(2, 12)))
            .await
            .unwrap();

        let range = DateRange::between(utc(1, 0), utc(31, 0)).unwrap();
        let titles: Vec<_> = engine
            .occurrences("alice", &range)
            .await
            .unwrap()
            .into_iter()
            .map(|o| (o.title, o.start))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("Standup".to_string(), utc(1, 9)),
                ("Standup".to_string(), utc(2, 9)),
                ("Lunch".to_string(), utc(2, 12)),
                ("Standup".to_string(), utc(3, 9)),
            ]
        );
    }

    #[test]
    fn test_engine_options_from_config() {
        let options = EngineOptions::try_from(&RecurrenceConfig {
            default_duration: "30m".into(),
            max_occurrences: 10,
        })
        .unwrap();
        assert_eq!(options.default_duration, Duration::minutes(30));
        assert_eq!(options.max_occurrences, 10);

        assert!(EngineOptions::try_from(&RecurrenceConfig {
            default_duration: "a while".into(),
            max_occurrences: 10,
        })
        .is_err());

        let zero = EngineOptions::try_from(&RecurrenceConfig {
            default_duration: "0s".into(),
            max_occurrences: 10,
        });
        assert!(matches!(zero, Err(AgendaError::Config(_))));
    }

    #[test]
    fn test_series_duration() {
        let root = Event::new(
            "r",
            EventDraft::new("x", utc(1, 9)).with_end(utc(1, 11)),
        );
        assert_eq!(series_duration(&root), Some(Duration::hours(2)));

        let no_end = Event::new("r", EventDraft::new("x", utc(1, 9)));
        assert_eq!(series_duration(&no_end), None);
    }
}
