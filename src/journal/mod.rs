//! The private prayer journal and its milestones.
//!
//! The journal is an append-mostly list of free-text entries, newest first,
//! plus the practice-continuity bookkeeping derived from it:
//!
//! - `first_entry_day` is set by the first entry ever created and never moves,
//!   even if that entry is later deleted.
//! - `days_with_entries` records every day on which an entry was created. Days
//!   are never removed; it answers "ever practised on this day".
//! - `seen_milestones` is append-only, so each [`MilestoneKind`] is surfaced
//!   at most once over the life of the store.
//!
//! Every public mutation runs as one synchronous critical section on the
//! in-memory state and then schedules a persistence write. Storage failures
//! never roll back or surface to the caller.


use crate::clock::{days_between, CalendarDay, Clock};
use crate::constants::{
    JOURNAL_NAMESPACE, ONE_MONTH_DAYS, ONE_WEEK_DAYS, ONE_YEAR_DAYS, SECOND_DISTINCT_DAY_COUNT,
    SIX_MONTHS_DAYS, TWO_WEEKS_DAYS,
};
use crate::storage::{load_or_default, KeyValueStore, Persister};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// One free-text journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Opaque unique identifier.
    pub id: String,
    /// The reading this entry was written against, if any.
    pub linked_content_id: Option<String>,
    /// Trimmed entry text. Never edited after creation.
    pub text: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// When the entry was marked answered, if it is.
    pub answered_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Whether the entry is currently marked answered.
    pub fn is_answered(&self) -> bool {
        self.answered_at.is_some()
    }
}

/// The one-time achievements, in the order they are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    FirstEntry,
    SecondDistinctDay,
    OneWeek,
    TwoWeeks,
    OneMonth,
    SixMonths,
    OneYear,
}

impl MilestoneKind {
    /// Every milestone, lowest order first.
    pub const ALL: [MilestoneKind; 7] = [
        MilestoneKind::FirstEntry,
        MilestoneKind::SecondDistinctDay,
        MilestoneKind::OneWeek,
        MilestoneKind::TwoWeeks,
        MilestoneKind::OneMonth,
        MilestoneKind::SixMonths,
        MilestoneKind::OneYear,
    ];

    /// Days since the first entry required, for the duration milestones.
    ///
    /// Months and years are plain day counts, not calendar arithmetic.
    pub fn required_days(self) -> Option<u32> {
        match self {
            MilestoneKind::FirstEntry | MilestoneKind::SecondDistinctDay => None,
            MilestoneKind::OneWeek => Some(ONE_WEEK_DAYS),
            MilestoneKind::TwoWeeks => Some(TWO_WEEKS_DAYS),
            MilestoneKind::OneMonth => Some(ONE_MONTH_DAYS),
            MilestoneKind::SixMonths => Some(SIX_MONTHS_DAYS),
            MilestoneKind::OneYear => Some(ONE_YEAR_DAYS),
        }
    }

    /// Short human label.
    pub fn label(self) -> &'static str {
        match self {
            MilestoneKind::FirstEntry => "First prayer",
            MilestoneKind::SecondDistinctDay => "2 days",
            MilestoneKind::OneWeek => "1 week",
            MilestoneKind::TwoWeeks => "2 weeks",
            MilestoneKind::OneMonth => "1 month",
            MilestoneKind::SixMonths => "6 months",
            MilestoneKind::OneYear => "1 year",
        }
    }
}

/// A milestone that is achieved but not yet seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub kind: MilestoneKind,
    pub label: &'static str,
}

impl From<MilestoneKind> for Milestone {
    fn from(kind: MilestoneKind) -> Self {
        Milestone {
            kind,
            label: kind.label(),
        }
    }
}

/// The complete, persisted journal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalState {
    /// Entries, newest first.
    pub entries: Vec<JournalEntry>,
    pub first_entry_day: Option<CalendarDay>,
    pub days_with_entries: BTreeSet<CalendarDay>,
    pub seen_milestones: BTreeSet<MilestoneKind>,
}

impl JournalState {
    /// Restores the bookkeeping invariants on a freshly loaded record.
    ///
    /// Only ever adds information: a missing first day is taken from the
    /// earliest surviving entry, and every entry's day is recorded.
    fn repair(&mut self, clock: &dyn Clock) {
        let entry_days: Vec<CalendarDay> = self
            .entries
            .iter()
            .map(|entry| clock.day_of(entry.created_at))
            .collect();

        if self.first_entry_day.is_none() {
            self.first_entry_day = entry_days.iter().min().copied();
        }
        self.days_with_entries.extend(entry_days);
    }

    fn is_achieved(&self, kind: MilestoneKind, today: CalendarDay) -> bool {
        match kind {
            MilestoneKind::FirstEntry => self.first_entry_day.is_some(),
            MilestoneKind::SecondDistinctDay => {
                self.days_with_entries.len() >= SECOND_DISTINCT_DAY_COUNT
            }
            _ => match (self.first_entry_day, kind.required_days()) {
                (Some(first), Some(required)) => days_between(first, today) >= required,
                _ => false,
            },
        }
    }
}

/// Owner of the journal state.
pub struct JournalStore {
    clock: Arc<dyn Clock>,
    state: watch::Sender<JournalState>,
    persister: Persister<JournalState>,
}

impl JournalStore {
    /// Loads the journal from `backend`, resetting to empty if it is corrupt.
    pub fn open(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, debounce: Duration) -> Self {
        let mut state: JournalState = load_or_default(backend.as_ref(), JOURNAL_NAMESPACE);
        state.repair(clock.as_ref());
        info!("Journal loaded with {} entries", state.entries.len());

        let (sender, _) = watch::channel(state);
        Self {
            clock,
            state: sender,
            persister: Persister::new(backend, JOURNAL_NAMESPACE, debounce),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> JournalState {
        self.state.borrow().clone()
    }

    /// Receives every future state change.
    pub fn subscribe(&self) -> watch::Receiver<JournalState> {
        self.state.subscribe()
    }

    /// Applies `mutate` atomically, then schedules a save if it reports a change.
    fn mutate(&self, mutate: impl FnOnce(&mut JournalState) -> bool) -> bool {
        let changed = self.state.send_if_modified(mutate);
        if changed {
            self.persister.schedule(&self.state.borrow());
        }
        changed
    }

    /// Records a new entry and returns it.
    ///
    /// Submitting empty text is blocked by the caller; the store trims but does
    /// not reject.
    pub fn add_entry(&self, text: &str, linked_content_id: Option<&str>) -> JournalEntry {
        let now = self.clock.now();
        let today = self.clock.day_of(now);
        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            linked_content_id: linked_content_id.map(str::to_string),
            text: text.trim().to_string(),
            created_at: now,
            answered_at: None,
        };

        let created = entry.clone();
        self.mutate(move |state| {
            state.entries.insert(0, entry);
            if state.first_entry_day.is_none() {
                state.first_entry_day = Some(today);
            }
            state.days_with_entries.insert(today);
            true
        });

        debug!("Added journal entry {}", created.id);
        created
    }

    /// Deletes an entry. Day bookkeeping is untouched.
    pub fn delete_entry(&self, id: &str) {
        let removed = self.mutate(|state| {
            let before = state.entries.len();
            state.entries.retain(|entry| entry.id != id);
            state.entries.len() != before
        });
        if removed {
            debug!("Deleted journal entry {}", id);
        } else {
            debug!("Delete ignored, no journal entry {}", id);
        }
    }

    /// Marks an entry answered now, or clears the mark. Idempotent.
    pub fn set_answered(&self, id: &str, answered: bool) {
        let now = self.clock.now();
        self.mutate(|state| {
            let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) else {
                return false;
            };
            match (answered, entry.answered_at) {
                (true, None) => {
                    entry.answered_at = Some(now);
                    true
                }
                (false, Some(_)) => {
                    entry.answered_at = None;
                    true
                }
                _ => false,
            }
        });
    }

    /// Entries created on `day`, newest first.
    pub fn entries_for_day(&self, day: CalendarDay) -> Vec<JournalEntry> {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|entry| self.clock.day_of(entry.created_at) == day)
            .cloned()
            .collect()
    }

    /// The calendar day an entry was created on.
    pub fn entry_day(&self, entry: &JournalEntry) -> CalendarDay {
        self.clock.day_of(entry.created_at)
    }

    /// Entries created today.
    pub fn entries_for_today(&self) -> Vec<JournalEntry> {
        self.entries_for_day(self.clock.today())
    }

    /// Entries not marked answered.
    pub fn active_entries(&self) -> Vec<JournalEntry> {
        self.filtered(|entry| !entry.is_answered())
    }

    /// Entries marked answered.
    pub fn answered_entries(&self) -> Vec<JournalEntry> {
        self.filtered(JournalEntry::is_answered)
    }

    fn filtered(&self, keep: impl Fn(&JournalEntry) -> bool) -> Vec<JournalEntry> {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }

    /// Days from the first entry to today, 0 for an empty journal.
    pub fn days_since_first_entry(&self) -> u32 {
        self.state
            .borrow()
            .first_entry_day
            .map(|first| days_between(first, self.clock.today()))
            .unwrap_or(0)
    }

    /// Number of distinct days on which an entry was ever created.
    pub fn unique_day_count(&self) -> usize {
        self.state.borrow().days_with_entries.len()
    }

    /// The lowest-order milestone that is achieved and not yet seen.
    ///
    /// Returns at most one milestone; mark it seen and call again to discover
    /// the next one.
    pub fn unseen_milestone(&self) -> Option<Milestone> {
        let today = self.clock.today();
        let state = self.state.borrow();
        MilestoneKind::ALL
            .into_iter()
            .filter(|kind| !state.seen_milestones.contains(kind))
            .find(|kind| state.is_achieved(*kind, today))
            .map(Milestone::from)
    }

    /// Records that `kind` has been shown. There is no way to unsee.
    pub fn mark_milestone_seen(&self, kind: MilestoneKind) {
        let inserted = self.mutate(|state| state.seen_milestones.insert(kind));
        if inserted {
            info!("Milestone seen: {:?}", kind);
        }
    }

    /// Writes any pending snapshot now.
    pub fn flush(&self) {
        self.persister.flush();
    }
}
