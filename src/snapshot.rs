//! In-memory working set of reminders.
//!
//! [`Snapshot`] keeps every live reminder keyed by ID together with the
//! insertion index it was given, plus the set of IDs still waiting to be
//! notified. The pending set holds IDs only, so it cannot disagree with the
//! reminder content held in `all`.

use crate::model::Reminder;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// A reminder together with its stable insertion index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Position used to reproduce file order on save.
    pub index: usize,
    /// The reminder itself.
    pub reminder: Reminder,
}

/// All live reminders plus the not-yet-due subset.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    all: HashMap<u64, SnapshotEntry>,
    uncompleted: BTreeSet<u64>,
    next_index: usize,
}

impl Snapshot {
    /// Build a snapshot from reminders in file order.
    ///
    /// Reminders that are pending and due after `now` form the uncompleted
    /// set. A duplicated ID keeps its first position and its last content.
    pub fn from_ordered(reminders: Vec<Reminder>, now: DateTime<Utc>) -> Self {
        let mut snapshot = Self::default();
        for reminder in reminders {
            let id = reminder.id;
            let pending = reminder.is_due_after(now);
            match snapshot.all.get_mut(&id) {
                Some(entry) => entry.reminder = reminder,
                None => {
                    snapshot.insert(reminder);
                }
            }
            snapshot.set_uncompleted(id, pending);
        }
        snapshot
    }

    /// Insert a new reminder at the next insertion index and mark it
    /// uncompleted. Returns the index it was given.
    pub fn insert(&mut self, reminder: Reminder) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.uncompleted.insert(reminder.id);
        self.all.insert(reminder.id, SnapshotEntry { index, reminder });
        index
    }

    /// Replace the content of an existing reminder, keeping its index.
    ///
    /// Returns `false` if the ID is not present.
    pub fn replace(&mut self, reminder: Reminder) -> bool {
        match self.all.get_mut(&reminder.id) {
            Some(entry) => {
                entry.reminder = reminder;
                true
            }
            None => false,
        }
    }

    /// Add or drop an ID from the uncompleted set. IDs not in `all` are ignored.
    pub fn set_uncompleted(&mut self, id: u64, uncompleted: bool) {
        if uncompleted && self.all.contains_key(&id) {
            self.uncompleted.insert(id);
        } else {
            self.uncompleted.remove(&id);
        }
    }

    /// Remove a reminder from both views.
    pub fn remove(&mut self, id: u64) -> Option<Reminder> {
        self.uncompleted.remove(&id);
        self.all.remove(&id).map(|entry| entry.reminder)
    }

    /// Look up a live reminder.
    pub fn get(&self, id: u64) -> Option<&Reminder> {
        self.all.get(&id).map(|entry| &entry.reminder)
    }

    /// Look up a live reminder with its insertion index.
    pub fn entry(&self, id: u64) -> Option<&SnapshotEntry> {
        self.all.get(&id)
    }

    /// `true` if the ID is live.
    pub fn contains(&self, id: u64) -> bool {
        self.all.contains_key(&id)
    }

    /// `true` if the ID is waiting to be notified.
    pub fn is_uncompleted(&self, id: u64) -> bool {
        self.uncompleted.contains(&id)
    }

    /// Iterate over the reminders waiting to be notified, by ascending ID.
    pub fn uncompleted(&self) -> impl Iterator<Item = &Reminder> {
        self.uncompleted.iter().filter_map(|id| self.get(*id))
    }

    /// Number of live reminders.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// `true` when there are no live reminders.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Number of reminders waiting to be notified.
    pub fn uncompleted_len(&self) -> usize {
        self.uncompleted.len()
    }

    /// Every live reminder in insertion order.
    ///
    /// Indices left unused by deletions are skipped, so the result is dense.
    pub fn ordered(&self) -> Vec<Reminder> {
        let mut entries: Vec<&SnapshotEntry> = self.all.values().collect();
        entries.sort_by_key(|entry| entry.index);
        entries
            .into_iter()
            .map(|entry| entry.reminder.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::model::{ELAPSED_DURATION, ReminderStatus};
    use chrono::TimeDelta;

    fn reminder(id: u64, duration: TimeDelta, now: DateTime<Utc>) -> Reminder {
        Reminder {
            id,
            title: format!("title {id}"),
            message: format!("message {id}"),
            duration,
            created_at: now,
            modified_at: now,
            status: ReminderStatus::Pending,
        }
    }

    #[test]
    fn from_ordered_splits_pending_and_elapsed() {
        let now = Utc::now();
        let snapshot = Snapshot::from_ordered(
            vec![
                reminder(1, TimeDelta::minutes(5), now),
                reminder(2, ELAPSED_DURATION, now),
                reminder(3, TimeDelta::hours(1), now),
            ],
            now,
        );

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.uncompleted_len(), 2);
        assert!(snapshot.is_uncompleted(1));
        assert!(!snapshot.is_uncompleted(2));
        assert!(snapshot.is_uncompleted(3));
        assert_eq!(snapshot.entry(3).unwrap().index, 2);
    }

    #[test]
    fn notified_reminders_are_not_uncompleted_on_load() {
        let now = Utc::now();
        let mut notified = reminder(1, TimeDelta::hours(1), now);
        notified.status = ReminderStatus::Notified;
        let snapshot = Snapshot::from_ordered(vec![notified], now);
        assert!(snapshot.contains(1));
        assert!(!snapshot.is_uncompleted(1));
    }

    #[test]
    fn ordered_skips_gaps_left_by_removals() {
        let now = Utc::now();
        let mut snapshot = Snapshot::default();
        for id in [10, 11, 12, 13] {
            snapshot.insert(reminder(id, TimeDelta::minutes(1), now));
        }
        snapshot.remove(11);
        snapshot.remove(13);
        snapshot.insert(reminder(14, TimeDelta::minutes(1), now));

        let ids: Vec<u64> = snapshot.ordered().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 12, 14]);
    }

    #[test]
    fn replace_keeps_index() {
        let now = Utc::now();
        let mut snapshot = Snapshot::default();
        snapshot.insert(reminder(1, TimeDelta::minutes(1), now));
        snapshot.insert(reminder(2, TimeDelta::minutes(1), now));

        let mut edited = snapshot.get(1).cloned().unwrap();
        edited.title = "edited".to_owned();
        assert!(snapshot.replace(edited));

        assert_eq!(snapshot.entry(1).unwrap().index, 0);
        assert_eq!(snapshot.ordered()[0].title, "edited");
        assert!(!snapshot.replace(reminder(99, TimeDelta::minutes(1), now)));
    }

    #[test]
    fn uncompleted_ignores_unknown_ids() {
        let mut snapshot = Snapshot::default();
        snapshot.set_uncompleted(42, true);
        assert_eq!(snapshot.uncompleted_len(), 0);
    }

    #[test]
    fn remove_drops_both_views() {
        let now = Utc::now();
        let mut snapshot = Snapshot::default();
        snapshot.insert(reminder(5, TimeDelta::minutes(1), now));
        assert!(snapshot.remove(5).is_some());
        assert!(!snapshot.contains(5));
        assert!(!snapshot.is_uncompleted(5));
        assert!(snapshot.remove(5).is_none());
    }
}
