//! Reminder service.
//!
//! [`ReminderService`] owns the [`Snapshot`] and the [`FileStore`]. Request
//! handlers call [`create`](ReminderService::create),
//! [`edit`](ReminderService::edit), [`fetch`](ReminderService::fetch) and
//! [`delete`](ReminderService::delete); the background loops call
//! [`save`](ReminderService::save), [`snapshot`](ReminderService::snapshot),
//! [`groom`](ReminderService::groom) and [`retry`](ReminderService::retry).
//!
//! Every read and mutation of the snapshot happens under one mutex. When both
//! locks are needed the store lock is taken first.

use crate::error::{ReminderError, Result};
use crate::model::{
    ELAPSED_DURATION, Reminder, ReminderStatus, duration_nanos, to_time_delta, validate_duration,
    validate_message, validate_title,
};
use crate::snapshot::Snapshot;
use crate::store::FileStore;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Body of a create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminder {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub message: String,
    /// Delay from now, in nanoseconds on the wire.
    #[serde(with = "duration_nanos")]
    pub duration: TimeDelta,
}

/// Body of an edit request. Only supplied fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        with = "duration_nanos::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<TimeDelta>,
}

impl ReminderEdit {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.message.is_none() && self.duration.is_none()
    }
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    /// IDs that existed and were removed, in request order.
    pub deleted: Vec<u64>,
    /// IDs that did not exist, in request order.
    pub not_found: Vec<u64>,
}

/// Owner of the in-memory reminder set and its backing store.
#[derive(Debug)]
pub struct ReminderService {
    store: Mutex<FileStore>,
    state: Mutex<Snapshot>,
    default_backoff: Duration,
}

impl ReminderService {
    /// Build the service from an opened store and the reminders it loaded.
    pub fn new(store: FileStore, reminders: Vec<Reminder>, default_backoff: Duration) -> Self {
        let snapshot = Snapshot::from_ordered(reminders, Utc::now());
        info!(
            reminders = snapshot.len(),
            pending = snapshot.uncompleted_len(),
            "reminder service ready"
        );
        Self {
            store: Mutex::new(store),
            state: Mutex::new(snapshot),
            default_backoff,
        }
    }

    fn store(&self) -> MutexGuard<'_, FileStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn state(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delay used by [`retry`](Self::retry) when no positive delay is given.
    pub fn default_backoff(&self) -> Duration {
        self.default_backoff
    }

    /// Create a reminder due `duration` from now.
    ///
    /// # Errors
    ///
    /// [`ReminderError::Validation`] for a blank title or message or a
    /// non-positive duration; [`ReminderError::StorageUnavailable`] when no ID
    /// could be issued.
    pub fn create(&self, body: NewReminder) -> Result<Reminder> {
        validate_title(&body.title)?;
        validate_message(&body.message)?;
        validate_duration(body.duration)?;

        let mut store = self.store();
        let id = store.next_id()?;
        let now = Utc::now();
        let reminder = Reminder {
            id,
            title: body.title,
            message: body.message,
            duration: body.duration,
            created_at: now,
            modified_at: now,
            status: ReminderStatus::Pending,
        };

        let mut state = self.state();
        state.insert(reminder.clone());
        drop(state);
        drop(store);

        info!(id, due_at = %reminder.due_at(), "reminder created");
        Ok(reminder)
    }

    /// Apply the supplied fields of `edit` to reminder `id`.
    ///
    /// # Errors
    ///
    /// [`ReminderError::Validation`] when nothing is supplied or a supplied
    /// title or message is blank; [`ReminderError::NotFound`] for an unknown ID.
    pub fn edit(&self, id: u64, edit: ReminderEdit) -> Result<Reminder> {
        if edit.is_empty() {
            return Err(ReminderError::Validation(
                "at least one of title, message or duration must be supplied".into(),
            ));
        }
        if let Some(title) = &edit.title {
            validate_title(title)?;
        }
        if let Some(message) = &edit.message {
            validate_message(message)?;
        }

        let mut state = self.state();
        let mut reminder = state
            .get(id)
            .cloned()
            .ok_or_else(|| ReminderError::not_found(id))?;

        if let Some(title) = edit.title {
            reminder.title = title;
        }
        if let Some(message) = edit.message {
            reminder.message = message;
        }
        if let Some(duration) = edit.duration {
            reminder.duration = duration;
        }
        let now = Utc::now();
        reminder.modified_at = now;

        let pending = reminder.due_at() > now;
        if pending {
            reminder.status = ReminderStatus::Pending;
        }
        state.replace(reminder.clone());
        state.set_uncompleted(id, reminder.is_due_after(now));
        drop(state);

        info!(id, pending, "reminder edited");
        Ok(reminder)
    }

    /// Return the reminders for `ids`, in request order.
    ///
    /// # Errors
    ///
    /// [`ReminderError::NotFound`] listing every missing ID if any is absent.
    pub fn fetch(&self, ids: &[u64]) -> Result<Vec<Reminder>> {
        let state = self.state();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for &id in ids {
            match state.get(id) {
                Some(reminder) => found.push(reminder.clone()),
                None => missing.push(id),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(ReminderError::NotFound { ids: missing })
        }
    }

    /// Remove every existing ID in `ids` and report what happened to each.
    pub fn delete(&self, ids: &[u64]) -> DeletionReport {
        let mut report = DeletionReport::default();
        let mut state = self.state();
        for &id in ids {
            if state.remove(id).is_some() {
                report.deleted.push(id);
            } else if !report.deleted.contains(&id) && !report.not_found.contains(&id) {
                report.not_found.push(id);
            }
        }
        drop(state);

        if !report.deleted.is_empty() {
            info!(deleted = ?report.deleted, "reminders deleted");
        }
        report
    }

    /// Write the current reminders to the store in insertion order.
    ///
    /// Returns the bytes written, `0` when nothing changed since the last
    /// write.
    ///
    /// # Errors
    ///
    /// [`ReminderError::StorageUnavailable`] when the write fails.
    pub fn save(&self) -> Result<usize> {
        let mut store = self.store();
        let ordered = self.state().ordered();
        debug!(reminders = ordered.len(), "saving reminder snapshot");
        store.write(&ordered)
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.state().clone()
    }

    /// Pending reminders due at or before `horizon`, leaving out any ID for
    /// which `skip` returns `true`. Only the matches are cloned.
    pub fn due_by(&self, horizon: DateTime<Utc>, skip: impl Fn(u64) -> bool) -> Vec<Reminder> {
        self.state()
            .uncompleted()
            .filter(|r| r.due_at() <= horizon && !skip(r.id))
            .cloned()
            .collect()
    }

    /// Mark reminders as notified.
    ///
    /// Each reminder leaves the pending set and is stamped with
    /// [`ELAPSED_DURATION`]. A reminder that was edited or deleted since it
    /// was read is skipped. Returns how many reminders were groomed.
    pub fn groom(&self, reminders: &[Reminder]) -> usize {
        let mut state = self.state();
        let mut groomed = 0;
        for dispatched in reminders {
            let Some(mut current) = state.get(dispatched.id).cloned() else {
                debug!(id = dispatched.id, "groom skipped, reminder deleted");
                continue;
            };
            if current.modified_at != dispatched.modified_at {
                debug!(id = dispatched.id, "groom skipped, reminder changed");
                continue;
            }
            current.status = ReminderStatus::Notified;
            current.duration = ELAPSED_DURATION;
            state.replace(current);
            state.set_uncompleted(dispatched.id, false);
            groomed += 1;
        }
        drop(state);

        if groomed > 0 {
            info!(count = groomed, "snapshot grooming");
        }
        groomed
    }

    /// Re-arm a reminder to fire `after` from now, or after the default
    /// backoff when `after` is zero.
    ///
    /// Returns the re-armed reminder, or `None` if it was edited or deleted
    /// since it was read.
    pub fn retry(&self, reminder: &Reminder, after: Duration) -> Option<Reminder> {
        let delay = if after.is_zero() {
            self.default_backoff
        } else {
            after
        };

        let mut state = self.state();
        let mut current = state.get(reminder.id).cloned()?;
        if current.modified_at != reminder.modified_at {
            debug!(id = reminder.id, "retry skipped, reminder changed");
            return None;
        }
        current.modified_at = Utc::now();
        current.duration = to_time_delta(delay);
        current.status = ReminderStatus::Pending;
        state.replace(current.clone());
        state.set_uncompleted(current.id, true);
        drop(state);

        info!(id = current.id, ?delay, "retrying reminder");
        Some(current)
    }

    /// Hold the store lock, as a slow disk would.
    #[cfg(test)]
    pub(crate) fn lock_store(&self) -> MutexGuard<'_, FileStore> {
        self.store()
    }

    /// Final save, then close the store.
    ///
    /// # Errors
    ///
    /// [`ReminderError::StorageUnavailable`] if either step fails.
    pub fn close(&self) -> Result<()> {
        self.save()?;
        self.store().close()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn open(dir: &tempfile::TempDir) -> ReminderService {
        let (store, reminders) = FileStore::open(
            dir.path().join("db.json"),
            dir.path().join(".db.config.json"),
        )
        .unwrap();
        ReminderService::new(store, reminders, Duration::from_secs(60))
    }

    fn body(title: &str, duration: TimeDelta) -> NewReminder {
        NewReminder {
            title: title.to_owned(),
            message: format!("{title} message"),
            duration,
        }
    }

    #[test]
    fn create_assigns_ids_and_marks_pending() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);

        let first = service.create(body("a", TimeDelta::minutes(5))).unwrap();
        let second = service.create(body("b", TimeDelta::minutes(5))).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.created_at, first.modified_at);
        let snapshot = service.snapshot();
        assert!(snapshot.contains(1));
        assert!(snapshot.is_uncompleted(1));
        assert!(snapshot.is_uncompleted(2));
    }

    #[test]
    fn create_rejects_bad_fields() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);

        for bad in [
            body("", TimeDelta::minutes(1)),
            NewReminder {
                message: " ".into(),
                ..body("a", TimeDelta::minutes(1))
            },
            body("a", TimeDelta::zero()),
            body("a", TimeDelta::seconds(-3)),
        ] {
            assert!(matches!(
                service.create(bad),
                Err(ReminderError::Validation(_))
            ));
        }
        assert!(service.snapshot().is_empty());
    }

    #[test]
    fn edit_without_fields_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::minutes(1))).unwrap();

        let err = service.edit(reminder.id, ReminderEdit::default()).unwrap_err();
        assert!(matches!(err, ReminderError::Validation(_)));
        // Also rejected for an unknown ID: field rules come first.
        let err = service.edit(999, ReminderEdit::default()).unwrap_err();
        assert!(matches!(err, ReminderError::Validation(_)));
    }

    #[test]
    fn edit_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let edit = ReminderEdit {
            title: Some("x".into()),
            ..Default::default()
        };
        let err = service.edit(42, edit).unwrap_err();
        assert!(matches!(err, ReminderError::NotFound { ref ids } if ids == &[42]));
    }

    #[test]
    fn edit_rejects_blank_title() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::minutes(1))).unwrap();
        let edit = ReminderEdit {
            title: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.edit(reminder.id, edit),
            Err(ReminderError::Validation(_))
        ));
    }

    #[test]
    fn edit_applies_only_supplied_fields_and_keeps_position() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let first = service.create(body("first", TimeDelta::minutes(1))).unwrap();
        service.create(body("second", TimeDelta::minutes(1))).unwrap();

        let edited = service
            .edit(
                first.id,
                ReminderEdit {
                    title: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(edited.title, "renamed");
        assert_eq!(edited.message, first.message);
        assert_eq!(edited.duration, first.duration);
        assert_eq!(edited.created_at, first.created_at);
        assert!(edited.modified_at >= first.modified_at);
        let ordered = service.snapshot().ordered();
        assert_eq!(ordered[0].title, "renamed");
        assert_eq!(ordered[1].title, "second");
    }

    #[test]
    fn edit_into_the_past_leaves_pending_set() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::minutes(5))).unwrap();

        service
            .edit(
                reminder.id,
                ReminderEdit {
                    duration: Some(TimeDelta::seconds(-1)),
                    ..Default::default()
                },
            )
            .unwrap();

        let snapshot = service.snapshot();
        assert!(snapshot.contains(reminder.id));
        assert!(!snapshot.is_uncompleted(reminder.id));

        service
            .edit(
                reminder.id,
                ReminderEdit {
                    duration: Some(TimeDelta::minutes(10)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(service.snapshot().is_uncompleted(reminder.id));
    }

    #[test]
    fn edit_after_notification_re_arms() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::minutes(5))).unwrap();
        service.groom(std::slice::from_ref(&reminder));

        let edited = service
            .edit(
                reminder.id,
                ReminderEdit {
                    duration: Some(TimeDelta::minutes(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.status, ReminderStatus::Pending);
        assert!(service.snapshot().is_uncompleted(reminder.id));
    }

    #[test]
    fn fetch_preserves_request_order_and_reports_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let a = service.create(body("a", TimeDelta::minutes(1))).unwrap();
        let b = service.create(body("b", TimeDelta::minutes(1))).unwrap();

        let fetched = service.fetch(&[b.id, a.id]).unwrap();
        assert_eq!(fetched, vec![b.clone(), a.clone()]);

        let err = service.fetch(&[a.id, 7, b.id, 9]).unwrap_err();
        assert!(matches!(err, ReminderError::NotFound { ref ids } if ids == &[7, 9]));
    }

    #[test]
    fn delete_reports_found_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let a = service.create(body("a", TimeDelta::minutes(1))).unwrap();
        let b = service.create(body("b", TimeDelta::minutes(1))).unwrap();

        let report = service.delete(&[a.id, 77]);
        assert_eq!(report.deleted, vec![a.id]);
        assert_eq!(report.not_found, vec![77]);

        let snapshot = service.snapshot();
        assert!(!snapshot.contains(a.id));
        assert!(!snapshot.is_uncompleted(a.id));
        assert!(snapshot.contains(b.id));
    }

    #[test]
    fn repeated_id_in_delete_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let a = service.create(body("a", TimeDelta::minutes(1))).unwrap();

        let report = service.delete(&[a.id, a.id]);
        assert_eq!(report.deleted, vec![a.id]);
        assert!(report.not_found.is_empty());

        let report = service.delete(&[7, a.id, 7]);
        assert!(report.deleted.is_empty());
        assert_eq!(report.not_found, vec![7, a.id]);
    }

    #[test]
    fn due_by_returns_only_due_pending_reminders() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let soon = service.create(body("soon", TimeDelta::seconds(1))).unwrap();
        let busy = service.create(body("busy", TimeDelta::seconds(1))).unwrap();
        let later = service.create(body("later", TimeDelta::hours(1))).unwrap();
        let done = service.create(body("done", TimeDelta::seconds(1))).unwrap();
        service.groom(std::slice::from_ref(&done));

        let horizon = Utc::now() + TimeDelta::seconds(2);
        let due = service.due_by(horizon, |id| id == busy.id);
        assert_eq!(due.iter().map(|r| r.id).collect::<Vec<_>>(), vec![soon.id]);

        let due = service.due_by(horizon + TimeDelta::hours(1), |_| false);
        assert_eq!(
            due.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![soon.id, busy.id, later.id]
        );
    }

    #[test]
    fn second_save_without_changes_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        service.create(body("a", TimeDelta::minutes(1))).unwrap();

        assert!(service.save().unwrap() > 0);
        assert_eq!(service.save().unwrap(), 0);
    }

    #[test]
    fn save_compacts_order_after_deletes_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let ids: Vec<u64> = ["a", "b", "c", "d"]
            .iter()
            .map(|t| service.create(body(t, TimeDelta::minutes(1))).unwrap().id)
            .collect();
        service.delete(&[ids[1]]);
        service.save().unwrap();
        service.close().unwrap();
        drop(service);

        let service = open(&dir);
        let titles: Vec<String> = service
            .snapshot()
            .ordered()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["a", "c", "d"]);
        // The deleted ID is not reused.
        let next = service.create(body("e", TimeDelta::minutes(1))).unwrap();
        assert_eq!(next.id, 5);
    }

    #[test]
    fn groom_marks_notified_and_stamps_elapsed_duration() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::seconds(2))).unwrap();

        assert_eq!(service.groom(std::slice::from_ref(&reminder)), 1);

        let snapshot = service.snapshot();
        assert!(!snapshot.is_uncompleted(reminder.id));
        let stored = snapshot.get(reminder.id).unwrap();
        assert_eq!(stored.status, ReminderStatus::Notified);
        assert_eq!(stored.duration, ELAPSED_DURATION);
        assert!(stored.due_at() < Utc::now());
    }

    #[test]
    fn groom_skips_reminders_changed_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let dispatched = service.create(body("a", TimeDelta::seconds(2))).unwrap();
        let deleted = service.create(body("b", TimeDelta::seconds(2))).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        service
            .edit(
                dispatched.id,
                ReminderEdit {
                    duration: Some(TimeDelta::hours(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        service.delete(&[deleted.id]);

        assert_eq!(service.groom(&[dispatched.clone(), deleted]), 0);
        let snapshot = service.snapshot();
        assert!(snapshot.is_uncompleted(dispatched.id));
        assert_eq!(
            snapshot.get(dispatched.id).unwrap().duration,
            TimeDelta::hours(1)
        );
    }

    #[test]
    fn retry_with_zero_uses_default_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::seconds(1))).unwrap();

        let before = Utc::now();
        let rearmed = service.retry(&reminder, Duration::ZERO).unwrap();
        let after = Utc::now();

        assert_eq!(rearmed.duration, TimeDelta::seconds(60));
        assert!(rearmed.due_at() >= before + TimeDelta::seconds(60));
        assert!(rearmed.due_at() <= after + TimeDelta::seconds(60));
        assert!(service.snapshot().is_uncompleted(reminder.id));
    }

    #[test]
    fn retry_with_positive_delay_uses_it() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::seconds(1))).unwrap();

        let rearmed = service
            .retry(&reminder, Duration::from_secs(5 * 60))
            .unwrap();
        assert_eq!(rearmed.duration, TimeDelta::minutes(5));
        assert!(rearmed.modified_at >= reminder.modified_at);
        assert_eq!(rearmed.created_at, reminder.created_at);
    }

    #[test]
    fn retry_with_huge_delay_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::seconds(1))).unwrap();

        // 3,000,000 hours is past what signed nanoseconds can hold.
        let rearmed = service
            .retry(&reminder, Duration::from_secs(3_000_000 * 3_600))
            .unwrap();
        assert_eq!(rearmed.duration, crate::model::MAX_DURATION);

        assert!(service.save().unwrap() > 0);
        assert_eq!(service.save().unwrap(), 0);
    }

    #[test]
    fn retry_skips_deleted_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        let reminder = service.create(body("a", TimeDelta::seconds(1))).unwrap();
        service.delete(&[reminder.id]);

        assert!(service.retry(&reminder, Duration::ZERO).is_none());
        assert!(!service.snapshot().contains(reminder.id));
    }

    #[test]
    fn close_saves_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let service = open(&dir);
        service.create(body("kept", TimeDelta::minutes(1))).unwrap();
        service.close().unwrap();
        service.close().unwrap();
        drop(service);

        let service = open(&dir);
        assert_eq!(service.snapshot().len(), 1);
    }

    #[test]
    fn edit_body_reads_nanosecond_duration() {
        let edit: ReminderEdit =
            serde_json::from_str(r#"{"duration": 90000000000}"#).unwrap();
        assert_eq!(edit.duration, Some(TimeDelta::seconds(90)));
        assert!(edit.title.is_none());

        let edit: ReminderEdit = serde_json::from_str("{}").unwrap();
        assert!(edit.is_empty());
    }
}
