//! Reminder record and its field rules.

use crate::error::{ReminderError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration stamped on notified reminders so the persisted record reads as
/// already elapsed.
pub const ELAPSED_DURATION: TimeDelta = TimeDelta::hours(-1);

/// Whether the notifier has delivered a reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    /// Not yet delivered.
    #[default]
    Pending,
    /// Delivered and acknowledged by the user.
    Notified,
}

/// A timed reminder.
///
/// The reminder fires `duration` after `modified_at`. `duration` is stored on
/// disk as signed integer nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique, never reused identifier.
    pub id: u64,
    /// Short title shown in the notification.
    pub title: String,
    /// Notification body.
    pub message: String,
    /// Delay after `modified_at` at which the reminder is due.
    #[serde(with = "duration_nanos")]
    pub duration: TimeDelta,
    /// Creation time; never changes.
    pub created_at: DateTime<Utc>,
    /// Last edit or re-arm time.
    pub modified_at: DateTime<Utc>,
    /// Delivery state. Older files without the field load as pending.
    #[serde(default)]
    pub status: ReminderStatus,
}

impl Reminder {
    /// Instant at which the reminder becomes due.
    pub fn due_at(&self) -> DateTime<Utc> {
        self.modified_at
            .checked_add_signed(self.duration)
            .unwrap_or(if self.duration > TimeDelta::zero() {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            })
    }

    /// `true` when the reminder is pending and due strictly after `instant`.
    pub fn is_due_after(&self, instant: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.due_at() > instant
    }
}

/// Reject a blank title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ReminderError::Validation("title must not be empty".into()));
    }
    Ok(())
}

/// Reject a blank message.
pub fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(ReminderError::Validation(
            "message must not be empty".into(),
        ));
    }
    Ok(())
}

/// Reject a zero or negative duration.
pub fn validate_duration(duration: TimeDelta) -> Result<()> {
    if duration <= TimeDelta::zero() {
        return Err(ReminderError::Validation(
            "duration must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Longest duration the nanosecond wire encoding can carry.
pub const MAX_DURATION: TimeDelta = TimeDelta::nanoseconds(i64::MAX);

/// Convert a `std` duration, saturating at [`MAX_DURATION`].
pub fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration)
        .map(|delta| delta.min(MAX_DURATION))
        .unwrap_or(MAX_DURATION)
}

/// Serde adapter storing a [`TimeDelta`] as signed integer nanoseconds.
pub mod duration_nanos {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = delta
            .num_nanoseconds()
            .ok_or_else(|| serde::ser::Error::custom("duration does not fit in i64 nanoseconds"))?;
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        Ok(TimeDelta::nanoseconds(nanos))
    }

    /// Same encoding for an optional field. Use with `#[serde(default)]`.
    pub mod option {
        use chrono::TimeDelta;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            delta: &Option<TimeDelta>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match delta {
                Some(delta) => super::serialize(delta, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<TimeDelta>, D::Error> {
            let nanos = Option::<i64>::deserialize(deserializer)?;
            Ok(nanos.map(TimeDelta::nanoseconds))
        }
    }
}
