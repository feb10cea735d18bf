//! [`NotificationClient`] backed by the HTTP notifier service.

use crate::background::{NotificationClient, NotifyOutcome};
use crate::error::Result;
use crate::model::{Reminder, duration_nanos};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reminders_notify::{Activation, HttpNotifier};
use serde::Serialize;

/// Body posted to `/notify`.
#[derive(Debug, Serialize)]
struct Notification<'a> {
    id: u64,
    title: &'a str,
    message: &'a str,
    #[serde(with = "duration_nanos")]
    duration: TimeDelta,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl<'a> From<&'a Reminder> for Notification<'a> {
    fn from(reminder: &'a Reminder) -> Self {
        Self {
            id: reminder.id,
            title: &reminder.title,
            message: &reminder.message,
            duration: reminder.duration,
            created_at: reminder.created_at,
            modified_at: reminder.modified_at,
        }
    }
}

#[async_trait]
impl NotificationClient for HttpNotifier {
    async fn notify(&self, reminder: &Reminder) -> Result<NotifyOutcome> {
        let activation = HttpNotifier::notify(self, &Notification::from(reminder)).await?;
        Ok(match activation {
            Activation::Completed => NotifyOutcome::Completed,
            Activation::Snooze(delay) => NotifyOutcome::RetryAfter(delay),
        })
    }
}
