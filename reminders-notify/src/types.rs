//! Wire types exchanged with the notifier service.

use serde::Deserialize;
use std::time::Duration;

/// What the user did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The user closed the notification: the reminder is done.
    Completed,
    /// The user asked to be reminded again after the given delay.
    Snooze(Duration),
}

/// Raw `/notify` response body.
///
/// The notifier replies with whatever the desktop notification reported, so
/// both fields are optional and an empty body is possible.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResponse {
    /// `"closed"` when the notification was dismissed as done.
    #[serde(default)]
    pub activation_type: Option<String>,
    /// Snooze delay as a Go-style duration string, e.g. `"5m"`.
    #[serde(default)]
    pub activation_value: Option<String>,
}

/// Activation type meaning the reminder was acknowledged.
pub const ACTIVATION_CLOSED: &str = "closed";
