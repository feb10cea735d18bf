//! Error types for the reminder service.

/// Top-level error type for the reminder service.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// Missing or malformed input fields. Reported to the caller, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// One or more referenced reminders do not exist.
    #[error("could not find reminders with ids: {}", format_ids(.ids))]
    NotFound {
        /// Every requested ID that was missing, in request order.
        ids: Vec<u64>,
    },

    /// Reminder file or counter file could not be read, parsed or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The notifier service could not be reached or gave an unusable answer.
    #[error("notifier unavailable: {0}")]
    NotifierUnavailable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReminderError {
    /// Shorthand for a [`ReminderError::NotFound`] with a single ID.
    pub fn not_found(id: u64) -> Self {
        Self::NotFound { ids: vec![id] }
    }
}

fn format_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<reminders_notify::NotifyError> for ReminderError {
    fn from(err: reminders_notify::NotifyError) -> Self {
        Self::NotifierUnavailable(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReminderError>;
