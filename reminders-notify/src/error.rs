//! Error types for the reminders-notify crate.
//!
//! Messages are stable strings; the reminder payload never appears in them.

/// Errors that can occur while talking to the notifier service.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent or the service answered with a non-2xx status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The notifier did not answer within the configured timeout.
    #[error("notifier timed out: {0}")]
    Timeout(String),

    /// The notifier response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The notifier answered, but without a usable activation.
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl NotifyError {
    /// Classify a transport error from `reqwest`.
    pub(crate) fn from_reqwest(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{context}: {err}"))
        } else if err.is_decode() {
            Self::Parse(format!("{context}: {err}"))
        } else {
            Self::Http(format!("{context}: {err}"))
        }
    }
}

/// Convenience type alias for reminders-notify results.
pub type Result<T> = std::result::Result<T, NotifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_http() {
        let err = NotifyError::Http("connection refused".into());
        assert_eq!(err.to_string(), "HTTP error: connection refused");
    }

    #[test]
    fn display_timeout() {
        let err = NotifyError::Timeout("exceeded 20s".into());
        assert_eq!(err.to_string(), "notifier timed out: exceeded 20s");
    }

    #[test]
    fn display_rejected() {
        let err = NotifyError::Rejected("snooze duration must be > 0s".into());
        assert_eq!(
            err.to_string(),
            "notification rejected: snooze duration must be > 0s"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NotifyError>();
    }
}
