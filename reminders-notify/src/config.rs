//! Notifier client configuration with sensible defaults.

use crate::error::NotifyError;

/// Configuration for [`HttpNotifier`](crate::HttpNotifier).
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Base URL of the notifier service, e.g. `http://localhost:9000`.
    pub base_url: String,
    /// Whole-request timeout in seconds. The notifier keeps the request open
    /// until the user reacts, so this bounds how long a dispatch can hang.
    pub timeout_seconds: u64,
    /// Custom User-Agent string. If `None`, the crate name and version are used.
    pub user_agent: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_owned(),
            timeout_seconds: 20,
            user_agent: None,
        }
    }
}

impl NotifierConfig {
    /// Config pointing at `base_url` with default timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `base_url` must be an absolute `http` or `https` URL
    /// - `timeout_seconds` must be greater than 0
    pub fn validate(&self) -> Result<(), NotifyError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| NotifyError::Config(format!("invalid base_url: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(NotifyError::Config(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(NotifyError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Resolve an endpoint path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<url::Url, NotifyError> {
        let mut base = url::Url::parse(&self.base_url)
            .map_err(|e| NotifyError::Config(format!("invalid base_url: {e}")))?;
        // Keep any path prefix on the base URL when joining.
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| NotifyError::Config(format!("invalid endpoint {path}: {e}")))
    }
}
