//! Shared HTTP client for notifier requests.

use crate::config::NotifierConfig;
use crate::error::NotifyError;
use std::time::Duration;

/// Default User-Agent sent to the notifier service.
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for the notifier service.
///
/// The client has:
/// - Timeout from config (covers connect, send and the whole response)
/// - The configured User-Agent, or the crate name/version
///
/// # Errors
///
/// Returns [`NotifyError::Http`] if the client cannot be constructed.
pub fn build_client(config: &NotifierConfig) -> Result<reqwest::Client, NotifyError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .build()
        .map_err(|e| NotifyError::Http(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_user_agent_names_the_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("reminders-notify/"));
    }

    #[test]
    fn build_client_with_default_config() {
        let config = NotifierConfig::default();
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn build_client_with_custom_ua() {
        let config = NotifierConfig {
            user_agent: Some("CustomNotifier/1.0".into()),
            ..Default::default()
        };
        assert!(build_client(&config).is_ok());
    }
}
