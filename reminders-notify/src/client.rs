//! HTTP notifier client.

use crate::config::NotifierConfig;
use crate::duration::parse_go_duration;
use crate::error::{NotifyError, Result};
use crate::http::build_client;
use crate::types::{ACTIVATION_CLOSED, Activation, NotifyResponse};
use serde::Serialize;

/// Client for the notifier service's `/notify` and `/health` endpoints.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    config: NotifierConfig,
    client: reqwest::Client,
}

impl HttpNotifier {
    /// Create a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] for an invalid configuration and
    /// [`NotifyError::Http`] if the HTTP client cannot be built.
    pub fn new(config: NotifierConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Push `payload` to the notifier and wait for the user's reaction.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Timeout`] when the notifier does not answer in time
    /// - [`NotifyError::Http`] when the request fails or the status is not 2xx
    /// - [`NotifyError::Parse`] when the body or snooze value is malformed
    /// - [`NotifyError::Rejected`] when the answer carries no usable activation
    pub async fn notify<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Activation> {
        let url = self.config.endpoint("notify")?;

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::from_reqwest("notifier service is not available", &e))?
            .error_for_status()
            .map_err(|e| NotifyError::Http(format!("notifier HTTP error: {e}")))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| NotifyError::from_reqwest("notifier response read failed", &e))?;

        tracing::trace!(bytes = body.len(), "notifier response received");

        let decoded = if body.iter().all(u8::is_ascii_whitespace) {
            NotifyResponse::default()
        } else {
            serde_json::from_slice::<NotifyResponse>(&body).map_err(|e| {
                NotifyError::Parse(format!("could not decode notifier response: {e}"))
            })?
        };

        interpret(decoded)
    }

    /// Probe `GET /health`. Returns `true` for a 2xx answer.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] or [`NotifyError::Timeout`] if the
    /// service cannot be reached at all.
    pub async fn health(&self) -> Result<bool> {
        let url = self.config.endpoint("health")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NotifyError::from_reqwest("notifier health probe failed", &e))?;
        Ok(response.status().is_success())
    }
}

/// Turn a decoded notifier answer into an [`Activation`].
fn interpret(response: NotifyResponse) -> Result<Activation> {
    if response.activation_type.as_deref() == Some(ACTIVATION_CLOSED) {
        return Ok(Activation::Completed);
    }

    let value = response.activation_value.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(NotifyError::Rejected(
            "notifier returned no snooze duration".into(),
        ));
    }

    let delay = parse_go_duration(&value)?;
    if delay.is_zero() {
        return Err(NotifyError::Rejected(
            "notification duration must be > 0s".into(),
        ));
    }
    Ok(Activation::Snooze(delay))
}
