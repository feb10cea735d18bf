//! Reminder service daemon.
//!
//! Usage: `remindersd [CONFIG.toml]`. Without a config file the built-in
//! defaults are used.

use reminders::{App, ReminderConfig};
use reminders_notify::HttpNotifier;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("reminders=info,reminders_notify=info")
            }),
        )
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            ReminderConfig::from_file(&path)
                .map_err(|e| anyhow::anyhow!("could not load {}: {e}", path.display()))?
        }
        None => ReminderConfig::default(),
    };
    config.validate()?;

    let notifier = HttpNotifier::new(config.notifier.client_config())?;
    let url = notifier.config().base_url.clone();
    match notifier.health().await {
        Ok(true) => tracing::info!(%url, "notifier is up"),
        Ok(false) | Err(_) => tracing::warn!(
            %url,
            "notifier is not answering; reminders will be retried until it is"
        ),
    }

    let app = App::start(config, Arc::new(notifier)).await.map_err(|e| {
        tracing::error!(error = %e, "remindersd failed to start");
        anyhow::anyhow!("remindersd failed: {e}")
    })?;

    wait_for_shutdown().await;
    app.shutdown().await?;
    tracing::info!("remindersd shut down cleanly");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    tracing::info!("shutdown signal received");
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
