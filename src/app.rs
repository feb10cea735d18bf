//! Process wiring: store, service, background loops and HTTP transport.

use crate::background::{BackgroundNotifier, BackgroundSaver, NotificationClient, NotifierEvent};
use crate::config::ReminderConfig;
use crate::error::Result;
use crate::server::ReminderServer;
use crate::service::ReminderService;
use crate::store::FileStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A running reminder service.
pub struct App {
    service: Arc<ReminderService>,
    server: ReminderServer,
    notifier_cancel: CancellationToken,
    notifier: JoinHandle<()>,
    saver_cancel: CancellationToken,
    saver: JoinHandle<()>,
}

impl App {
    /// Validate `config`, open the store and start every component.
    ///
    /// # Errors
    ///
    /// - [`crate::ReminderError::Config`] for an invalid configuration
    /// - [`crate::ReminderError::StorageUnavailable`] when the store cannot be loaded
    /// - [`crate::ReminderError::Io`] when the listen address cannot be bound
    pub async fn start<C: NotificationClient + ?Sized>(
        config: ReminderConfig,
        client: Arc<C>,
    ) -> Result<Self> {
        Self::start_with_events(config, client, None).await
    }

    /// Like [`start`](Self::start), reporting notifier state changes on `events`.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn start_with_events<C: NotificationClient + ?Sized>(
        config: ReminderConfig,
        client: Arc<C>,
        events: Option<mpsc::UnboundedSender<NotifierEvent>>,
    ) -> Result<Self> {
        config.validate()?;

        let (store, reminders) =
            FileStore::open(&config.storage.db_path, &config.storage.db_config_path)?;
        let service = Arc::new(ReminderService::new(
            store,
            reminders,
            config.notifier.default_backoff(),
        ));

        let saver_cancel = CancellationToken::new();
        let saver = BackgroundSaver::new(
            Arc::clone(&service),
            config.storage.save_interval(),
            config.storage.write_timeout(),
            saver_cancel.clone(),
        )
        .spawn();

        let notifier_cancel = CancellationToken::new();
        let mut notifier = BackgroundNotifier::new(
            Arc::clone(&service),
            client,
            config.notifier.tick_interval(),
            config.notifier.timeout(),
            notifier_cancel.clone(),
        );
        if let Some(events) = events {
            notifier = notifier.with_events(events);
        }
        let notifier = notifier.spawn();

        let server = match ReminderServer::start(Arc::clone(&service), &config.server.addr).await {
            Ok(server) => server,
            Err(e) => {
                notifier_cancel.cancel();
                saver_cancel.cancel();
                let _ = notifier.await;
                let _ = saver.await;
                return Err(e);
            }
        };

        info!(addr = %server.addr(), "reminder service started");
        Ok(Self {
            service,
            server,
            notifier_cancel,
            notifier,
            saver_cancel,
            saver,
        })
    }

    /// Address the HTTP server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    /// The shared service.
    pub fn service(&self) -> &Arc<ReminderService> {
        &self.service
    }

    /// Stop in order: HTTP transport, notifier (awaiting in-flight
    /// dispatches), saver (with its final save), then the store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReminderError::StorageUnavailable`] if the closing
    /// save fails.
    pub async fn shutdown(self) -> Result<()> {
        info!("reminder service shutting down");
        self.server.shutdown().await;

        self.notifier_cancel.cancel();
        if let Err(e) = self.notifier.await {
            error!("notifier task failed: {e}");
        }

        self.saver_cancel.cancel();
        if let Err(e) = self.saver.await {
            error!("saver task failed: {e}");
        }

        let service = self.service;
        tokio::task::spawn_blocking(move || service.close())
            .await
            .map_err(|e| crate::error::ReminderError::StorageUnavailable(e.to_string()))??;
        info!("reminder service stopped");
        Ok(())
    }
}
