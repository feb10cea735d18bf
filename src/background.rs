//! Background loops: periodic saving and due-reminder notification.
//!
//! Both loops run as tokio tasks and stop when their [`CancellationToken`]
//! is cancelled:
//! - [`BackgroundSaver`] flushes the snapshot to the store on a fixed
//!   interval and once more on shutdown. At most one save runs at a time.
//! - [`BackgroundNotifier`] scans the pending set every tick and hands each
//!   reminder entering its due window to a [`NotificationClient`], one
//!   concurrent dispatch per reminder. The outcome is fed back into the
//!   service as a groom or a retry.

use crate::error::Result;
use crate::model::Reminder;
use crate::service::ReminderService;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the notification service asked for after showing a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The user acknowledged the reminder.
    Completed,
    /// Show the reminder again after this delay. Zero means the default
    /// backoff.
    RetryAfter(Duration),
}

/// Delivers a reminder to the user.
#[async_trait]
pub trait NotificationClient: Send + Sync + 'static {
    /// Deliver `reminder` and report what the user did with it.
    ///
    /// Any error is treated as a failed delivery and retried after the
    /// default backoff.
    async fn notify(&self, reminder: &Reminder) -> Result<NotifyOutcome>;
}

/// State change made by the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// Reminder was delivered and groomed.
    Completed {
        /// Reminder ID.
        id: u64,
    },
    /// Reminder was re-armed.
    Rescheduled {
        /// Reminder ID.
        id: u64,
        /// Delay until it is due again.
        after: Duration,
    },
}

/// Periodically writes the snapshot to the store.
pub struct BackgroundSaver {
    service: Arc<ReminderService>,
    interval: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl BackgroundSaver {
    /// Create a saver. Call [`spawn`](Self::spawn) or [`run`](Self::run) to start it.
    pub fn new(
        service: Arc<ReminderService>,
        interval: Duration,
        write_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            interval,
            write_timeout,
            cancel,
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Save every interval until cancelled, then save once more.
    pub async fn run(self) {
        info!(interval = ?self.interval, "background saver started");
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    save_bounded(&self.service, self.write_timeout, &mut pending).await;
                }
            }
        }

        info!("background saver stopping, running final save");
        if let Some(running) = pending.as_mut() {
            // The final save must see everything, so let a slow one land first.
            match tokio::time::timeout(self.write_timeout, running).await {
                Ok(joined) => {
                    log_late_save(joined);
                    pending = None;
                }
                Err(_) => warn!("previous save still running at shutdown"),
            }
        }
        save_bounded(&self.service, self.write_timeout, &mut pending).await;
        info!("background saver stopped");
    }
}

/// Result of one [`save_bounded`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveAttempt {
    /// Bytes were written.
    Saved,
    /// Nothing changed since the last write.
    Unchanged,
    /// The write or the blocking task failed.
    Failed,
    /// The write is still running; it was kept in `pending`.
    TimedOut,
    /// An earlier timed-out write is still running, so none was started.
    Skipped,
}

/// Run one save on the blocking pool, waiting at most `timeout`.
///
/// A save that outlives `timeout` keeps running and is parked in `pending`.
/// Until it finishes, further calls start nothing.
async fn save_bounded(
    service: &Arc<ReminderService>,
    timeout: Duration,
    pending: &mut Option<JoinHandle<Result<usize>>>,
) -> SaveAttempt {
    let mut task = match pending.take() {
        Some(running) if !running.is_finished() => {
            warn!("previous save still running, skipping this one");
            *pending = Some(running);
            return SaveAttempt::Skipped;
        }
        finished => {
            if let Some(finished) = finished {
                log_late_save(finished.await);
            }
            let service = Arc::clone(service);
            tokio::task::spawn_blocking(move || service.save())
        }
    };

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(Ok(0))) => {
            debug!("snapshot unchanged");
            SaveAttempt::Unchanged
        }
        Ok(Ok(Ok(bytes))) => {
            debug!(bytes, "snapshot saved");
            SaveAttempt::Saved
        }
        Ok(Ok(Err(e))) => {
            error!("could not save reminders: {e}");
            SaveAttempt::Failed
        }
        Ok(Err(e)) => {
            error!("save task failed: {e}");
            SaveAttempt::Failed
        }
        Err(_) => {
            error!(?timeout, "save timed out");
            *pending = Some(task);
            SaveAttempt::TimedOut
        }
    }
}

fn log_late_save(joined: std::result::Result<Result<usize>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(bytes)) => debug!(bytes, "late save finished"),
        Ok(Err(e)) => error!("late save failed: {e}"),
        Err(e) => error!("save task failed: {e}"),
    }
}

/// Polls the pending set and dispatches due reminders.
pub struct BackgroundNotifier<C: ?Sized> {
    service: Arc<ReminderService>,
    client: Arc<C>,
    tick: Duration,
    dispatch_timeout: Duration,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<NotifierEvent>>,
}

impl<C: NotificationClient + ?Sized> BackgroundNotifier<C> {
    /// Create a notifier scanning every `tick`. Each dispatch is abandoned
    /// after `dispatch_timeout` and retried with the default backoff.
    pub fn new(
        service: Arc<ReminderService>,
        client: Arc<C>,
        tick: Duration,
        dispatch_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            client,
            tick,
            dispatch_timeout,
            cancel,
            events: None,
        }
    }

    /// Report every groom and retry on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<NotifierEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Scan and dispatch until cancelled, then wait for outstanding
    /// dispatches to finish.
    pub async fn run(self) {
        info!(tick = ?self.tick, "background notifier started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut dispatches: JoinSet<()> = JoinSet::new();
        let mut in_flight: HashMap<u64, AbortHandle> = HashMap::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(joined) = dispatches.join_next(), if !dispatches.is_empty() => {
                    if let Err(e) = joined {
                        error!("notification dispatch failed: {e}");
                    }
                }
                _ = ticker.tick() => {
                    in_flight.retain(|_, handle| !handle.is_finished());
                    self.scan(&mut dispatches, &mut in_flight);
                }
            }
        }

        if !dispatches.is_empty() {
            info!(
                outstanding = dispatches.len(),
                "background notifier stopping, waiting for dispatches"
            );
        }
        while let Some(joined) = dispatches.join_next().await {
            if let Err(e) = joined {
                error!("notification dispatch failed: {e}");
            }
        }
        info!("background notifier stopped");
    }

    /// Dispatch every pending reminder due by the end of this tick that is
    /// not already being delivered.
    fn scan(&self, dispatches: &mut JoinSet<()>, in_flight: &mut HashMap<u64, AbortHandle>) {
        let horizon = Utc::now() + crate::model::to_time_delta(self.tick);
        let due = self
            .service
            .due_by(horizon, |id| in_flight.contains_key(&id));

        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "dispatching due reminders");

        for reminder in due {
            let id = reminder.id;
            let handle = dispatches.spawn(dispatch(
                Arc::clone(&self.service),
                Arc::clone(&self.client),
                reminder,
                self.dispatch_timeout,
                self.events.clone(),
            ));
            in_flight.insert(id, handle);
        }
    }
}

/// Deliver one reminder and apply the outcome.
async fn dispatch<C: NotificationClient + ?Sized>(
    service: Arc<ReminderService>,
    client: Arc<C>,
    reminder: Reminder,
    timeout: Duration,
    events: Option<mpsc::UnboundedSender<NotifierEvent>>,
) {
    let id = reminder.id;
    let outcome = match tokio::time::timeout(timeout, client.notify(&reminder)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(id, "notification failed: {e}");
            NotifyOutcome::RetryAfter(Duration::ZERO)
        }
        Err(_) => {
            warn!(id, ?timeout, "notification timed out");
            NotifyOutcome::RetryAfter(Duration::ZERO)
        }
    };

    let event = match outcome {
        NotifyOutcome::Completed => {
            (service.groom(std::slice::from_ref(&reminder)) > 0)
                .then_some(NotifierEvent::Completed { id })
        }
        NotifyOutcome::RetryAfter(after) => service.retry(&reminder, after).map(|rearmed| {
            NotifierEvent::Rescheduled {
                id,
                after: rearmed.duration.to_std().unwrap_or(service.default_backoff()),
            }
        }),
    };

    if let (Some(event), Some(events)) = (event, events) {
        // Nobody listening is fine.
        let _ = events.send(event);
    }
}
