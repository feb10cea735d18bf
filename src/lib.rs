//! Reminders: timed reminders with file persistence and desktop notification.
//!
//! # Architecture
//!
//! - **Store** ([`store::FileStore`]): reminder array file plus counter file,
//!   with checksum-gated writes
//! - **Service** ([`service::ReminderService`]): the in-memory
//!   [`snapshot::Snapshot`] behind one lock, exposing create, edit, fetch and
//!   delete
//! - **Background loops** ([`background`]): a saver flushing the snapshot on
//!   an interval and a notifier dispatching due reminders to a
//!   [`background::NotificationClient`]
//! - **Transport** ([`server`]): a thin axum adapter
//!
//! [`app::App`] wires everything together and shuts it down in order.

pub mod app;
pub mod background;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod server;
pub mod service;
pub mod snapshot;
pub mod store;

pub use app::App;
pub use background::{NotificationClient, NotifierEvent, NotifyOutcome};
pub use config::ReminderConfig;
pub use error::{ReminderError, Result};
pub use model::{Reminder, ReminderStatus};
pub use service::{DeletionReport, NewReminder, ReminderEdit, ReminderService};
