//! # reminders-notify
//!
//! Client for the desktop notifier service that shows reminder popups.
//!
//! The notifier exposes `POST /notify`, which takes a reminder as JSON and
//! holds the request open until the user reacts, then answers with an
//! activation: either the notification was closed (the reminder is done) or
//! the user picked a snooze delay.
//!
//! ## Design
//!
//! - One shared [`reqwest::Client`] per [`HttpNotifier`], with a hard request
//!   timeout so a dispatch never hangs
//! - Payloads are any `Serialize` value; this crate does not own the
//!   reminder type
//! - Snooze delays are Go-style duration strings (`"5m"`, `"1h30m"`)

pub mod client;
pub mod config;
pub mod duration;
pub mod error;
pub mod http;
pub mod types;

pub use client::HttpNotifier;
pub use config::NotifierConfig;
pub use error::{NotifyError, Result};
pub use types::Activation;
