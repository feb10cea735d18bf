//! File-backed reminder store.
//!
//! Two files make up the store:
//! - the reminder file: a JSON array of reminders in insertion order
//! - the counter file: `{"id": <last issued id>, "checksum": <sha256 hex>}`
//!
//! Writes are gated by the SHA-256 of the serialized array. When the bytes
//! about to be written hash to the checksum of the last successful write,
//! nothing touches the disk. The data file is always written before the
//! counter file, so the counter never advertises a checksum for data that
//! is not on disk. Each file is replaced through a temp file and a rename.

use crate::error::{ReminderError, Result};
use crate::model::Reminder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persisted counter record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Last issued reminder ID.
    #[serde(default)]
    pub id: u64,
    /// Hex SHA-256 of the last written reminder file.
    #[serde(default)]
    pub checksum: String,
}

/// Reminder file plus counter file.
#[derive(Debug)]
pub struct FileStore {
    db_path: PathBuf,
    counter_path: PathBuf,
    counter: CounterRecord,
    closed: bool,
}

impl FileStore {
    /// Open the store and load its contents.
    ///
    /// Missing files are created empty.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::StorageUnavailable`] when a file exists but
    /// cannot be read or parsed, or cannot be created.
    pub fn open(
        db_path: impl Into<PathBuf>,
        counter_path: impl Into<PathBuf>,
    ) -> Result<(Self, Vec<Reminder>)> {
        let mut store = Self {
            db_path: db_path.into(),
            counter_path: counter_path.into(),
            counter: CounterRecord::default(),
            closed: false,
        };
        let (reminders, last_id) = store.load()?;
        info!(
            reminders = reminders.len(),
            last_id,
            path = %store.db_path.display(),
            "reminder store opened"
        );
        Ok((store, reminders))
    }

    /// Read both files and return the reminders in file order with the last
    /// issued ID.
    ///
    /// The write gate is re-armed from the bytes actually on disk: a counter
    /// checksum that does not match them is reported and replaced, never
    /// trusted.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::StorageUnavailable`] on I/O or parse failure.
    pub fn load(&mut self) -> Result<(Vec<Reminder>, u64)> {
        let counter_bytes =
            read_or_create(&self.counter_path, &encode_counter(&CounterRecord::default())?)?;
        let counter: CounterRecord = if is_blank(&counter_bytes) {
            CounterRecord::default()
        } else {
            serde_json::from_slice(&counter_bytes).map_err(|e| {
                ReminderError::StorageUnavailable(format!(
                    "could not parse counter file {}: {e}",
                    self.counter_path.display()
                ))
            })?
        };

        let db_bytes = read_or_create(&self.db_path, b"[]\n")?;
        let reminders: Vec<Reminder> = if is_blank(&db_bytes) {
            Vec::new()
        } else {
            serde_json::from_slice(&db_bytes).map_err(|e| {
                ReminderError::StorageUnavailable(format!(
                    "could not parse reminder file {}: {e}",
                    self.db_path.display()
                ))
            })?
        };

        let actual = checksum(&db_bytes);
        if !counter.checksum.is_empty() && counter.checksum != actual {
            warn!(
                path = %self.db_path.display(),
                "reminder file changed outside the service; checksum in counter file is stale"
            );
        }

        let max_id = reminders.iter().map(|r| r.id).max().unwrap_or(0);
        if max_id > counter.id {
            warn!(
                counter = counter.id,
                max_id, "counter file is behind the reminder file; raising it"
            );
        }

        self.counter = CounterRecord {
            id: counter.id.max(max_id),
            checksum: actual,
        };
        Ok((reminders, self.counter.id))
    }

    /// Write `reminders` in the given order.
    ///
    /// Returns the number of bytes written, or `0` when the content is
    /// identical to the last successful write.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::StorageUnavailable`] on serialization or I/O
    /// failure. The write gate is only advanced once both files are written,
    /// so a failed write is retried in full next time.
    pub fn write(&mut self, reminders: &[Reminder]) -> Result<usize> {
        let mut bytes = serde_json::to_vec(reminders).map_err(|e| {
            ReminderError::StorageUnavailable(format!("could not serialize reminders: {e}"))
        })?;
        bytes.push(b'\n');

        let sum = checksum(&bytes);
        if sum == self.counter.checksum {
            debug!("reminder file unchanged, skipping write");
            return Ok(0);
        }

        let written = write_file(&self.db_path, &bytes)?;
        let next = CounterRecord {
            id: self.counter.id,
            checksum: sum,
        };
        write_file(&self.counter_path, &encode_counter(&next)?)?;
        self.counter = next;

        info!(
            bytes = written,
            reminders = reminders.len(),
            path = %self.db_path.display(),
            "reminder file written"
        );
        Ok(written)
    }

    /// Issue a new reminder ID and persist the counter.
    ///
    /// The in-memory counter advances even when persisting fails, so an ID is
    /// never handed out twice by this process.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::StorageUnavailable`] if the store is closed
    /// or the counter file cannot be written.
    pub fn next_id(&mut self) -> Result<u64> {
        if self.closed {
            return Err(ReminderError::StorageUnavailable(
                "reminder store is closed".into(),
            ));
        }
        self.counter.id += 1;
        write_file(&self.counter_path, &encode_counter(&self.counter)?)?;
        Ok(self.counter.id)
    }

    /// Last issued ID.
    pub fn last_id(&self) -> u64 {
        self.counter.id
    }

    /// Checksum of the reminder file as last read or written.
    pub fn checksum(&self) -> &str {
        &self.counter.checksum
    }

    /// `true` once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Flush the counter file one last time. Later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::StorageUnavailable`] if the counter file
    /// cannot be written; the store stays open so the call can be retried.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        write_file(&self.counter_path, &encode_counter(&self.counter)?)?;
        self.closed = true;
        info!(last_id = self.counter.id, "reminder store closed");
        Ok(())
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn encode_counter(record: &CounterRecord) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(record).map_err(|e| {
        ReminderError::StorageUnavailable(format!("could not serialize counter record: {e}"))
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read a file, creating it with `initial` contents when it does not exist.
fn read_or_create(path: &Path, initial: &[u8]) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_file(path, initial)?;
            debug!(path = %path.display(), "created empty store file");
            Ok(initial.to_vec())
        }
        Err(e) => Err(ReminderError::StorageUnavailable(format!(
            "could not read {}: {e}",
            path.display()
        ))),
    }
}

/// Replace a file's contents atomically (temp file, fsync, rename).
fn write_file(path: &Path, bytes: &[u8]) -> Result<usize> {
    let unavailable = |e: std::io::Error| {
        ReminderError::StorageUnavailable(format!("could not write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(unavailable)?;
    }

    let mut tmp_name = path.file_name().map(OsString::from).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = std::fs::File::create(&tmp_path).map_err(unavailable)?;
    file.write_all(bytes).map_err(unavailable)?;
    file.sync_all().map_err(unavailable)?;
    std::fs::rename(&tmp_path, path).map_err(unavailable)?;
    Ok(bytes.len())
}
