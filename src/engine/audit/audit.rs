//! Immutable Audit Log
//!
//! Append-only, line-delimited JSON audit trail for recovery operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current audit record format version
pub const AUDIT_VERSION: u32 = 1;

/// Value of the `module` field on every record
pub const AUDIT_MODULE: &str = "disaster_recovery";

/// Keys owned by the record itself; caller details may not override them
pub const RESERVED_KEYS: [&str; 4] = ["version", "timestamp", "module", "event"];

/// Event names emitted by the recovery engine
pub mod events {
    pub const BACKUP_SCHEDULED: &str = "backup_scheduled";
    pub const BACKUP_FAILED: &str = "backup_failed";
    pub const RESTORE_SUCCESS: &str = "restore_success";
    pub const RESTORE_FAILED: &str = "restore_failed";
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    /// Format version for compatibility
    pub version: u32,

    pub timestamp: DateTime<Utc>,

    pub module: String,

    /// Event name, e.g. `restore_failed`
    pub event: String,

    /// Caller-supplied details, flattened into the record
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(event: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: AUDIT_VERSION,
            timestamp,
            module: AUDIT_MODULE.to_string(),
            event: event.to_string(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !RESERVED_KEYS.contains(&key) {
            self.details.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// String-valued detail, if present
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail(key).and_then(Value::as_str)
    }

    pub fn is_failure(&self) -> bool {
        self.event.ends_with("_failed")
    }
}

/// Destination for audit records.
///
/// Object-safe so the engine can hold it as `Arc<dyn AuditSink>`.
pub trait AuditSink: Send + Sync {
    fn write_event(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// File-backed sink writing one JSON record per line
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    log_path: PathBuf,
}

impl JsonlAuditSink {
    /// Nothing touches the filesystem until the first append
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append a record to the log
    pub fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Query all records
    pub fn query_all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }

        let file = fs::File::open(&self.log_path)?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: AuditEvent = serde_json::from_str(&line)?;

            // Older records stay readable
            if event.version <= AUDIT_VERSION {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Query records with a given event name
    pub fn query_by_event(&self, event: &str) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .query_all()?
            .into_iter()
            .filter(|e| e.event == event)
            .collect())
    }

    pub fn count(&self) -> Result<usize, AuditError> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = fs::File::open(&self.log_path)?;
        let reader = BufReader::new(file);
        let mut count = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl AuditSink for JsonlAuditSink {
    fn write_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.append(event)
    }
}
