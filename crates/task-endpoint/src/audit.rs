//! Audit trail for credentials access
//!
//! Every credentials lookup produces exactly one [`AuditEntry`], whatever
//! its outcome. Loggers are called synchronously before the response is
//! returned; a failing logger is reported but never blocks the response.

use crate::error::AuditError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Event type recorded for credentials lookups
pub const EVENT_GET_CREDENTIALS: &str = "GetCredentials";

/// One credentials access
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    /// Caller address as seen by the server
    pub source_addr: Option<String>,
    pub request_uri: String,
    pub user_agent: Option<String>,
    pub credentials_id: Option<String>,
    /// Task owning the credentials, when the id resolved
    pub task_arn: Option<String>,
    pub event_type: &'static str,
    pub cluster: String,
    pub container_instance_arn: String,
}

/// Sink for audit entries
pub trait AuditLogger: Send + Sync {
    fn log(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Writes audit entries as structured events on the `audit` tracing target
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "audit",
            event = entry.event_type,
            status_code = entry.status_code,
            source_addr = ?entry.source_addr,
            request_uri = %entry.request_uri,
            user_agent = ?entry.user_agent,
            credentials_id = ?entry.credentials_id,
            task_arn = ?entry.task_arn,
            cluster = %entry.cluster,
            container_instance_arn = %entry.container_instance_arn,
            "Credentials accessed"
        );
        Ok(())
    }
}

/// Appends audit entries to a file, one JSON document per line
pub struct FileAuditLogger {
    file: Mutex<File>,
}

impl FileAuditLogger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditLogger for FileAuditLogger {
    fn log(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        // A poisoned lock only means another writer panicked mid-write
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}
