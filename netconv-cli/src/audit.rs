//! Audit trail of changes made to remote objects.
//!
//! Every event goes to the `audit` tracing target. With an audit file
//! configured it is also appended there as one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: String,
    event: &'a str,
    kind: &'a str,
    handle: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    message: String,
}

pub struct AuditLog {
    file: Option<Mutex<File>>,
}

impl AuditLog {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(Mutex::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open audit log {}", path.display()))?,
            )),
            None => None,
        };
        Ok(Self { file })
    }

    #[cfg(test)]
    pub fn new_noop() -> Self {
        Self { file: None }
    }

    fn record(&self, event: &str, kind: &str, handle: &str, id: Option<&str>, message: String) {
        info!(target: "audit", "{}", message);

        let Some(file) = &self.file else {
            return;
        };
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            event,
            kind,
            handle,
            id,
            message,
        };
        let written = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|line| match file.lock() {
                Ok(mut file) => writeln!(file, "{}", line),
                Err(_) => Err(std::io::Error::other("audit log lock poisoned")),
            });
        if let Err(e) = written {
            warn!("Failed to write audit record: {}", e);
        }
    }

    pub fn created(&self, kind: &str, handle: &str, id: &str, name: &str) {
        self.record(
            "created",
            kind,
            handle,
            Some(id),
            format!("Created {} {} ({}) for {}", kind, name, id, handle),
        );
    }

    pub fn updated(&self, kind: &str, handle: &str, id: &str, revision: Option<i64>) {
        let revision = revision.map_or_else(|| "unknown".to_string(), |r| r.to_string());
        self.record(
            "updated",
            kind,
            handle,
            Some(id),
            format!("Updated {} {} for {}, now at revision {}", kind, id, handle, revision),
        );
    }

    pub fn deleted(&self, kind: &str, handle: &str, id: Option<&str>) {
        self.record(
            "deleted",
            kind,
            handle,
            id,
            format!("Deleted {} {} for {}", kind, id.unwrap_or("-"), handle),
        );
    }

    pub fn drifted(&self, kind: &str, handle: &str, id: Option<&str>) {
        self.record(
            "drifted",
            kind,
            handle,
            id,
            format!(
                "{} {} for {} was deleted outside netconv",
                kind,
                id.unwrap_or("-"),
                handle
            ),
        );
    }

    pub fn imported(&self, kind: &str, handle: &str, id: &str) {
        self.record(
            "imported",
            kind,
            handle,
            Some(id),
            format!("Imported {} {} as {}", kind, id, handle),
        );
    }
}
