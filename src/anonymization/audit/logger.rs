//! Audit logger for anonymization operations

use crate::anonymization::models::AnonymizationOutcome;
use crate::domain::{AnonymousError, Attributes, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    record_type: String,
    record_id: String,
    attempts: u32,
    processing_time_ms: u64,
    fields: Vec<AuditField>,
}

/// Audit field entry (with hashed original value)
#[derive(Debug, Serialize)]
struct AuditField {
    field: String,
    /// SHA-256 hash of original value (never log plaintext values)
    original_hash: String,
}

/// Audit logger for anonymization operations
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnonymousError::Io(format!(
                        "Failed to create audit log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
        })
    }

    /// Log a committed anonymization
    ///
    /// `original` holds the attributes before anonymization; only hashes of the
    /// replaced fields are written.
    pub fn log_anonymization(
        &self,
        outcome: &AnonymizationOutcome,
        original: &Attributes,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: outcome.timestamp.to_rfc3339(),
            record_type: outcome.record_type.clone(),
            record_id: outcome.record_id.to_string(),
            attempts: outcome.attempts,
            processing_time_ms: outcome.processing_time_ms,
            fields: outcome
                .fields
                .iter()
                .map(|field| AuditField {
                    field: field.clone(),
                    original_hash: self.hash_value(original.get(field)),
                })
                .collect(),
        };

        self.write_entry(&entry)
    }

    /// Hash an original value using SHA-256 over its JSON form
    fn hash_value(&self, value: Option<&serde_json::Value>) -> String {
        let mut hasher = Sha256::new();
        if let Some(value) = value {
            hasher.update(value.to_string().as_bytes());
        }
        let result = hasher.finalize();
        format!("{result:x}")
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                AnonymousError::Io(format!(
                    "Failed to open audit log {}: {e}",
                    self.log_path.display()
                ))
            })?;

        if self.json_format {
            let json_line = serde_json::to_string(entry)?;
            writeln!(file, "{json_line}")?;
        } else {
            writeln!(
                file,
                "[{}] Record: {}/{} | Fields: {} | Attempts: {} | Time: {}ms",
                entry.timestamp,
                entry.record_type,
                entry.record_id,
                entry.fields.len(),
                entry.attempts,
                entry.processing_time_ms
            )?;
        }

        Ok(())
    }
}
