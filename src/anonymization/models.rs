//! Anonymization result models

use crate::domain::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a committed anonymization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationOutcome {
    /// Record type (table name)
    pub record_type: String,
    /// Record identity
    pub record_id: RecordId,
    /// Total attempts, including the committed one
    pub attempts: u32,
    /// Fields replaced by a rule
    pub fields: Vec<String>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Timestamp of the commit
    pub timestamp: DateTime<Utc>,
}

impl AnonymizationOutcome {
    /// Create a new outcome stamped with the current time
    pub fn new(
        record_type: String,
        record_id: RecordId,
        attempts: u32,
        fields: Vec<String>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            record_type,
            record_id,
            attempts,
            fields,
            processing_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// Number of uniqueness-conflict retries consumed
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}
