//! Redaction anonymization strategy

use super::FieldAnonymizer;
use crate::domain::{Attributes, Result};
use serde_json::Value;

/// Label used when no explicit label is configured
pub const DEFAULT_REDACTION_LABEL: &str = "REDACTED";

/// Redaction strategy - replaces values with a `[LABEL]` marker
pub struct RedactionStrategy {
    label: String,
}

impl RedactionStrategy {
    /// Create a new redaction strategy
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.unwrap_or(DEFAULT_REDACTION_LABEL).to_uppercase(),
        }
    }

    /// The marker this strategy writes
    pub fn marker(&self) -> Value {
        Value::String(format!("[{}]", self.label))
    }
}

impl FieldAnonymizer for RedactionStrategy {
    fn anonymize_field(&self, _field: &str, _current: &Attributes) -> Result<Value> {
        Ok(self.marker())
    }
}

impl Default for RedactionStrategy {
    fn default() -> Self {
        Self::new(None)
    }
}
