//! Anonymizable records
//!
//! Any type implementing [`Anonymizable`] can be passed to the
//! [`AnonymizationEngine`](crate::anonymization::AnonymizationEngine). The rule
//! set is a required method, so a statically typed record cannot forget to
//! declare one. [`Record`] is the dynamic implementation used for rows loaded by
//! table name; it reports [`AnonymousError::NotImplemented`] when no rules were
//! attached.

use crate::anonymization::rules::RuleSet;
use crate::domain::{AnonymousError, Attributes, RecordId, Result};

/// A persisted record that can be anonymized
pub trait Anonymizable: Send + Sync {
    /// Concrete record type; doubles as the table name for stores
    fn record_type(&self) -> &str;

    /// Identity of the record within its type
    fn record_id(&self) -> &RecordId;

    /// Current persisted attributes
    fn attributes(&self) -> &Attributes;

    /// Replace the in-memory attributes after a committed update
    fn assign_attributes(&mut self, attributes: Attributes);

    /// Rules describing how each anonymizable field is replaced
    fn anonymization_rules(&self) -> Result<RuleSet>;
}

/// Dynamically typed record
#[derive(Debug, Clone)]
pub struct Record {
    record_type: String,
    id: RecordId,
    attributes: Attributes,
    rules: Option<RuleSet>,
}

impl Record {
    /// Create a record without rules
    pub fn new(record_type: impl Into<String>, id: RecordId, attributes: Attributes) -> Self {
        Self {
            record_type: record_type.into(),
            id,
            attributes,
            rules: None,
        }
    }

    /// Attach the rule set for this record's type
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }
}

impl Anonymizable for Record {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn assign_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }

    fn anonymization_rules(&self) -> Result<RuleSet> {
        self.rules
            .clone()
            .ok_or_else(|| AnonymousError::NotImplemented {
                record_type: self.record_type.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_without_rules() {
        let record = Record::new("users", RecordId::new("1").unwrap(), Attributes::new());
        let err = record.anonymization_rules().unwrap_err();
        assert!(
            matches!(err, AnonymousError::NotImplemented { ref record_type } if record_type == "users")
        );
    }

    #[test]
    fn test_record_with_rules() {
        let record = Record::new("users", RecordId::new("1").unwrap(), Attributes::new())
            .with_rules(RuleSet::new().static_value("name", json!("x")));
        assert_eq!(record.anonymization_rules().unwrap().len(), 1);
    }

    #[test]
    fn test_assign_attributes() {
        let mut record = Record::new("users", RecordId::new("1").unwrap(), Attributes::new());
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), json!("Anon"));
        record.assign_attributes(attrs.clone());
        assert_eq!(record.attributes(), &attrs);
    }
}
