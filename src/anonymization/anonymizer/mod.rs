//! Built-in field anonymizers
//!
//! Provides reusable value sources that back the `token`, `redact`, `uuid` and
//! `fake` rule kinds.

pub mod faker;
pub mod redaction;
pub mod tokenization;

use crate::anonymization::rules::FieldRule;
use crate::domain::{Attributes, Result};
use serde_json::Value;
use std::sync::Arc;

/// Trait for anonymizer implementations
pub trait FieldAnonymizer: Send + Sync {
    /// Produce a replacement value for `field`
    fn anonymize_field(&self, field: &str, current: &Attributes) -> Result<Value>;
}

/// Wraps an anonymizer into a [`FieldRule::Generate`] rule bound to `field`
pub fn rule_for<A>(field: &str, anonymizer: A) -> FieldRule
where
    A: FieldAnonymizer + 'static,
{
    let anonymizer = Arc::new(anonymizer);
    let field = field.to_string();
    FieldRule::generate(move |current| anonymizer.anonymize_field(&field, current))
}

/// Random UUID v4 strings
pub struct UuidStrategy;

impl FieldAnonymizer for UuidStrategy {
    fn anonymize_field(&self, _field: &str, _current: &Attributes) -> Result<Value> {
        Ok(Value::String(uuid::Uuid::new_v4().to_string()))
    }
}
