//! Tokenization anonymization strategy

use super::FieldAnonymizer;
use crate::domain::{Attributes, Result};
use rand::Rng;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tokenization strategy - replaces values with random tokens (PREFIX_NNN_RRRR)
///
/// The counter keeps tokens from one strategy distinct; the random suffix keeps
/// tokens from separate runs from lining up. Collisions with existing rows are
/// still possible and are what the anonymization retry loop absorbs.
pub struct TokenStrategy {
    prefix: String,
    counter: AtomicUsize,
}

impl TokenStrategy {
    /// Create a new tokenization strategy
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Generate the next token
    fn generate_token(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let random_suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        format!("{}_{:03}_{}", self.prefix, counter, random_suffix)
    }
}

impl FieldAnonymizer for TokenStrategy {
    fn anonymize_field(&self, _field: &str, _current: &Attributes) -> Result<Value> {
        Ok(Value::String(self.generate_token()))
    }
}
