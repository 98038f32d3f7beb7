//! Declarative rule definitions
//!
//! [`RuleDefinition`] is the serializable form of a field rule, used to declare
//! rule sets per table in the TOML configuration:
//!
//! ```toml
//! [[tables]]
//! name = "users"
//!
//! [tables.fields]
//! email = { kind = "template", template = "user-{id}@example.invalid" }
//! name = { kind = "fake", faker = "name" }
//! api_token = { kind = "token", prefix = "TOKEN" }
//! notes = { kind = "null" }
//! ```

use crate::anonymization::anonymizer::faker::{FakeStrategy, FakerKind};
use crate::anonymization::anonymizer::redaction::RedactionStrategy;
use crate::anonymization::anonymizer::tokenization::TokenStrategy;
use crate::anonymization::anonymizer::{rule_for, UuidStrategy};
use crate::anonymization::rules::{FieldRule, RuleSet};
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Serializable rule for a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDefinition {
    /// Fixed value
    Static { value: Value },
    /// `null`
    Null,
    /// Current value of another field
    CopyFrom { field: String },
    /// `{field}` interpolation
    Template { template: String },
    /// Random token, prefix defaults to the upper-cased field name
    Token {
        #[serde(default)]
        prefix: Option<String>,
    },
    /// `[LABEL]` marker
    Redact {
        #[serde(default)]
        label: Option<String>,
    },
    /// Random UUID v4
    Uuid,
    /// Realistic fake value
    Fake { faker: FakerKind },
}

impl RuleDefinition {
    /// Compiles the definition into a [`FieldRule`] for `field`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a template is malformed.
    pub fn compile(&self, field: &str) -> Result<FieldRule> {
        let rule = match self {
            RuleDefinition::Static { value } => FieldRule::Static(value.clone()),
            RuleDefinition::Null => FieldRule::Static(Value::Null),
            RuleDefinition::CopyFrom { field: source } => FieldRule::CopyFrom(source.clone()),
            RuleDefinition::Template { template } => FieldRule::template(template)?,
            RuleDefinition::Token { prefix } => {
                let prefix = prefix.clone().unwrap_or_else(|| field.to_uppercase());
                rule_for(field, TokenStrategy::new(prefix))
            }
            RuleDefinition::Redact { label } => {
                FieldRule::Static(RedactionStrategy::new(label.as_deref()).marker())
            }
            RuleDefinition::Uuid => rule_for(field, UuidStrategy),
            RuleDefinition::Fake { faker } => rule_for(field, FakeStrategy::new(*faker)),
        };
        Ok(rule)
    }
}

/// Compiles a field → definition map into a [`RuleSet`]
pub fn compile_rules(definitions: &BTreeMap<String, RuleDefinition>) -> Result<RuleSet> {
    let mut rules = RuleSet::new();
    for (field, definition) in definitions {
        rules.insert(field.clone(), definition.compile(field)?);
    }
    Ok(rules)
}
