//! Anonymized attribute generation
//!
//! [`generate`] applies a [`RuleSet`] to a record's current attributes. It does
//! not touch the store; rule evaluation itself may be random.

use crate::anonymization::rules::RuleSet;
use crate::domain::{Attributes, Result};

/// Produces the anonymized attribute mapping for a record
///
/// Every key of `current` appears in the output. Declared fields are replaced by
/// their rule's value, all other fields are copied unchanged. Rules read the
/// *current* values, never values produced earlier in the same pass.
///
/// # Errors
///
/// Returns a configuration error if a rule targets a field the record does not
/// have, reads an undeclared field, or its generation function fails.
///
/// # Examples
///
/// ```
/// use anonymous::anonymization::{generate, RuleSet};
/// use anonymous::domain::Attributes;
/// use serde_json::json;
///
/// let mut current = Attributes::new();
/// current.insert("id".to_string(), json!(1));
/// current.insert("email".to_string(), json!("jane@example.com"));
///
/// let rules = RuleSet::new().template("email", "user-{id}@example.invalid")?;
/// let anonymized = generate(&current, &rules)?;
///
/// assert_eq!(anonymized["email"], json!("user-1@example.invalid"));
/// assert_eq!(anonymized["id"], json!(1));
/// # Ok::<(), anonymous::domain::AnonymousError>(())
/// ```
pub fn generate(current: &Attributes, rules: &RuleSet) -> Result<Attributes> {
    rules.validate(current)?;

    current
        .iter()
        .map(|(field, value)| {
            let replacement = match rules.get(field) {
                Some(rule) => rule.evaluate(field, current)?,
                None => value.clone(),
            };
            Ok((field.clone(), replacement))
        })
        .collect()
}

/// The subset of `anonymized` covered by a rule
///
/// Stores receive only these fields, so columns without a rule are never
/// written back.
pub fn declared_changes(anonymized: &Attributes, rules: &RuleSet) -> Attributes {
    rules
        .fields()
        .filter_map(|field| {
            anonymized
                .get(field)
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}
