//! Attribute mappings
//!
//! A record's persisted state is carried as an ordered map from field name to
//! JSON value. The same shape is used for the current attributes of a record and
//! for the anonymized attributes written back to the store.

use super::errors::AnonymousError;
use super::result::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name → value mapping of a record
pub type Attributes = BTreeMap<String, Value>;

/// Converts a JSON object into an attribute mapping
///
/// # Errors
///
/// Returns [`AnonymousError::Serialization`] if `value` is not a JSON object.
pub fn attributes_from_json(value: Value) -> Result<Attributes> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(AnonymousError::Serialization(format!(
            "Expected a JSON object for record attributes, got: {other}"
        ))),
    }
}

/// Converts an attribute mapping into a JSON object
pub fn attributes_to_json(attributes: &Attributes) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}
