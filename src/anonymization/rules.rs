//! Field generation rules
//!
//! A [`RuleSet`] maps field names to the [`FieldRule`] that computes the field's
//! replacement value. Rules are evaluated against the record's current
//! attributes, so derived values (templates, copies, closures) always see the
//! pre-anonymization state of the record.

use crate::domain::{AnonymousError, Attributes, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callable producing a replacement value from the current attributes
pub type ValueFn = Arc<dyn Fn(&Attributes) -> Result<Value> + Send + Sync>;

/// Rule describing how a single field's replacement value is computed
#[derive(Clone)]
pub enum FieldRule {
    /// Fixed replacement value
    Static(Value),
    /// Current value of another field
    CopyFrom(String),
    /// String interpolation of current field values
    Template(Template),
    /// Dynamically computed value
    Generate(ValueFn),
}

impl FieldRule {
    /// Creates a rule from a generation function
    ///
    /// # Examples
    ///
    /// ```
    /// use anonymous::anonymization::FieldRule;
    /// use serde_json::json;
    ///
    /// let rule = FieldRule::generate(|attrs| {
    ///     let id = attrs.get("id").cloned().unwrap_or(json!(0));
    ///     Ok(json!(format!("user-{id}")))
    /// });
    /// ```
    pub fn generate<F>(f: F) -> Self
    where
        F: Fn(&Attributes) -> Result<Value> + Send + Sync + 'static,
    {
        FieldRule::Generate(Arc::new(f))
    }

    /// Creates a template rule, parsing `template` eagerly
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the template is malformed.
    pub fn template(template: &str) -> Result<Self> {
        Ok(FieldRule::Template(Template::parse(template)?))
    }

    /// Fields of the current record this rule reads
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            FieldRule::CopyFrom(source) => vec![source.as_str()],
            FieldRule::Template(template) => template.placeholders().collect(),
            FieldRule::Static(_) | FieldRule::Generate(_) => Vec::new(),
        }
    }

    /// Evaluates the rule against the current attributes
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a dependency is missing from
    /// `current` or the generation function fails.
    pub fn evaluate(&self, field: &str, current: &Attributes) -> Result<Value> {
        match self {
            FieldRule::Static(value) => Ok(value.clone()),
            FieldRule::CopyFrom(source) => current.get(source).cloned().ok_or_else(|| {
                AnonymousError::Configuration(format!(
                    "Rule for field '{field}' copies undeclared field '{source}'"
                ))
            }),
            FieldRule::Template(template) => template.render(field, current).map(Value::String),
            FieldRule::Generate(f) => f(current).map_err(|e| match e {
                AnonymousError::Configuration(_) => e,
                other => AnonymousError::Configuration(format!(
                    "Generator for field '{field}' failed: {other}"
                )),
            }),
        }
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::Static(value) => f.debug_tuple("Static").field(value).finish(),
            FieldRule::CopyFrom(source) => f.debug_tuple("CopyFrom").field(source).finish(),
            FieldRule::Template(template) => {
                f.debug_tuple("Template").field(&template.source).finish()
            }
            FieldRule::Generate(_) => f.write_str("Generate(<fn>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Parsed `{field}` interpolation template
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template string
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unbalanced braces or invalid
    /// placeholder names.
    pub fn parse(source: &str) -> Result<Self> {
        let re = Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}|\{|\}").map_err(|e| {
            AnonymousError::Configuration(format!("Failed to compile template pattern: {e}"))
        })?;

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in re.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&source[last..whole.start()]);
            last = whole.end();

            match (whole.as_str(), caps.get(1)) {
                ("{{", _) => literal.push('{'),
                ("}}", _) => literal.push('}'),
                (_, Some(name)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.as_str().to_string()));
                }
                (brace, None) => {
                    return Err(AnonymousError::Configuration(format!(
                        "Malformed template '{source}': unmatched '{brace}' at byte {}",
                        whole.start()
                    )));
                }
            }
        }

        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Field names referenced by the template
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Original template text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders the template against the current attributes
    ///
    /// Strings are inserted verbatim, `null` renders as an empty string and any
    /// other value uses its JSON form.
    pub fn render(&self, field: &str, current: &Attributes) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match current.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Null) => {}
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        return Err(AnonymousError::Configuration(format!(
                            "Template for field '{field}' references undeclared field '{name}'"
                        )))
                    }
                },
            }
        }
        Ok(out)
    }
}

/// Per-record-type mapping of field name to generation rule
///
/// # Examples
///
/// ```
/// use anonymous::anonymization::RuleSet;
/// use serde_json::json;
///
/// let rules = RuleSet::new()
///     .static_value("name", json!("Anonymous"))
///     .copy_from("display_name", "name")
///     .template("email", "user-{id}@example.invalid")?;
/// assert_eq!(rules.len(), 3);
/// # Ok::<(), anonymous::domain::AnonymousError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, FieldRule>,
}

impl RuleSet {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rule for `field`
    pub fn with_rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.insert(field, rule);
        self
    }

    /// Adds a fixed replacement value
    pub fn static_value(self, field: impl Into<String>, value: Value) -> Self {
        self.with_rule(field, FieldRule::Static(value))
    }

    /// Adds a copy of another field's current value
    pub fn copy_from(self, field: impl Into<String>, source: impl Into<String>) -> Self {
        self.with_rule(field, FieldRule::CopyFrom(source.into()))
    }

    /// Adds a template rule
    pub fn template(self, field: impl Into<String>, template: &str) -> Result<Self> {
        Ok(self.with_rule(field, FieldRule::template(template)?))
    }

    /// Adds a generation function
    pub fn generate<F>(self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Attributes) -> Result<Value> + Send + Sync + 'static,
    {
        self.with_rule(field, FieldRule::generate(f))
    }

    /// Adds or replaces the rule for `field` in place
    pub fn insert(&mut self, field: impl Into<String>, rule: FieldRule) {
        self.rules.insert(field.into(), rule);
    }

    /// Rule declared for `field`, if any
    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.get(field)
    }

    /// Declared field names, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Iterates over `(field, rule)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no field is declared
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks the rule set against a record's attributes
    ///
    /// Every declared field and every field a rule reads must exist on the record.
    ///
    /// # Errors
    ///
    /// Returns [`AnonymousError::Configuration`] naming the first offending field.
    pub fn validate(&self, attributes: &Attributes) -> Result<()> {
        for (field, rule) in &self.rules {
            if !attributes.contains_key(field) {
                return Err(AnonymousError::Configuration(format!(
                    "Cannot anonymize field '{field}': the record has no such attribute"
                )));
            }
            if let Some(missing) = rule
                .dependencies()
                .into_iter()
                .find(|dep| !attributes.contains_key(*dep))
            {
                return Err(AnonymousError::Configuration(format!(
                    "Rule for field '{field}' references undeclared field '{missing}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs() -> Attributes {
        let mut a = Attributes::new();
        a.insert("id".to_string(), json!(7));
        a.insert("name".to_string(), json!("Jane Doe"));
        a.insert("nickname".to_string(), json!(null));
        a
    }

    #[test]
    fn test_template_parse_and_render() {
        let template = Template::parse("user-{id}@example.invalid").unwrap();
        assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(
            template.render("email", &attrs()).unwrap(),
            "user-7@example.invalid"
        );
    }

    #[test]
    fn test_template_escapes_and_null() {
        let template = Template::parse("{{{name}}}[{nickname}]").unwrap();
        assert_eq!(template.render("x", &attrs()).unwrap(), "{Jane Doe}[]");
    }

    #[test]
    fn test_template_malformed() {
        assert!(Template::parse("user-{id").is_err());
        assert!(Template::parse("user-}").is_err());
        assert!(Template::parse("user-{1abc}").is_err());
    }

    #[test]
    fn test_template_missing_field() {
        let template = Template::parse("{missing}").unwrap();
        let err = template.render("email", &attrs()).unwrap_err();
        assert!(matches!(err, AnonymousError::Configuration(_)));
    }

    #[test]
    fn test_copy_from_reads_current_value() {
        let rule = FieldRule::CopyFrom("name".to_string());
        assert_eq!(rule.evaluate("alias", &attrs()).unwrap(), json!("Jane Doe"));
        assert_eq!(rule.dependencies(), vec!["name"]);
    }

    #[test]
    fn test_generate_failure_becomes_configuration_error() {
        let rule = FieldRule::generate(|_| Err(AnonymousError::Io("disk".to_string())));
        let err = rule.evaluate("name", &attrs()).unwrap_err();
        assert!(matches!(err, AnonymousError::Configuration(msg) if msg.contains("name")));
    }

    #[test]
    fn test_rule_set_validate() {
        let rules = RuleSet::new().static_value("name", json!("x"));
        assert!(rules.validate(&attrs()).is_ok());

        let unknown_field = RuleSet::new().static_value("email", json!("x"));
        assert!(unknown_field.validate(&attrs()).is_err());

        let unknown_dependency = RuleSet::new().copy_from("name", "email");
        assert!(unknown_dependency.validate(&attrs()).is_err());
    }

    #[test]
    fn test_rule_set_debug_hides_closures() {
        let rules = RuleSet::new().generate("name", |_| Ok(json!("x")));
        assert!(format!("{rules:?}").contains("Generate(<fn>)"));
    }
}
