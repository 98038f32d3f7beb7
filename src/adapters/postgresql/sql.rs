//! SQL generation and error classification for PostgreSQL
//!
//! Table and column names come from configuration and row keys, so they are
//! only ever interpolated through [`quote_identifier`]. Values always travel as
//! bind parameters.

use crate::domain::{Attributes, StoreError, StoreResult};
use tokio_postgres::error::SqlState;

/// Quote a (possibly schema-qualified) identifier
///
/// Accepts ASCII letters, digits and underscores in each dot-separated part.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] for anything else.
pub fn quote_identifier(name: &str) -> StoreResult<String> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid = parts.iter().all(|part| {
        !part.is_empty()
            && !part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });

    if !valid {
        return Err(StoreError::Validation(format!(
            "Invalid SQL identifier: '{name}'"
        )));
    }

    Ok(parts
        .iter()
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

/// Build the UPDATE statement for a row
///
/// Bind `$1` to the attributes as a JSON object and `$2` to the key as text.
/// The server converts JSON values to column types via `jsonb_populate_record`.
/// Only the columns present in `attributes` are assigned; every other column
/// keeps its current value. Returns `None` when there is nothing to update
/// besides the key.
pub fn update_statement(
    table: &str,
    key_column: &str,
    attributes: &Attributes,
) -> StoreResult<Option<String>> {
    let table = quote_identifier(table)?;
    let key = quote_identifier(key_column)?;

    let columns = attributes
        .keys()
        .filter(|column| column.as_str() != key_column)
        .map(|column| quote_identifier(column))
        .collect::<StoreResult<Vec<_>>>()?;

    if columns.is_empty() {
        return Ok(None);
    }

    let targets = columns.join(", ");
    let sources = columns
        .iter()
        .map(|column| format!("source.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Some(format!(
        "UPDATE {table} AS target SET ({targets}) = \
         (SELECT {sources} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS source) \
         WHERE target.{key}::text = $2"
    )))
}

/// Build the SELECT statement returning one row as a JSON object
pub fn select_statement(table: &str, key_column: &str) -> StoreResult<String> {
    let table = quote_identifier(table)?;
    let key = quote_identifier(key_column)?;
    Ok(format!(
        "SELECT to_jsonb(target) FROM {table} AS target WHERE target.{key}::text = $1"
    ))
}

/// Build the statement listing every key of a table in order
pub fn list_ids_statement(table: &str, key_column: &str) -> StoreResult<String> {
    let table = quote_identifier(table)?;
    let key = quote_identifier(key_column)?;
    Ok(format!(
        "SELECT target.{key}::text FROM {table} AS target ORDER BY target.{key}"
    ))
}

/// Classify a server error by SQLSTATE
pub fn classify_db_error(code: &str, constraint: Option<&str>, message: &str) -> StoreError {
    if code == SqlState::UNIQUE_VIOLATION.code() {
        return StoreError::UniqueViolation {
            constraint: constraint.unwrap_or("unknown").to_string(),
            message: message.to_string(),
        };
    }

    if code == SqlState::UNDEFINED_TABLE.code() {
        return StoreError::NotFound(message.to_string());
    }

    match &code[..code.len().min(2)] {
        // integrity constraint violation, data exception
        "23" | "22" => StoreError::Validation(message.to_string()),
        "08" => StoreError::ConnectionFailed(message.to_string()),
        "40" | "25" => StoreError::TransactionFailed(message.to_string()),
        _ => StoreError::QueryFailed(format!("[{code}] {message}")),
    }
}

/// Convert a driver error into a [`StoreError`]
pub fn map_pg_error(err: tokio_postgres::Error) -> StoreError {
    if let Some(db) = err.as_db_error() {
        return classify_db_error(db.code().code(), db.constraint(), db.message());
    }

    if err.is_closed() {
        StoreError::ConnectionFailed(err.to_string())
    } else {
        StoreError::QueryFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("users", "\"users\"")]
    #[test_case("public.users", "\"public\".\"users\"")]
    #[test_case("user_2fa", "\"user_2fa\"")]
    fn test_quote_identifier(name: &str, expected: &str) {
        assert_eq!(quote_identifier(name).unwrap(), expected);
    }

    #[test_case("")]
    #[test_case("users; DROP TABLE users")]
    #[test_case("\"users\"")]
    #[test_case("1users")]
    #[test_case("public.")]
    fn test_quote_identifier_rejects(name: &str) {
        assert!(matches!(
            quote_identifier(name),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_update_statement_skips_key_column() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), json!(1));
        attrs.insert("email".to_string(), json!("a@example.com"));
        attrs.insert("name".to_string(), json!("A"));

        let sql = update_statement("users", "id", &attrs).unwrap().unwrap();

        assert_eq!(
            sql,
            "UPDATE \"users\" AS target SET (\"email\", \"name\") = \
             (SELECT source.\"email\", source.\"name\" FROM \
             jsonb_populate_record(NULL::\"users\", $1::jsonb) AS source) \
             WHERE target.\"id\"::text = $2"
        );
    }

    #[test]
    fn test_update_statement_leaves_undeclared_columns_alone() {
        use crate::anonymization::{declared_changes, generate, RuleSet};

        let row: Attributes = serde_json::from_slice(
            br#"{"id":7,"balance":12345678901234567890.123456789,"email":"a@example.com","full_name":"A B"}"#,
        )
        .unwrap();
        let rules = RuleSet::new()
            .template("email", "user-{id}@example.invalid")
            .unwrap();

        let anonymized = generate(&row, &rules).unwrap();
        let changes = declared_changes(&anonymized, &rules);
        let sql = update_statement("accounts", "id", &changes).unwrap().unwrap();

        assert!(sql.starts_with("UPDATE \"accounts\" AS target SET (\"email\") ="));
        assert!(!sql.contains("balance"));
        assert!(!sql.contains("full_name"));
    }

    #[test]
    fn test_update_statement_with_only_key() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), json!(1));
        assert!(update_statement("users", "id", &attrs).unwrap().is_none());
    }

    #[test]
    fn test_select_statement() {
        assert_eq!(
            select_statement("users", "uuid").unwrap(),
            "SELECT to_jsonb(target) FROM \"users\" AS target WHERE target.\"uuid\"::text = $1"
        );
    }

    #[test]
    fn test_classify_unique_violation() {
        let err = classify_db_error(
            "23505",
            Some("users_email_key"),
            "duplicate key value violates unique constraint \"users_email_key\"",
        );
        assert!(err.is_unique_violation());
        assert!(matches!(
            err,
            StoreError::UniqueViolation { ref constraint, .. } if constraint == "users_email_key"
        ));
    }

    #[test_case("23502" ; "not null violation")]
    #[test_case("23514" ; "check violation")]
    #[test_case("22001" ; "string too long")]
    fn test_classify_validation(code: &str) {
        assert!(matches!(
            classify_db_error(code, None, "rejected"),
            StoreError::Validation(_)
        ));
    }

    #[test]
    fn test_classify_other_codes() {
        assert!(matches!(
            classify_db_error("42P01", None, "relation does not exist"),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            classify_db_error("40001", None, "serialization failure"),
            StoreError::TransactionFailed(_)
        ));
        assert!(matches!(
            classify_db_error("08006", None, "connection failure"),
            StoreError::ConnectionFailed(_)
        ));
        assert!(matches!(
            classify_db_error("42601", None, "syntax error"),
            StoreError::QueryFailed(_)
        ));
    }
}
