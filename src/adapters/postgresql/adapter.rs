//! PostgreSQL adapter implementing the record store traits
//!
//! Two stores are provided:
//!
//! - [`PostgreSQLStore`] checks a connection out of the pool for every nested
//!   scope and runs it as its own transaction.
//! - [`PostgreSQLSession`] pins one connection that carries a caller-managed
//!   ambient transaction; every nested scope is a `SAVEPOINT` inside it, so a
//!   failed attempt rolls back only its own writes.

use crate::adapters::database::traits::{RecordStore, StoreTransaction};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::sql::{
    list_ids_statement, map_pg_error, select_statement, update_statement,
};
use crate::domain::{
    attributes_from_json, attributes_to_json, Attributes, RecordId, StoreError, StoreResult,
};
use async_trait::async_trait;
use deadpool_postgres::Object;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_KEY_COLUMN: &str = "id";

/// Primary key column per table
#[derive(Debug, Clone, Default)]
struct KeyColumns(HashMap<String, String>);

impl KeyColumns {
    fn get(&self, table: &str) -> &str {
        self.0
            .get(table)
            .map(String::as_str)
            .unwrap_or(DEFAULT_KEY_COLUMN)
    }
}

/// PostgreSQL store with one pooled transaction per nested scope
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
    key_columns: Arc<KeyColumns>,
}

impl PostgreSQLStore {
    /// Create a new store over a client
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self {
            client,
            key_columns: Arc::new(KeyColumns::default()),
        }
    }

    /// Use `column` instead of `id` as the primary key of `table`
    pub fn with_key_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.key_columns)
            .0
            .insert(table.into(), column.into());
        self
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl RecordStore for PostgreSQLStore {
    async fn begin_nested(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let conn = self.client.get_connection().await?;
        let opened = conn
            .batch_execute(&format!(
                "BEGIN; SET LOCAL statement_timeout = {}",
                self.client.statement_timeout_ms()
            ))
            .await;
        if let Err(e) = opened {
            // The session may be left inside a half-open transaction.
            drop(Object::take(conn));
            return Err(map_pg_error(e));
        }

        tracing::trace!("Opened pooled transaction");
        Ok(Box::new(PostgreSQLTransaction {
            conn: Some(ScopeConnection::Pooled(conn)),
            scope: Scope::Transaction,
            key_columns: Arc::clone(&self.key_columns),
            finished: false,
        }))
    }

    async fn fetch(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Attributes>> {
        let conn = self.client.get_connection().await?;
        fetch_row(&conn, record_type, self.key_columns.get(record_type), id).await
    }

    async fn list_ids(&self, record_type: &str) -> StoreResult<Vec<RecordId>> {
        let conn = self.client.get_connection().await?;
        list_row_ids(&conn, record_type, self.key_columns.get(record_type)).await
    }

    fn store_name(&self) -> &str {
        "postgresql"
    }
}

/// PostgreSQL store bound to one connection and its ambient transaction
///
/// Call [`begin`](Self::begin) before anonymizing and [`commit`](Self::commit)
/// or [`rollback`](Self::rollback) afterwards. Nested scopes opened in between
/// are savepoints.
pub struct PostgreSQLSession {
    conn: Arc<Mutex<Object>>,
    statement_timeout_ms: u64,
    key_columns: Arc<KeyColumns>,
    savepoints: AtomicU64,
}

impl PostgreSQLSession {
    /// Pin a pooled connection for the session
    pub async fn connect(client: &PostgreSQLClient) -> StoreResult<Self> {
        Ok(Self {
            conn: Arc::new(Mutex::new(client.get_connection().await?)),
            statement_timeout_ms: client.statement_timeout_ms(),
            key_columns: Arc::new(KeyColumns::default()),
            savepoints: AtomicU64::new(0),
        })
    }

    /// Use `column` instead of `id` as the primary key of `table`
    pub fn with_key_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.key_columns)
            .0
            .insert(table.into(), column.into());
        self
    }

    /// Start the ambient transaction
    pub async fn begin(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.batch_execute(&format!(
            "BEGIN; SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .await
        .map_err(map_pg_error)
    }

    /// Commit the ambient transaction
    pub async fn commit(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.batch_execute("COMMIT").await.map_err(map_pg_error)
    }

    /// Roll back the ambient transaction
    pub async fn rollback(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.batch_execute("ROLLBACK").await.map_err(map_pg_error)
    }
}

#[async_trait]
impl RecordStore for PostgreSQLSession {
    async fn begin_nested(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        let name = format!(
            "anonymous_attempt_{}",
            self.savepoints.fetch_add(1, Ordering::Relaxed)
        );

        guard
            .batch_execute(&format!("SAVEPOINT {name}"))
            .await
            .map_err(map_pg_error)?;

        tracing::trace!(savepoint = %name, "Opened savepoint");
        Ok(Box::new(PostgreSQLTransaction {
            conn: Some(ScopeConnection::Shared(guard)),
            scope: Scope::Savepoint(name),
            key_columns: Arc::clone(&self.key_columns),
            finished: false,
        }))
    }

    async fn fetch(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Attributes>> {
        let conn = self.conn.lock().await;
        fetch_row(&conn, record_type, self.key_columns.get(record_type), id).await
    }

    async fn list_ids(&self, record_type: &str) -> StoreResult<Vec<RecordId>> {
        let conn = self.conn.lock().await;
        list_row_ids(&conn, record_type, self.key_columns.get(record_type)).await
    }

    fn store_name(&self) -> &str {
        "postgresql-session"
    }
}

enum ScopeConnection {
    Pooled(Object),
    Shared(OwnedMutexGuard<Object>),
}

impl ScopeConnection {
    fn client(&self) -> &tokio_postgres::Client {
        match self {
            ScopeConnection::Pooled(conn) => conn,
            ScopeConnection::Shared(guard) => guard,
        }
    }
}

enum Scope {
    Transaction,
    Savepoint(String),
}

impl Scope {
    fn commit_sql(&self) -> String {
        match self {
            Scope::Transaction => "COMMIT".to_string(),
            Scope::Savepoint(name) => format!("RELEASE SAVEPOINT {name}"),
        }
    }

    fn rollback_sql(&self) -> String {
        match self {
            Scope::Transaction => "ROLLBACK".to_string(),
            Scope::Savepoint(name) => {
                format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}")
            }
        }
    }
}

/// Nested scope on PostgreSQL
pub struct PostgreSQLTransaction {
    conn: Option<ScopeConnection>,
    scope: Scope,
    key_columns: Arc<KeyColumns>,
    finished: bool,
}

impl PostgreSQLTransaction {
    fn client(&self) -> StoreResult<&tokio_postgres::Client> {
        self.conn
            .as_ref()
            .map(ScopeConnection::client)
            .ok_or_else(|| StoreError::TransactionFailed("Scope already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for PostgreSQLTransaction {
    async fn update(
        &mut self,
        record_type: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> StoreResult<()> {
        let key_column = self.key_columns.get(record_type);
        let Some(statement) = update_statement(record_type, key_column, attributes)? else {
            return Ok(());
        };

        let payload = attributes_to_json(attributes);
        let updated = self
            .client()?
            .execute(statement.as_str(), &[&payload, &id.as_str()])
            .await
            .map_err(map_pg_error)?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!(
                "Record {record_type}/{id} does not exist"
            )));
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let result = self
            .client()?
            .batch_execute(&self.scope.commit_sql())
            .await
            .map_err(map_pg_error);

        if let (Err(_), Scope::Savepoint(_)) = (&result, &self.scope) {
            // A failed RELEASE leaves the savepoint open.
            if let Err(e) = self
                .client()?
                .batch_execute(&self.scope.rollback_sql())
                .await
            {
                tracing::error!(error = %e, "Failed to roll back savepoint after failed release");
            }
        }

        self.finished = true;
        result
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        let result = self
            .client()?
            .batch_execute(&self.scope.rollback_sql())
            .await
            .map_err(map_pg_error);
        self.finished = true;
        result
    }
}

impl Drop for PostgreSQLTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match self.conn.take() {
            // Never hand a connection with an open transaction back to the pool.
            Some(ScopeConnection::Pooled(conn)) => drop(Object::take(conn)),
            Some(ScopeConnection::Shared(_)) => {
                tracing::warn!("Savepoint dropped without commit or rollback");
            }
            None => {}
        }
    }
}

async fn fetch_row(
    client: &tokio_postgres::Client,
    table: &str,
    key_column: &str,
    id: &RecordId,
) -> StoreResult<Option<Attributes>> {
    let statement = select_statement(table, key_column)?;
    let row = client
        .query_opt(statement.as_str(), &[&id.as_str()])
        .await
        .map_err(map_pg_error)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let value = row.try_get::<_, Value>(0).map_err(map_pg_error)?;
    attributes_from_json(value)
        .map(Some)
        .map_err(|e| StoreError::QueryFailed(format!("{table}/{id}: {e}")))
}

async fn list_row_ids(
    client: &tokio_postgres::Client,
    table: &str,
    key_column: &str,
) -> StoreResult<Vec<RecordId>> {
    let statement = list_ids_statement(table, key_column)?;
    let rows = client
        .query(statement.as_str(), &[])
        .await
        .map_err(map_pg_error)?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get(0).map_err(map_pg_error)?;
            RecordId::new(id).map_err(StoreError::QueryFailed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_columns_default() {
        let mut columns = KeyColumns::default();
        columns.0.insert("accounts".to_string(), "uuid".to_string());

        assert_eq!(columns.get("accounts"), "uuid");
        assert_eq!(columns.get("users"), "id");
    }

    #[test]
    fn test_savepoint_sql() {
        let scope = Scope::Savepoint("anonymous_attempt_3".to_string());
        assert_eq!(scope.commit_sql(), "RELEASE SAVEPOINT anonymous_attempt_3");
        assert_eq!(
            scope.rollback_sql(),
            "ROLLBACK TO SAVEPOINT anonymous_attempt_3; RELEASE SAVEPOINT anonymous_attempt_3"
        );
    }

    #[test]
    fn test_transaction_sql() {
        assert_eq!(Scope::Transaction.commit_sql(), "COMMIT");
        assert_eq!(Scope::Transaction.rollback_sql(), "ROLLBACK");
    }
}
