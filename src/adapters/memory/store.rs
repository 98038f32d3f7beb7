//! In-memory record store
//!
//! Tables live behind a mutex. A transaction stages its writes privately and
//! applies them on commit, so a rolled back scope leaves no trace. Unique
//! columns are checked when a write is staged and again on commit, against the
//! committed rows overlaid with the transaction's own staged rows.
//!
//! Like [`PostgreSQLSession`](crate::adapters::postgresql::PostgreSQLSession),
//! the store can carry an ambient transaction opened with
//! [`MemoryStore::begin`]. While it is open, committed nested scopes land in
//! the ambient transaction instead of the tables, and a rolled back scope
//! leaves the ambient writes alone.

use crate::adapters::database::traits::{RecordStore, StoreTransaction};
use crate::domain::{Attributes, RecordId, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Row-level check run before a write is staged
pub type Validator = Arc<dyn Fn(&Attributes) -> std::result::Result<(), String> + Send + Sync>;

/// Nested transaction counters, useful for asserting how many attempts were made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
    pub updates: usize,
}

#[derive(Default)]
struct Table {
    unique_columns: Vec<String>,
    validators: Vec<Validator>,
    rows: BTreeMap<RecordId, Attributes>,
}

type StagedRows = BTreeMap<(String, RecordId), Attributes>;

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Table>,
    ambient: Option<StagedRows>,
    stats: TransactionStats,
}

/// In-memory implementation of [`RecordStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the given unique columns
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the table already exists.
    pub fn create_table(&self, name: &str, unique_columns: &[&str]) -> StoreResult<()> {
        let mut state = lock(&self.state)?;
        if state.tables.contains_key(name) {
            return Err(StoreError::Validation(format!(
                "Table '{name}' already exists"
            )));
        }

        state.tables.insert(
            name.to_string(),
            Table {
                unique_columns: unique_columns.iter().map(|c| c.to_string()).collect(),
                ..Table::default()
            },
        );
        Ok(())
    }

    /// Register a validator that every staged write to `table` must pass
    pub fn add_validator<F>(&self, table: &str, validator: F) -> StoreResult<()>
    where
        F: Fn(&Attributes) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let mut state = lock(&self.state)?;
        table_mut(&mut state.tables, table)?
            .validators
            .push(Arc::new(validator));
        Ok(())
    }

    /// Insert a row outside of any transaction
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the row collides with an
    /// existing one, or [`StoreError::Validation`] if the id is already taken.
    pub fn insert(&self, table: &str, id: RecordId, attributes: Attributes) -> StoreResult<()> {
        let mut state = lock(&self.state)?;
        let table_ref = table_mut(&mut state.tables, table)?;

        if table_ref.rows.contains_key(&id) {
            return Err(StoreError::Validation(format!(
                "Duplicate id '{id}' in table '{table}'"
            )));
        }
        check_unique(table, table_ref, &[], &id, &attributes)?;

        table_ref.rows.insert(id, attributes);
        Ok(())
    }

    /// Committed attributes of a row
    ///
    /// Writes still held by an open ambient transaction are not visible here;
    /// use [`RecordStore::fetch`] to see them.
    pub fn get(&self, table: &str, id: &RecordId) -> Option<Attributes> {
        let state = self.state.lock().ok()?;
        state.tables.get(table)?.rows.get(id).cloned()
    }

    /// Snapshot of the nested transaction counters
    pub fn stats(&self) -> TransactionStats {
        self.state
            .lock()
            .map(|state| state.stats)
            .unwrap_or_default()
    }

    /// Start the ambient transaction
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionFailed`] if one is already open.
    pub fn begin(&self) -> StoreResult<()> {
        let mut state = lock(&self.state)?;
        if state.ambient.is_some() {
            return Err(StoreError::TransactionFailed(
                "Memory store already has an open transaction".to_string(),
            ));
        }
        state.ambient = Some(StagedRows::new());
        Ok(())
    }

    /// Commit the ambient transaction to the tables
    pub fn commit(&self) -> StoreResult<()> {
        let mut state = lock(&self.state)?;
        let ambient = take_ambient(&mut state)?;
        for ((record_type, id), row) in ambient {
            table_mut(&mut state.tables, &record_type)?
                .rows
                .insert(id, row);
        }
        Ok(())
    }

    /// Discard the ambient transaction
    pub fn rollback(&self) -> StoreResult<()> {
        let mut state = lock(&self.state)?;
        take_ambient(&mut state).map(drop)
    }

    /// Whether an ambient transaction is open
    pub fn in_transaction(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.ambient.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin_nested(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        lock(&self.state)?.stats.begun += 1;
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            staged: BTreeMap::new(),
            finished: false,
        }))
    }

    async fn fetch(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Attributes>> {
        let state = lock(&self.state)?;
        let table = table(&state.tables, record_type)?;
        let key = (record_type.to_string(), id.clone());
        Ok(state
            .ambient
            .as_ref()
            .and_then(|ambient| ambient.get(&key))
            .or_else(|| table.rows.get(id))
            .cloned())
    }

    async fn list_ids(&self, record_type: &str) -> StoreResult<Vec<RecordId>> {
        let state = lock(&self.state)?;
        Ok(table(&state.tables, record_type)?
            .rows
            .keys()
            .cloned()
            .collect())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: StagedRows,
    finished: bool,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn update(
        &mut self,
        record_type: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> StoreResult<()> {
        let key = (record_type.to_string(), id.clone());
        let row = {
            let mut state = lock(&self.state)?;
            let MemoryState {
                tables,
                ambient,
                stats,
            } = &mut *state;
            stats.updates += 1;
            let table = table(tables, record_type)?;
            let overlays = overlays(&self.staged, ambient.as_ref());

            let mut row = overlaid(&overlays, &key)
                .or_else(|| table.rows.get(id))
                .cloned()
                .ok_or_else(|| {
                    StoreError::NotFound(format!("Record {record_type}/{id} does not exist"))
                })?;
            row.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

            for validator in &table.validators {
                validator(&row).map_err(StoreError::Validation)?;
            }
            check_unique(record_type, table, &overlays, id, &row)?;
            row
        };

        self.staged.insert(key, row);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.finished = true;
        let staged = std::mem::take(&mut self.staged);
        let mut state = lock(&self.state)?;
        let MemoryState {
            tables,
            ambient,
            stats,
        } = &mut *state;

        // Rows committed by other transactions since staging may now collide.
        {
            let overlays = overlays(&staged, ambient.as_ref());
            for ((record_type, id), row) in &staged {
                let checked = table(tables, record_type)
                    .and_then(|table| check_unique(record_type, table, &overlays, id, row));
                if let Err(e) = checked {
                    stats.rolled_back += 1;
                    return Err(e);
                }
            }
        }

        match ambient {
            Some(ambient) => ambient.extend(staged),
            None => {
                for ((record_type, id), row) in staged {
                    table_mut(tables, &record_type)?.rows.insert(id, row);
                }
            }
        }
        stats.committed += 1;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.finished = true;
        self.staged.clear();
        lock(&self.state)?.stats.rolled_back += 1;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Ok(mut state) = self.state.lock() {
                state.stats.rolled_back += 1;
            }
        }
    }
}

fn lock(state: &Mutex<MemoryState>) -> StoreResult<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| StoreError::TransactionFailed("Memory store lock poisoned".to_string()))
}

fn take_ambient(state: &mut MemoryState) -> StoreResult<StagedRows> {
    state
        .ambient
        .take()
        .ok_or_else(|| StoreError::TransactionFailed("No open transaction".to_string()))
}

fn table<'a>(tables: &'a BTreeMap<String, Table>, name: &str) -> StoreResult<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| StoreError::NotFound(format!("Table '{name}' does not exist")))
}

fn table_mut<'a>(
    tables: &'a mut BTreeMap<String, Table>,
    name: &str,
) -> StoreResult<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::NotFound(format!("Table '{name}' does not exist")))
}

/// Staged rows first, then the ambient transaction's
fn overlays<'a>(staged: &'a StagedRows, ambient: Option<&'a StagedRows>) -> Vec<&'a StagedRows> {
    std::iter::once(staged).chain(ambient).collect()
}

fn overlaid<'a>(overlays: &[&'a StagedRows], key: &(String, RecordId)) -> Option<&'a Attributes> {
    overlays.iter().find_map(|rows| rows.get(key))
}

/// Check `row` against every other row of the table, overlays taking precedence
fn check_unique(
    table_name: &str,
    table: &Table,
    overlays: &[&StagedRows],
    id: &RecordId,
    row: &Attributes,
) -> StoreResult<()> {
    for column in &table.unique_columns {
        let value = match row.get(column) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };

        let collides = table
            .rows
            .iter()
            .filter(|(other_id, _)| *other_id != id)
            .map(|(other_id, committed)| {
                overlaid(overlays, &(table_name.to_string(), other_id.clone()))
                    .unwrap_or(committed)
            })
            .any(|other| other.get(column) == Some(value));

        if collides {
            return Err(StoreError::UniqueViolation {
                constraint: format!("{table_name}_{column}_key"),
                message: format!("Key ({column})=({value}) already exists"),
            });
        }
    }
    Ok(())
}
