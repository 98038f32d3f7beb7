//! Anonymize command implementation
//!
//! This module implements the `anonymize` command, which loads a table's rules
//! from the configuration and anonymizes the selected rows in PostgreSQL.

use crate::adapters::database::RecordStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::anonymization::{AnonymizationEngine, Record, RuleSet};
use crate::config::load_config;
use crate::domain::{AnonymousError, RecordId};
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Table to anonymize (must have a [[tables]] entry)
    #[arg(short, long)]
    pub table: String,

    /// Primary key of a row to anonymize (repeatable)
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// Anonymize every row of the table
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    /// Keep going after a row fails instead of stopping at the first error
    #[arg(long)]
    pub lenient: bool,

    /// Print the generated values without writing them
    #[arg(long)]
    pub dry_run: bool,
}

/// How each record is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop at the first failing record
    Strict,
    /// Count rejected records and continue
    Lenient,
    /// Generate values only
    DryRun,
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub anonymized: usize,
    pub previewed: usize,
    pub failed: usize,
    pub missing: usize,
    pub interrupted: bool,
}

impl RunSummary {
    /// 0 when every selected row was handled, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 || self.missing > 0 || self.interrupted {
            1
        } else {
            0
        }
    }

    fn print(&self) {
        println!();
        println!("Summary:");
        println!("  Anonymized: {}", self.anonymized);
        if self.previewed > 0 {
            println!("  Previewed:  {}", self.previewed);
        }
        println!("  Failed:     {}", self.failed);
        println!("  Missing:    {}", self.missing);
        if self.interrupted {
            println!("  ⚠️  Interrupted before all rows were processed");
        }
    }
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(table = %self.table, "Starting anonymize command");

        if self.ids.is_empty() && !self.all {
            eprintln!("Nothing to do: pass --id <ID> (repeatable) or --all");
            return Ok(2);
        }

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let Some(table) = config.table(&self.table) else {
            eprintln!("Table '{}' has no [[tables]] entry in {config_path}", self.table);
            return Ok(2);
        };

        let rules = match table.rule_set()? {
            Some(rules) => rules,
            None => {
                let e = AnonymousError::NotImplemented {
                    record_type: table.name.clone(),
                };
                eprintln!("{e}");
                return Ok(2);
            }
        };

        let Some(pg_config) = config.postgresql.clone() else {
            eprintln!("A [postgresql] section is required to anonymize rows");
            return Ok(2);
        };

        let client = match PostgreSQLClient::new(pg_config) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                eprintln!("Invalid PostgreSQL configuration: {e}");
                return Ok(2);
            }
        };
        if let Err(e) = client.test_connection().await {
            tracing::error!(error = %e, "PostgreSQL connection failed");
            eprintln!("Failed to connect to {}: {e}", client.connection_string_safe());
            return Ok(4);
        }

        let store = Arc::new(
            PostgreSQLStore::new(client).with_key_column(&table.name, &table.primary_key),
        );
        let engine = AnonymizationEngine::new(store.clone(), config.anonymization.clone())?;

        let ids = if self.all {
            store.list_ids(&table.name).await?
        } else {
            self.ids
                .iter()
                .map(|id| RecordId::new(id.as_str()).map_err(anyhow::Error::msg))
                .collect::<anyhow::Result<Vec<_>>>()?
        };

        let mode = if self.dry_run || config.application.dry_run {
            println!("🔍 DRY RUN MODE - No data will be written to the database");
            RunMode::DryRun
        } else if self.lenient {
            RunMode::Lenient
        } else {
            RunMode::Strict
        };

        println!("🚀 Anonymizing {} row(s) of {}", ids.len(), table.name);
        let summary = process_records(
            &engine,
            store.as_ref(),
            &table.name,
            &ids,
            &rules,
            mode,
            &shutdown_signal,
        )
        .await?;

        summary.print();
        Ok(summary.exit_code())
    }
}

/// Anonymize `ids` one by one, checking for shutdown between rows
///
/// # Errors
///
/// Returns an error only for failures that make every further row pointless,
/// such as an unreachable store while fetching.
pub async fn process_records(
    engine: &AnonymizationEngine,
    store: &dyn RecordStore,
    table: &str,
    ids: &[RecordId],
    rules: &RuleSet,
    mode: RunMode,
    shutdown_signal: &watch::Receiver<bool>,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();

    for id in ids {
        if *shutdown_signal.borrow() {
            tracing::warn!(table = %table, "Shutdown requested, stopping before {id}");
            summary.interrupted = true;
            break;
        }

        let Some(attributes) = store.fetch(table, id).await? else {
            tracing::warn!(table = %table, record_id = %id, "Row not found");
            println!("  ⚠️  {table}/{id}: not found");
            summary.missing += 1;
            continue;
        };

        let mut record = Record::new(table, id.clone(), attributes).with_rules(rules.clone());

        match mode {
            RunMode::DryRun => {
                let preview = engine.preview(&record)?;
                println!("  {table}/{id}:");
                for field in rules.fields() {
                    if let Some(value) = preview.get(field) {
                        println!("    {field} = {value}");
                    }
                }
                summary.previewed += 1;
            }
            RunMode::Lenient => match engine.anonymize(&mut record).await {
                Ok(true) => summary.anonymized += 1,
                Ok(false) => {
                    println!("  ❌ {table}/{id}: rejected by the database");
                    summary.failed += 1;
                }
                Err(e) => {
                    println!("  ❌ {table}/{id}: {e}");
                    summary.failed += 1;
                }
            },
            RunMode::Strict => match engine.anonymize_strict(&mut record).await {
                Ok(outcome) => {
                    tracing::debug!(attempts = outcome.attempts, "Row anonymized");
                    summary.anonymized += 1;
                }
                Err(e) => {
                    println!("  ❌ {table}/{id}: {e}");
                    summary.failed += 1;
                    break;
                }
            },
        }
    }

    Ok(summary)
}
