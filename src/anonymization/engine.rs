//! Main anonymization engine
//!
//! This module provides the [`AnonymizationEngine`] that writes anonymized
//! attributes back to a [`RecordStore`] inside a nested transaction, retrying
//! when the generated values collide with a unique constraint.
//!
//! # Retry semantics
//!
//! Each attempt opens a fresh nested scope, generates fresh values from the
//! record's attributes as they were when the call started, and submits them.
//! Only [`StoreError::UniqueViolation`](crate::domain::StoreError::UniqueViolation)
//! is retried, at most `max_retries` times. When the bound is exhausted the last
//! conflict is returned unchanged. The retry counter lives on the stack of a
//! single call, so every call starts from zero.
//!
//! # Examples
//!
//! ```no_run
//! use anonymous::adapters::memory::MemoryStore;
//! use anonymous::anonymization::{AnonymizationConfig, AnonymizationEngine, Record, RuleSet};
//! use anonymous::domain::{Attributes, RecordId};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.create_table("users", &["email"])?;
//!
//! let mut attrs = Attributes::new();
//! attrs.insert("id".to_string(), json!(1));
//! attrs.insert("email".to_string(), json!("jane@example.com"));
//! let id = RecordId::new("1").map_err(anyhow::Error::msg)?;
//! store.insert("users", id.clone(), attrs.clone())?;
//!
//! let engine = AnonymizationEngine::new(store, AnonymizationConfig::with_max_retries(3))?;
//! let mut record = Record::new("users", id, attrs)
//!     .with_rules(RuleSet::new().template("email", "user-{id}@example.invalid")?);
//!
//! let outcome = engine.anonymize_strict(&mut record).await?;
//! println!("Anonymized {} fields in {} attempts", outcome.fields.len(), outcome.attempts);
//! # Ok(())
//! # }
//! ```

use crate::adapters::database::RecordStore;
use crate::anonymization::{
    audit::AuditLogger,
    config::AnonymizationConfig,
    generator::{declared_changes, generate},
    models::AnonymizationOutcome,
    record::Anonymizable,
    rules::RuleSet,
};
use crate::domain::{Attributes, Result};
use std::sync::Arc;
use std::time::Instant;

/// Main anonymization engine
///
/// # Thread Safety
///
/// The engine holds no per-call state and can be shared across tasks using
/// `Arc`. Concurrent calls on the *same* in-memory record are not supported;
/// they need `&mut` access anyway.
pub struct AnonymizationEngine {
    store: Arc<dyn RecordStore>,
    config: AnonymizationConfig,
    audit_logger: Option<AuditLogger>,
}

impl AnonymizationEngine {
    /// Create a new anonymization engine
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the audit log
    /// directory cannot be created.
    pub fn new(store: Arc<dyn RecordStore>, config: AnonymizationConfig) -> Result<Self> {
        config.validate()?;

        let audit_logger = if config.audit.enabled {
            Some(AuditLogger::new(
                config.audit.log_path.clone(),
                config.audit.json_format,
                true,
            )?)
        } else {
            None
        };

        tracing::debug!(
            store = %store.store_name(),
            max_retries = config.max_retries,
            audit = config.audit.enabled,
            "Anonymization engine ready"
        );

        Ok(Self {
            store,
            config,
            audit_logger,
        })
    }

    /// Anonymize a record, failing on any error
    ///
    /// On success the record's in-memory attributes are replaced with the
    /// committed values.
    ///
    /// # Errors
    ///
    /// - [`AnonymousError::NotImplemented`] if the record declares no rules
    ///   (before any transaction is opened)
    /// - [`AnonymousError::Configuration`] for malformed rules
    /// - [`AnonymousError::Store`] with the original
    ///   [`UniqueViolation`](crate::domain::StoreError::UniqueViolation) once
    ///   retries are exhausted, or any other store error immediately
    ///
    /// [`AnonymousError::NotImplemented`]: crate::domain::AnonymousError::NotImplemented
    /// [`AnonymousError::Configuration`]: crate::domain::AnonymousError::Configuration
    /// [`AnonymousError::Store`]: crate::domain::AnonymousError::Store
    pub async fn anonymize_strict<R>(&self, record: &mut R) -> Result<AnonymizationOutcome>
    where
        R: Anonymizable + ?Sized,
    {
        self.run(record).await
    }

    /// Anonymize a record, reporting ordinary store failures as `Ok(false)`
    ///
    /// Configuration errors and exhausted uniqueness retries are still returned
    /// as errors.
    pub async fn anonymize<R>(&self, record: &mut R) -> Result<bool>
    where
        R: Anonymizable + ?Sized,
    {
        match self.run(record).await {
            Ok(_) => Ok(true),
            Err(e) => match e.as_store_error() {
                Some(err) if !err.is_unique_violation() => {
                    tracing::warn!(
                        store = %self.store.store_name(),
                        record_type = %record.record_type(),
                        record_id = %record.record_id(),
                        error = %err,
                        "Anonymization rejected by store"
                    );
                    Ok(false)
                }
                _ => Err(e),
            },
        }
    }

    /// Generate the anonymized attributes without touching the store
    pub fn preview<R>(&self, record: &R) -> Result<Attributes>
    where
        R: Anonymizable + ?Sized,
    {
        let rules = record.anonymization_rules()?;
        generate(record.attributes(), &rules)
    }

    /// Configured retry bound
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Shared retry loop
    async fn run<R>(&self, record: &mut R) -> Result<AnonymizationOutcome>
    where
        R: Anonymizable + ?Sized,
    {
        let start = Instant::now();

        let rules = record.anonymization_rules()?;
        rules.validate(record.attributes())?;

        let mut retries: u32 = 0;
        let committed = loop {
            match self.attempt(&*record, &rules).await {
                Ok(attributes) => break attributes,
                Err(e) if e.is_unique_violation() && retries < self.config.max_retries => {
                    retries += 1;
                    crate::log_retry_attempt!(
                        record.record_type(),
                        record.record_id(),
                        retries,
                        self.config.max_retries,
                        e.to_string()
                    );
                }
                Err(e) => {
                    crate::log_error_with_context!(
                        &e,
                        format!(
                            "Anonymization of {}/{} on {} failed after {} attempt(s)",
                            record.record_type(),
                            record.record_id(),
                            self.store.store_name(),
                            retries + 1
                        )
                    );
                    return Err(e);
                }
            }
        };

        let outcome = AnonymizationOutcome::new(
            record.record_type().to_string(),
            record.record_id().clone(),
            retries + 1,
            rules.fields().map(str::to_string).collect(),
            start.elapsed().as_millis() as u64,
        );

        if let Some(ref logger) = self.audit_logger {
            if let Err(e) = logger.log_anonymization(&outcome, record.attributes()) {
                // The update is already committed; auditing must not undo it.
                crate::log_error_with_context!(&e, "Failed to write anonymization audit entry");
            }
        }

        record.assign_attributes(committed);
        crate::log_anonymization_complete!(&outcome);

        Ok(outcome)
    }

    /// One attempt: nested scope, fresh values, update, commit
    async fn attempt<R>(&self, record: &R, rules: &RuleSet) -> Result<Attributes>
    where
        R: Anonymizable + ?Sized,
    {
        let mut tx = self.store.begin_nested().await?;

        let anonymized = match generate(record.attributes(), rules) {
            Ok(attributes) => attributes,
            Err(e) => {
                Self::rollback_quietly(tx, record).await;
                return Err(e);
            }
        };

        let changes = declared_changes(&anonymized, rules);
        if let Err(e) = tx
            .update(record.record_type(), record.record_id(), &changes)
            .await
        {
            Self::rollback_quietly(tx, record).await;
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(anonymized)
    }

    /// Roll back a failed attempt, keeping the attempt's own error as the result
    async fn rollback_quietly<R>(
        tx: Box<dyn crate::adapters::database::StoreTransaction>,
        record: &R,
    ) where
        R: Anonymizable + ?Sized,
    {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::error!(
                record_type = %record.record_type(),
                record_id = %record.record_id(),
                error = %rollback_err,
                "Failed to roll back anonymization attempt"
            );
        }
    }
}
