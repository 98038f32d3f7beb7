//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the configuration file, including every table's rules.

use crate::anonymization::RuleDefinition;
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates, including rule compilation
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Max Retries: {}", config.anonymization.max_retries);
        if config.anonymization.audit.enabled {
            println!(
                "  Audit Log: {}",
                config.anonymization.audit.log_path.display()
            );
        } else {
            println!("  Audit Log: disabled");
        }

        match config.postgresql {
            Some(ref pg_config) => {
                use secrecy::ExposeSecret;
                println!(
                    "  PostgreSQL Connection: {}",
                    pg_config
                        .connection_string
                        .expose_secret()
                        .as_ref()
                        .rsplit_once('@')
                        .map(|(_, host)| host)
                        .unwrap_or("***")
                );
                println!("  SSL Mode: {}", pg_config.ssl_mode);
            }
            None => println!("  PostgreSQL: not configured"),
        }

        println!("  Tables: {}", config.tables.len());
        for table in &config.tables {
            println!("    {} (key: {})", table.name, table.primary_key);
            for (field, rule) in &table.fields {
                println!("      {field}: {}", describe(rule));
            }
        }
        println!();

        Ok(0)
    }
}

fn describe(rule: &RuleDefinition) -> String {
    match rule {
        RuleDefinition::Static { value } => format!("static {value}"),
        RuleDefinition::Null => "null".to_string(),
        RuleDefinition::CopyFrom { field } => format!("copy_from {field}"),
        RuleDefinition::Template { template } => format!("template \"{template}\""),
        RuleDefinition::Token { prefix } => match prefix {
            Some(prefix) => format!("token ({prefix})"),
            None => "token".to_string(),
        },
        RuleDefinition::Redact { label } => match label {
            Some(label) => format!("redact ({label})"),
            None => "redact".to_string(),
        },
        RuleDefinition::Uuid => "uuid".to_string(),
        RuleDefinition::Fake { faker } => format!("fake {faker:?}"),
    }
}
