//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Anonymous using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Anonymous - Transactional record anonymization
#[derive(Parser, Debug)]
#[command(name = "anonymous")]
#[command(version, about, long_about = None)]
#[command(author = "Anonymous Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "anonymous.toml", env = "ANONYMOUS_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ANONYMOUS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Anonymize rows of a configured table
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
