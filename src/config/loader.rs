//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::AnonymousConfig;
use crate::config::secret_string;
use crate::domain::errors::AnonymousError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into [`AnonymousConfig`]
/// 4. Applies environment variable overrides (ANONYMOUS_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`AnonymousError::Configuration`] if the file cannot be read, a
/// referenced environment variable is unset, the TOML is invalid (including
/// unknown rule kinds), or validation fails.
///
/// # Examples
///
/// ```no_run
/// use anonymous::config::loader::load_config;
///
/// let config = load_config("anonymous.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<AnonymousConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(AnonymousError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        AnonymousError::Configuration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: AnonymousConfig = toml::from_str(&contents)
        .map_err(|e| AnonymousError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        AnonymousError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced environment variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| {
        AnonymousError::Configuration(format!("Failed to compile substitution pattern: {e}"))
    })?;
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }

            re.replace_all(line, |caps: &regex::Captures<'_>| {
                match std::env::var(&caps[1]) {
                    Ok(value) => value,
                    Err(_) => {
                        if !missing_vars.iter().any(|v| v == &caps[1]) {
                            missing_vars.push(caps[1].to_string());
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(AnonymousError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the ANONYMOUS_* prefix
///
/// Environment variables follow the pattern `ANONYMOUS_<SECTION>_<KEY>`,
/// for example `ANONYMOUS_APPLICATION_LOG_LEVEL` or
/// `ANONYMOUS_ANONYMIZATION_MAX_RETRIES`.
fn apply_env_overrides(config: &mut AnonymousConfig) -> Result<()> {
    if let Ok(val) = std::env::var("ANONYMOUS_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("ANONYMOUS_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    config.anonymization.apply_env_overrides()?;

    if let Some(ref mut postgresql) = config.postgresql {
        if let Ok(val) = std::env::var("ANONYMOUS_POSTGRESQL_CONNECTION_STRING") {
            postgresql.connection_string = secret_string(val);
        }
        if let Ok(val) = std::env::var("ANONYMOUS_POSTGRESQL_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                postgresql.max_connections = max;
            }
        }
        if let Ok(val) = std::env::var("ANONYMOUS_POSTGRESQL_SSL_MODE") {
            postgresql.ssl_mode = val;
        }
    }

    if let Ok(val) = std::env::var("ANONYMOUS_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("ANONYMOUS_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
