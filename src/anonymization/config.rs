//! Anonymization configuration

use crate::domain::{AnonymousError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Anonymization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Maximum number of retries after a uniqueness conflict
    ///
    /// `0` means a single attempt.
    #[serde(default)]
    pub max_retries: u32,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            audit: AuditConfig::default(),
        }
    }
}

impl AnonymizationConfig {
    /// Configuration with the given retry bound and auditing disabled
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            audit: AuditConfig {
                enabled: false,
                ..AuditConfig::default()
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.audit.validate()
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("ANONYMOUS_ANONYMIZATION_MAX_RETRIES") {
            self.max_retries = val.parse().map_err(|_| {
                AnonymousError::Configuration(format!(
                    "Invalid ANONYMOUS_ANONYMIZATION_MAX_RETRIES value: {val}"
                ))
            })?;
        }

        self.audit.apply_env_overrides()
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/anonymization.log")
}

fn default_audit_json_format() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
        }
    }
}

impl AuditConfig {
    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            return Err(AnonymousError::Configuration(
                "anonymization.audit.log_path cannot be empty when auditing is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("ANONYMOUS_ANONYMIZATION_AUDIT_ENABLED") {
            self.enabled = parse_bool("ANONYMOUS_ANONYMIZATION_AUDIT_ENABLED", &val)?;
        }

        if let Ok(val) = std::env::var("ANONYMOUS_ANONYMIZATION_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("ANONYMOUS_ANONYMIZATION_AUDIT_JSON_FORMAT") {
            self.json_format = parse_bool("ANONYMOUS_ANONYMIZATION_AUDIT_JSON_FORMAT", &val)?;
        }

        Ok(())
    }
}

fn parse_bool(name: &str, val: &str) -> Result<bool> {
    val.parse()
        .map_err(|_| AnonymousError::Configuration(format!("Invalid {name} value: {val}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnonymizationConfig::default();
        assert_eq!(config.max_retries, 0);
        assert!(config.audit.enabled);
        assert!(config.audit.json_format);
    }

    #[test]
    fn test_with_max_retries() {
        let config = AnonymizationConfig::with_max_retries(3);
        assert_eq!(config.max_retries, 3);
        assert!(!config.audit.enabled);
    }

    #[test]
    fn test_config_validation() {
        assert!(AnonymizationConfig::default().validate().is_ok());

        let mut config = AnonymizationConfig::default();
        config.audit.log_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AnonymizationConfig = toml::from_str("max_retries = 5").unwrap();
        assert_eq!(config.max_retries, 5);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_negative_retries_rejected() {
        assert!(toml::from_str::<AnonymizationConfig>("max_retries = -1").is_err());
    }
}
