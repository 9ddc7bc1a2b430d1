//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, host parses, level known)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: UserConfig → Result<(), Vec<ValidationError>>

use std::net::IpAddr;

use crate::config::schema::UserConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("profile.name must not be empty")]
    EmptyProfileName,
    #[error("daemon.host `{0}` is not an IP address")]
    InvalidHost(String),
    #[error("daemon.max_connections must be greater than zero")]
    ZeroMaxConnections,
    #[error("daemon.max_request_bytes must be greater than zero")]
    ZeroMaxRequestBytes,
    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &UserConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.profile.name.trim().is_empty() {
        errors.push(ValidationError::EmptyProfileName);
    }
    if config.daemon.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.daemon.host.clone()));
    }
    if config.daemon.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.daemon.max_request_bytes == 0 {
        errors.push(ValidationError::ZeroMaxRequestBytes);
    }
    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&UserConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = UserConfig::default();
        config.profile.name = "  ".into();
        config.daemon.host = "localhost".into();
        config.daemon.max_connections = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyProfileName,
                ValidationError::InvalidHost("localhost".into()),
                ValidationError::ZeroMaxConnections,
                ValidationError::UnknownLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = UserConfig::default();
        config.observability.log_level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }
}
