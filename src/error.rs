//! Error types for Polymode
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Polymode operations
///
/// This enum encompasses all possible errors that can occur during
/// turn orchestration, gateway calls, conversation persistence, and
/// configuration loading.
#[derive(Error, Debug)]
pub enum PolymodeError {
    /// Missing or invalid credential; fatal to any generation call until resolved
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pathway precondition was not met (e.g. missing required attachment)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A generation backend call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Retrieval of a generated artifact failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Persistence access denied, with remediation steps for the user
    #[error("Permission denied: {message}\n{remediation}")]
    Permission {
        /// What was being attempted when access was denied
        message: String,
        /// Actionable steps to resolve the denial
        remediation: String,
    },

    /// Backend succeeded transport-wise but returned no usable payload
    #[error("Generation error: {0}")]
    Generation(String),

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A dispatch was rejected because the conversation already has a turn in flight
    #[error("A turn is already in flight for conversation: {0}")]
    TurnInFlight(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Polymode operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let error = PolymodeError::Configuration("no API credential configured".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: no API credential configured"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = PolymodeError::Validation("image edit requires an attached image".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: image edit requires an attached image"
        );
    }

    #[test]
    fn test_upstream_error_display() {
        let error = PolymodeError::Upstream("model overloaded".to_string());
        assert_eq!(error.to_string(), "Upstream error: model overloaded");
    }

    #[test]
    fn test_fetch_error_display() {
        let error = PolymodeError::Fetch("status 404".to_string());
        assert_eq!(error.to_string(), "Fetch error: status 404");
    }

    #[test]
    fn test_permission_error_display_includes_remediation() {
        let error = PolymodeError::Permission {
            message: "cannot open database".to_string(),
            remediation: "Check directory ownership.".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("cannot open database"));
        assert!(s.contains("Check directory ownership."));
    }

    #[test]
    fn test_generation_error_display() {
        let error = PolymodeError::Generation("backend returned zero images".to_string());
        assert_eq!(
            error.to_string(),
            "Generation error: backend returned zero images"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let error = PolymodeError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_turn_in_flight_error_display() {
        let error = PolymodeError::TurnInFlight("01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string());
        assert!(error.to_string().contains("already in flight"));
        assert!(error.to_string().contains("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: PolymodeError = io_error.into();
        assert!(matches!(error, PolymodeError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: PolymodeError = json_error.into();
        assert!(matches!(error, PolymodeError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_str = "invalid: : yaml";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: PolymodeError = yaml_error.into();
        assert!(matches!(error, PolymodeError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolymodeError>();
    }
}
