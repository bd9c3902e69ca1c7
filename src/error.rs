//! Custom error types for Intruder
//!
//! Configuration problems are raised before any request leaves the process;
//! transport problems are confined to the worker that hit them.

use thiserror::Error;

/// Main error type for Intruder operations
#[derive(Error, Debug)]
pub enum FuzzError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wordlist loading errors
    #[error("Wordlist error: {0}")]
    Wordlist(String),

    /// Report writing errors
    #[error("Report error: {0}")]
    Report(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingField(String),

    #[error("Invalid regex in {component}: '{pattern}' ({reason})")]
    InvalidRegex {
        component: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid {name} comparator: '{value}'")]
    InvalidComparator { name: String, value: String },

    #[error("Unknown encoder: {0}")]
    InvalidEncoder(String),

    #[error("Unknown case transform: {0}")]
    InvalidCase(String),

    #[error("Invalid status code specification: {0}")]
    InvalidStatus(String),

    #[error("Unknown scanner: {0}")]
    UnknownScanner(String),
}

/// HTTP transport errors
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    #[error("Failed to read body: {0}")]
    Body(String),
}

impl ConfigError {
    /// Shorthand used by every component that compiles a user supplied pattern
    pub fn invalid_regex(component: &str, pattern: &str, err: &regex::Error) -> Self {
        ConfigError::InvalidRegex {
            component: component.to_string(),
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

impl FuzzError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FuzzError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            FuzzError::Transport(e) => format!("Network issue: {}", e.user_hint()),
            FuzzError::Wordlist(e) => format!("Wordlist issue: {}", e),
            FuzzError::Report(e) => format!("Report issue: {}", e),
            FuzzError::Io(e) => format!("File system issue: {}", e),
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::InvalidRegex { component, pattern, .. } => {
                format!("The {} regex '{}' does not compile.", component, pattern)
            }
            ConfigError::InvalidComparator { name, value } => {
                format!(
                    "'{}' is not a valid {} comparator. Use an optional operator (>, >=, <, <=, ==, !=) followed by a number.",
                    value, name
                )
            }
            ConfigError::InvalidEncoder(name) => {
                format!("Encoder '{}' is not known. Run with --list-encoders to see the available ones.", name)
            }
            _ => self.to_string(),
        }
    }
}

impl UserHint for TransportError {
    fn user_hint(&self) -> String {
        match self {
            TransportError::Connect(_) => {
                "Could not connect to the server. Check if it's running and accessible.".into()
            }
            TransportError::Timeout(ms) => {
                format!("Request timed out after {}ms. The server may be slow or unresponsive.", ms)
            }
            TransportError::InvalidUrl(url) => {
                format!("'{}' is not a valid URL. Check the format.", url)
            }
            TransportError::Tls(_) => {
                "TLS/SSL connection failed. The certificate may be invalid or expired.".into()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_regex_names_component_and_pattern() {
        let err = regex::Regex::new("(").unwrap_err();
        let config = ConfigError::invalid_regex("matcher", "(", &err);
        let message = config.to_string();
        assert!(message.contains("matcher"));
        assert!(message.contains("'('"));
    }

    #[test]
    fn test_user_message_wraps_hint() {
        let err = FuzzError::from(ConfigError::InvalidComparator {
            name: "size".into(),
            value: ">abc".into(),
        });
        assert!(err.user_message().starts_with("Configuration problem"));
        assert!(err.user_message().contains(">abc"));
    }
}
