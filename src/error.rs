//! Error types for the resolver
//!
//! Traversal itself never fails: every error here is matched at the call
//! site that produced it and turned into "no body" or a default value.

use thiserror::Error;

/// Failure to obtain a JSON body for a URI
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Transport error for '{uri}': {message}")]
    Transport { uri: String, message: String },

    #[error("HTTP {status} for '{uri}'")]
    Status { uri: String, status: u16 },

    #[error("Response from '{uri}' is not JSON: {message}")]
    Decode { uri: String, message: String },

    #[error("No document registered for '{0}'")]
    NotFound(String),
}

impl FetchError {
    /// The URI the failed request was made for
    pub fn uri(&self) -> &str {
        match self {
            FetchError::InvalidUri { uri, .. }
            | FetchError::Transport { uri, .. }
            | FetchError::Status { uri, .. }
            | FetchError::Decode { uri, .. } => uri,
            FetchError::NotFound(uri) => uri,
        }
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
