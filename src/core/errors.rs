//! Custom error types for translation operations

use thiserror::Error;

use crate::core::backend::{Backend, ResponseMode};

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Backend identifier is not one of the six recognized backends
    #[error("Invalid backend: {name}")]
    InvalidBackend {
        name: String,
    },

    /// Requested response format is not supported by the backend
    #[error("Invalid response format for {backend}: {mode} (supported: {supported})")]
    InvalidResponseFormat {
        backend: Backend,
        mode: ResponseMode,
        supported: String,
    },

    /// Input is not a shape the backend accepts
    #[error("Invalid text input: {message}")]
    InvalidTextInput {
        message: String,
    },

    /// Settings value out of range or not applicable to the backend
    #[error("Invalid settings: {message}")]
    InvalidSettings {
        message: String,
    },

    /// No credentials have been set for the backend
    #[error("No credentials set for {backend}")]
    CredentialsNotSet {
        backend: Backend,
    },

    /// Credentials were rejected by the backend's verification probe
    #[error("Credential check failed for {backend}: {source}")]
    CredentialError {
        backend: Backend,
        #[source]
        source: Box<TranslationError>,
    },

    /// Dispatch succeeded but the response shape was not the expected one
    #[error("Malformed response from {backend}: {message}")]
    MalformedResponse {
        backend: Backend,
        message: String,
    },

    /// API request failed
    #[error("API error from {backend}: {status} - {message}")]
    ApiError {
        backend: Backend,
        status: u16,
        message: String,
    },

    /// Wrapper for internal faults
    #[error("Internal error: {0}")]
    InternalError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::InternalError(err.to_string())
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
