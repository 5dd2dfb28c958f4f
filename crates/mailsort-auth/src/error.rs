//! Error types for the auth module

use std::time::Duration;
use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// No callback arrived before the deadline
    #[error("Authentication timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The provider redirected back with an `error` parameter
    #[error("OAuth Error: {error} - {}", .description.as_deref().unwrap_or("No description"))]
    AuthorizationFailed {
        error: String,
        description: Option<String>,
    },

    /// The callback carried neither `code` nor `error`
    #[error("Missing authorization code")]
    MissingCode,

    /// The `state` parameter did not match the one we sent
    #[error("CSRF token mismatch in OAuth2 callback")]
    StateMismatch,

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Failed to start local callback server
    #[error("Failed to start callback server: {0}")]
    CallbackServerFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
