//! Domus Auth - Session lifecycle for the Domus client
//!
//! This crate owns everything between "the user tapped Continue with Google"
//! and "show the right screen":
//!
//! - Persistent session storage (file and in-memory)
//! - Identity backend clients (HTTP and a deterministic fake)
//! - The session manager that keeps memory and storage in step
//! - Screen routing derived from session state
//!
//! ## Architecture
//!
//! - **Core** (domus-core): shared types, traits, config, logging
//! - **Auth** (this crate): session lifecycle built on those traits
//! - **Presentation** (domus-cli): user-facing commands

pub mod backend;
pub mod oauth;
pub mod profile;
pub mod routing;
pub mod session;

pub use backend::{BackendFactory, FakeBackend, FakeFailure, HttpBackend, ValidationBehavior};
pub use oauth::{authorization_url, AuthorizationOutcome};
pub use profile::{normalize_phone, prepare_update};
pub use routing::{route, Screen};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionManager, SessionSettings, SessionState,
};

/// Errors surfaced by session operations
///
/// Every variant maps to a short message the UI can show as-is; raw
/// transport errors never escape past the session manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication was cancelled")]
    Cancelled,

    #[error("No authorization code received")]
    NoAuthorizationCode,

    #[error("Code exchange failed: {backend_message}")]
    ExchangeFailed { backend_message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session is no longer valid")]
    ValidationFailed,

    #[error("Profile update failed: {backend_message}")]
    UpdateFailed { backend_message: String },

    #[error("Invalid {field}: {message}")]
    InvalidProfile { field: String, message: String },

    #[error("Failed to store session: {message}")]
    Storage { message: String },

    #[error("Another session operation is in progress")]
    Busy,
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Create an invalid profile error
    pub fn invalid_profile<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidProfile {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an exchange failure from a backend message
    pub fn exchange_failed<S: Into<String>>(backend_message: S) -> Self {
        Self::ExchangeFailed {
            backend_message: backend_message.into(),
        }
    }

    /// Short message suitable for an alert dialog
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Cancelled => "Sign-in was cancelled.".to_string(),
            AuthError::NoAuthorizationCode => {
                "The provider did not return an authorization code. Please try again.".to_string()
            }
            AuthError::ExchangeFailed { backend_message } if !backend_message.is_empty() => {
                backend_message.clone()
            }
            AuthError::ExchangeFailed { .. } => "Failed to complete authentication.".to_string(),
            AuthError::Network { .. } => {
                "Network error. Please check your connection.".to_string()
            }
            AuthError::NotAuthenticated => "Not authenticated.".to_string(),
            AuthError::ValidationFailed => {
                "Your session has expired. Please sign in again.".to_string()
            }
            AuthError::UpdateFailed { backend_message } if !backend_message.is_empty() => {
                backend_message.clone()
            }
            AuthError::UpdateFailed { .. } => "Failed to update profile.".to_string(),
            AuthError::InvalidProfile { message, .. } => message.clone(),
            AuthError::Storage { .. } => "Failed to store authentication data.".to_string(),
            AuthError::Busy => "Please wait for the current request to finish.".to_string(),
        }
    }

    /// Whether retrying the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Network { .. } | AuthError::Busy | AuthError::Storage { .. }
        )
    }
}
