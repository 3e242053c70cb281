//! Identity backend clients
//!
//! The session manager talks to the identity authority through
//! [`IdentityBackend`]. Which implementation it gets is decided once, at
//! construction time, by [`BackendFactory`].

use domus_core::{
    BackendConfig, BackendKind, DomusError, DomusResult, ErrorContext, IdentityBackend,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub mod fake;
pub mod http;


pub use fake::{FakeBackend, FakeFailure, ValidationBehavior};
pub use http::HttpBackend;

/// Factory for creating identity backends
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend selected by `config.kind`
    pub fn create(config: &BackendConfig) -> DomusResult<Arc<dyn IdentityBackend>> {
        match config.kind {
            BackendKind::Http => Ok(Arc::new(HttpBackend::new(config)?)),
            BackendKind::Fake => Ok(Arc::new(FakeBackend::new())),
        }
    }
}

/// Error body shape returned by the identity service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &BackendConfig) -> DomusResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            DomusError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .default_headers(headers)
        .build()
        .map_err(|e| DomusError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?;

    Ok(client)
}

/// Turn a non-success response into a `Backend` error
///
/// The message comes from a `{"message": "..."}` body when there is one,
/// otherwise from the raw body or the status reason.
pub(crate) async fn handle_response_error(
    response: reqwest::Response,
    operation: &str,
) -> DomusError {
    let status = response.status();
    let url = response.url().clone();

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&error_body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            if error_body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                error_body.trim().to_string()
            }
        });

    DomusError::Backend {
        status: status.as_u16(),
        message,
        context: ErrorContext::new("http_backend")
            .with_operation(operation)
            .with_metadata("status", &status.as_u16().to_string())
            .with_metadata("url", url.as_str())
            .with_suggestion(match status.as_u16() {
                401 => "Sign in again",
                403 => "The session is not allowed to perform this action",
                404 => "Check backend.api_url and backend.api_version",
                _ => "Check network connectivity and API status",
            }),
    }
}

/// Map a transport failure (no response received) to a `DomusError`
pub(crate) fn transport_error(
    error: reqwest::Error,
    operation: &str,
    timeout: Duration,
) -> DomusError {
    if error.is_timeout() {
        return DomusError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout.as_millis() as u64,
            context: ErrorContext::new("http_backend")
                .with_operation(operation)
                .with_suggestion("Check network connectivity"),
        };
    }

    DomusError::Network {
        message: format!("Request failed: {}", error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_backend")
            .with_operation(operation)
            .with_suggestion("Check your connection and try again"),
    }
}
