//! HTTP identity backend

use async_trait::async_trait;
use domus_core::{
    AuthGrant, AuthProvider, BackendConfig, DomusError, DomusResult, ErrorContext,
    IdentityBackend, ProfileUpdate, UserPatch,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

use super::{create_http_client, handle_response_error, transport_error};

/// Client for the identity service REST API
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// Body of the code exchange request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    code: &'a str,
    redirect_uri: &'a str,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new(config: &BackendConfig) -> DomusResult<Self> {
        let client = create_http_client(config)?;
        let base_url = config.base_url();

        info!("Created HTTP identity backend for {}", base_url);

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> DomusResult<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| transport_error(e, operation, self.timeout))
    }

    async fn read_body(&self, response: reqwest::Response, operation: &str) -> DomusResult<String> {
        response
            .text()
            .await
            .map_err(|e| transport_error(e, operation, self.timeout))
    }
}

fn invalid_response(operation: &str, error: serde_json::Error) -> DomusError {
    DomusError::Internal {
        message: format!("Invalid response from identity service: {}", error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_backend")
            .with_operation(operation)
            .with_suggestion("Check that backend.api_url points at the identity service"),
    }
}

#[async_trait]
impl IdentityBackend for HttpBackend {
    async fn exchange_authorization_code(
        &self,
        provider: AuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> DomusResult<AuthGrant> {
        let url = self.url(&format!("auth/oauth/{}", provider.slug()));
        debug!("Exchanging {} authorization code at {}", provider, url);

        let request = self.client.post(&url).json(&ExchangeRequest { code, redirect_uri });
        let response = self.send(request, "exchange_authorization_code").await?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "exchange_authorization_code").await);
        }

        let body = self.read_body(response, "exchange_authorization_code").await?;
        let grant: AuthGrant = serde_json::from_str(&body)
            .map_err(|e| invalid_response("exchange_authorization_code", e))?;

        debug!(
            "Code exchange for {} succeeded (user present: {})",
            provider,
            grant.user.is_some()
        );
        Ok(grant)
    }

    async fn validate_token(&self, token: &str) -> DomusResult<bool> {
        let request = self
            .client
            .get(self.url("auth/validate"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(token));
        let response = self.send(request, "validate_token").await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            debug!("Token rejected by identity service ({})", status.as_u16());
            return Ok(false);
        }

        Err(handle_response_error(response, "validate_token").await)
    }

    async fn revoke_session(&self, token: &str) -> DomusResult<()> {
        let request = self
            .client
            .post(self.url("auth/logout"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(token))
            .json(&serde_json::json!({}));
        let response = self.send(request, "revoke_session").await?;

        if !response.status().is_success() {
            let error = handle_response_error(response, "revoke_session").await;
            warn!("Logout rejected by identity service: {}", error);
            return Err(error);
        }

        Ok(())
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> DomusResult<UserPatch> {
        let request = self
            .client
            .put(self.url("auth/profile"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(token))
            .json(update);
        let response = self.send(request, "update_profile").await?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "update_profile").await);
        }

        let body = self.read_body(response, "update_profile").await?;
        if body.trim().is_empty() {
            return Ok(UserPatch::default());
        }

        serde_json::from_str(&body).map_err(|e| invalid_response("update_profile", e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
