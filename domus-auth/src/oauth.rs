//! OAuth provider helpers
//!
//! Builds the provider authorization URL and interprets the redirect the
//! provider sends back. The browser round trip itself happens elsewhere.

use domus_core::{validation_error, AuthProvider, DomusResult};
use std::borrow::Cow;
use tracing::debug;
use url::Url;

/// Authorization endpoint for a provider
pub fn authorize_endpoint(provider: AuthProvider) -> &'static str {
    match provider {
        AuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        AuthProvider::Facebook => "https://www.facebook.com/v12.0/dialog/oauth",
    }
}

/// Scopes requested from a provider
pub fn scopes(provider: AuthProvider) -> &'static str {
    match provider {
        AuthProvider::Google => "openid profile email",
        AuthProvider::Facebook => "public_profile,email",
    }
}

/// App redirect URI for a custom scheme, e.g. `domusapp://auth/callback`
pub fn redirect_uri(scheme: &str, path: &str) -> String {
    format!("{}://{}", scheme, path.trim_start_matches('/'))
}

/// Build the authorization-code URL the user is sent to
pub fn authorization_url(
    provider: AuthProvider,
    client_id: &str,
    redirect_uri: &str,
    state: Option<&str>,
) -> DomusResult<String> {
    if client_id.trim().is_empty() {
        return Err(validation_error!(
            format!("No OAuth client id configured for {}", provider),
            "client_id",
            "oauth"
        ));
    }

    let mut params = vec![
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", scopes(provider)),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }

    let url = Url::parse_with_params(authorize_endpoint(provider), &params)
        .map_err(|e| validation_error!(e.to_string(), "authorize_endpoint", "oauth"))?;

    debug!(provider = %provider, "Built authorization URL");
    Ok(url.into())
}

/// What the provider handed back after the browser round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The flow completed; the code may still be missing
    Success { code: Option<String> },
    /// The user backed out or the provider reported an error
    Cancelled,
}

impl AuthorizationOutcome {
    pub fn code(code: impl Into<String>) -> Self {
        AuthorizationOutcome::Success {
            code: Some(code.into()),
        }
    }

    /// Interpret a redirect such as `domusapp://auth/callback?code=...`
    ///
    /// Parameters are read from the query, falling back to the fragment.
    /// An `error` parameter wins over a `code`.
    pub fn from_callback_url(raw: &str) -> DomusResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| {
            validation_error!(format!("Invalid callback URL: {}", e), "callback_url", "oauth")
        })?;

        let mut pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = url.query_pairs().collect();
        if pairs.is_empty() {
            if let Some(fragment) = url.fragment() {
                pairs = url::form_urlencoded::parse(fragment.as_bytes()).collect();
            }
        }

        if pairs.iter().any(|(key, _)| *key == "error") {
            return Ok(AuthorizationOutcome::Cancelled);
        }

        let code = pairs
            .into_iter()
            .find(|(key, _)| *key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        Ok(AuthorizationOutcome::Success { code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_authorization_url() {
        let url = authorization_url(
            AuthProvider::Google,
            "google-client",
            "domusapp://auth/callback",
            None,
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        assert_eq!(parsed.path(), "/o/oauth2/v2/auth");

        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "google-client");
        assert_eq!(params["redirect_uri"], "domusapp://auth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid profile email");
        assert!(!params.contains_key("state"));
    }

    #[test]
    fn test_facebook_authorization_url_with_state() {
        let url = authorization_url(
            AuthProvider::Facebook,
            "fb-client",
            "domusapp://auth/callback",
            Some("xyz"),
        )
        .unwrap();

        assert!(url.starts_with("https://www.facebook.com/v12.0/dialog/oauth?"));
        assert!(url.contains("scope=public_profile%2Cemail"));
        assert!(url.contains("state=xyz"));
    }

    #[test]
    fn test_missing_client_id() {
        let result = authorization_url(AuthProvider::Google, "", "domusapp://auth/callback", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_redirect_uri() {
        assert_eq!(redirect_uri("domusapp", "/auth/callback"), "domusapp://auth/callback");
    }

    #[test]
    fn test_callback_parsing() {
        assert_eq!(
            AuthorizationOutcome::from_callback_url("domusapp://auth/callback?code=abc123")
                .unwrap(),
            AuthorizationOutcome::code("abc123")
        );
        assert_eq!(
            AuthorizationOutcome::from_callback_url(
                "domusapp://auth/callback?error=access_denied&code=abc"
            )
            .unwrap(),
            AuthorizationOutcome::Cancelled
        );
        assert_eq!(
            AuthorizationOutcome::from_callback_url("domusapp://auth/callback").unwrap(),
            AuthorizationOutcome::Success { code: None }
        );
        assert_eq!(
            AuthorizationOutcome::from_callback_url("domusapp://auth/callback?code=").unwrap(),
            AuthorizationOutcome::Success { code: None }
        );
        assert_eq!(
            AuthorizationOutcome::from_callback_url("domusapp://auth/callback#code=frag").unwrap(),
            AuthorizationOutcome::code("frag")
        );
        assert!(AuthorizationOutcome::from_callback_url("not a url").is_err());
    }
}
