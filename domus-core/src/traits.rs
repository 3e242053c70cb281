//! Core trait definitions

use crate::error::DomusResult;
use crate::types::*;
use async_trait::async_trait;

/// Durable key-value storage for the persisted session record
///
/// Batched writes and removes must be visible as a unit to later reads in the
/// same process.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read several keys; missing keys yield `None` in the same position
    async fn get_many(&self, keys: &[&str]) -> DomusResult<Vec<Option<String>>>;

    /// Write several entries as one batch
    async fn set_many(&self, entries: &[(&str, String)]) -> DomusResult<()>;

    /// Remove several keys as one batch; missing keys are not an error
    async fn remove_many(&self, keys: &[&str]) -> DomusResult<()>;
}

/// Boundary contract to the identity authority
///
/// Implementations report conditions (such as a 401) upward and never touch
/// session state themselves.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Exchange an OAuth authorization code for a token and user record
    async fn exchange_authorization_code(
        &self,
        provider: AuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> DomusResult<AuthGrant>;

    /// Check a bearer token; an expired or unknown token is `Ok(false)`
    async fn validate_token(&self, token: &str) -> DomusResult<bool>;

    /// Revoke a session on the backend
    async fn revoke_session(&self, token: &str) -> DomusResult<()>;

    /// Send a partial profile update; the response may carry only changed fields
    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> DomusResult<UserPatch>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
