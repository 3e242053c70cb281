//! Session Manager - Single source of truth for the signed-in user
//!
//! Every transition writes the persisted record first and the in-memory
//! state second, so a failed write never leaves memory ahead of storage.
//! At most one `sign_in`/`update_profile` runs at a time; a second one is
//! refused with [`AuthError::Busy`]. `sign_out` and `load_stored_session`
//! wait their turn instead. A profile update that arrives while a sign-out
//! holds the permit is refused with [`AuthError::NotAuthenticated`].

use super::storage::{TOKEN_KEY, USER_KEY};
use super::types::{merge_user, Session, SessionState};
use crate::oauth::AuthorizationOutcome;
use crate::profile::prepare_update;
use crate::routing::{route, Screen};
use crate::{AuthError, AuthResult};
use domus_core::{
    log_operation_error, log_operation_start, log_operation_success, performance, with_deadline,
    AuthProvider, DomusConfig, DomusError, IdentityBackend, OfflinePolicy, ProfileUpdate,
    SessionStore, User, UserPatch,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};

/// Runtime settings for a [`SessionManager`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Deadline applied to every backend call
    pub request_timeout: Duration,
    /// What to do with a cached session when validation cannot complete
    pub offline_policy: OfflinePolicy,
    /// Redirect URI sent along with authorization codes
    pub redirect_uri: String,
    /// Country calling code for national phone numbers
    pub default_country_code: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&DomusConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &DomusConfig) -> Self {
        Self {
            request_timeout: config.backend.timeout(),
            offline_policy: config.session.offline_policy,
            redirect_uri: config.oauth.redirect_uri(),
            default_country_code: config.session.default_country_code.clone(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_offline_policy(mut self, policy: OfflinePolicy) -> Self {
        self.offline_policy = policy;
        self
    }
}

/// Owns the session state and keeps it in step with the persisted record
pub struct SessionManager {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
    state: Arc<RwLock<SessionState>>,
    /// Single permit serializing every state transition
    operation_permit: Arc<Semaphore>,
    /// Set while `sign_out` holds the permit
    signing_out: Arc<AtomicBool>,
}

/// Clears the sign-out flag when the sign-out future finishes or is dropped
struct SignOutGuard(Arc<AtomicBool>);

impl SignOutGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for SignOutGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn storage_failure(error: DomusError) -> AuthError {
    error.log();
    AuthError::Storage {
        message: error.to_string(),
    }
}

fn exchange_failure(error: DomusError) -> AuthError {
    if error.is_unreachable() {
        return AuthError::Network {
            message: error.to_string(),
        };
    }
    match error {
        DomusError::Backend { message, .. } => AuthError::exchange_failed(message),
        _ => AuthError::exchange_failed("Failed to complete authentication"),
    }
}

fn update_failure(error: DomusError) -> AuthError {
    if error.is_unreachable() {
        return AuthError::Network {
            message: error.to_string(),
        };
    }
    match error {
        DomusError::Backend { message, .. } => AuthError::UpdateFailed {
            backend_message: message,
        },
        _ => AuthError::UpdateFailed {
            backend_message: "Failed to update profile".to_string(),
        },
    }
}

impl SessionManager {
    /// Create a manager; the state stays `Unknown` until
    /// [`load_stored_session`](Self::load_stored_session) runs
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<dyn SessionStore>,
        settings: SessionSettings,
    ) -> Self {
        debug!(backend = backend.name(), "Creating session manager");
        Self {
            backend,
            store,
            settings,
            state: Arc::new(RwLock::new(SessionState::Unknown)),
            operation_permit: Arc::new(Semaphore::new(1)),
            signing_out: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Current state snapshot
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.state.read().await.session().cloned()
    }

    /// Screen for the current state
    pub async fn current_screen(&self) -> Screen {
        route(&*self.state.read().await)
    }

    /// True while a sign-in or profile update is in flight
    pub fn is_busy(&self) -> bool {
        self.operation_permit.available_permits() == 0
    }

    /// Restore the persisted session and check it with the backend
    ///
    /// Never fails: anything unusable ends in `Unauthenticated` with the
    /// record cleared. When the backend cannot answer, the offline policy
    /// decides whether the cached session is kept.
    pub async fn load_stored_session(&self) -> Option<Session> {
        let _permit = self.operation_permit.acquire().await.ok();
        log_operation_start!("load_stored_session");
        self.set_state(SessionState::LoadingStored).await;

        let restored = performance::measure_async("load_stored_session", self.restore()).await;

        let next = match &restored {
            Some(session) => SessionState::Authenticated(session.clone()),
            None => SessionState::Unauthenticated,
        };
        log_operation_success!("load_stored_session", state = %next.label());
        self.set_state(next).await;
        restored
    }

    async fn restore(&self) -> Option<Session> {
        let values = match self.store.get_many(&[TOKEN_KEY, USER_KEY]).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Unreadable session record; clearing");
                self.clear_record_best_effort().await;
                return None;
            }
        };

        let mut values = values.into_iter();
        let token = values.next().flatten().filter(|t| !t.is_empty());
        let user_json = values.next().flatten();

        let (token, user_json) = match (token, user_json) {
            (Some(token), Some(user_json)) => (token, user_json),
            (None, None) => {
                debug!("No stored session");
                return None;
            }
            _ => {
                warn!("Torn session record (token and user out of step); clearing");
                self.clear_record_best_effort().await;
                return None;
            }
        };

        let user: User = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Corrupt stored user record; clearing");
                self.clear_record_best_effort().await;
                return None;
            }
        };
        let session = Session::new(token, user);

        let validation = with_deadline(
            self.backend.validate_token(&session.token),
            self.settings.request_timeout,
            "validate_token",
        )
        .await;

        match validation {
            Ok(true) => {
                info!(user_id = %session.user.id, "Stored session is valid");
                Some(session)
            }
            Ok(false) => {
                info!(user_id = %session.user.id, "Stored session was rejected; signing out");
                self.clear_record_best_effort().await;
                None
            }
            Err(e) => match self.settings.offline_policy {
                OfflinePolicy::Optimistic => {
                    warn!(error = %e, "Could not validate stored session; keeping cached session");
                    Some(session)
                }
                OfflinePolicy::Pessimistic => {
                    warn!(error = %e, "Could not validate stored session; signing out");
                    self.clear_record_best_effort().await;
                    None
                }
            },
        }
    }

    /// Exchange an authorization code and commit the resulting session
    pub async fn sign_in(
        &self,
        provider: AuthProvider,
        authorization_code: &str,
    ) -> AuthResult<Session> {
        let _permit = self
            .operation_permit
            .try_acquire()
            .map_err(|_| AuthError::Busy)?;

        if authorization_code.trim().is_empty() {
            return Err(AuthError::NoAuthorizationCode);
        }

        log_operation_start!("sign_in", provider = %provider);

        let grant = with_deadline(
            self.backend.exchange_authorization_code(
                provider,
                authorization_code,
                &self.settings.redirect_uri,
            ),
            self.settings.request_timeout,
            "exchange_authorization_code",
        )
        .await
        .map_err(|e| {
            log_operation_error!("sign_in", e, provider = %provider);
            exchange_failure(e)
        })?;

        let user = match grant.user {
            Some(user) if !grant.token.is_empty() => user,
            _ => {
                warn!(provider = %provider, "Code exchange returned an incomplete grant");
                return Err(AuthError::exchange_failed("Authentication failed"));
            }
        };

        let previous = self.current_session().await;
        let session = Session::new(grant.token, user);
        self.commit(session.clone()).await?;

        if let Some(previous) = previous.filter(|p| p.token != session.token) {
            self.revoke_best_effort(&previous.token).await;
        }

        log_operation_success!("sign_in", provider = %provider, user_id = %session.user.id);
        Ok(session)
    }

    /// Finish a provider round trip
    pub async fn sign_in_with_callback(
        &self,
        provider: AuthProvider,
        outcome: AuthorizationOutcome,
    ) -> AuthResult<Session> {
        match outcome {
            AuthorizationOutcome::Cancelled => {
                info!(provider = %provider, "Sign-in cancelled by user");
                Err(AuthError::Cancelled)
            }
            AuthorizationOutcome::Success { code: None } => Err(AuthError::NoAuthorizationCode),
            AuthorizationOutcome::Success { code: Some(code) } => {
                self.sign_in(provider, &code).await
            }
        }
    }

    /// Revoke the session on the backend, then clear it locally
    ///
    /// Revocation is best effort. The local session is cleared even if the
    /// backend call fails or times out; only a failure to clear storage is
    /// reported.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _permit = self.operation_permit.acquire().await.ok();
        let _signing_out = SignOutGuard::raise(&self.signing_out);
        log_operation_start!("sign_out");

        if let Some(session) = self.current_session().await {
            self.revoke_best_effort(&session.token).await;
        }

        let cleared = self.store.remove_many(&[TOKEN_KEY, USER_KEY]).await;
        self.set_state(SessionState::Unauthenticated).await;

        match cleared {
            Ok(()) => {
                log_operation_success!("sign_out");
                Ok(())
            }
            Err(e) => {
                log_operation_error!("sign_out", e);
                Err(storage_failure(e))
            }
        }
    }

    /// Send a profile update and merge the response into the local user
    pub async fn update_profile(&self, update: ProfileUpdate) -> AuthResult<User> {
        if self.signing_out.load(Ordering::SeqCst) || self.current_session().await.is_none() {
            return Err(AuthError::NotAuthenticated);
        }

        let _permit = self.operation_permit.try_acquire().map_err(|_| {
            if self.signing_out.load(Ordering::SeqCst) {
                AuthError::NotAuthenticated
            } else {
                AuthError::Busy
            }
        })?;

        // Re-read under the permit; a sign-out may have completed meanwhile
        let session = self
            .current_session()
            .await
            .ok_or(AuthError::NotAuthenticated)?;
        let update = prepare_update(update, &self.settings.default_country_code)?;

        log_operation_start!("update_profile", user_id = %session.user.id);

        let result = with_deadline(
            self.backend.update_profile(&session.token, &update),
            self.settings.request_timeout,
            "update_profile",
        )
        .await;

        let patch = match result {
            Ok(patch) => patch,
            Err(e) if e.is_unauthorized() => {
                warn!(
                    user_id = %session.user.id,
                    "Token rejected during profile update; signing out"
                );
                self.clear_record_best_effort().await;
                self.set_state(SessionState::Unauthenticated).await;
                return Err(AuthError::ValidationFailed);
            }
            Err(e) => {
                log_operation_error!("update_profile", e, user_id = %session.user.id);
                return Err(update_failure(e));
            }
        };

        // An empty response acknowledges the update as sent
        let patch = if patch == UserPatch::default() {
            UserPatch {
                name: update.name,
                role: update.role,
                phone: update.phone,
                ..Default::default()
            }
        } else {
            patch
        };

        let user = merge_user(&session.user, patch);
        self.commit(Session::new(session.token, user.clone())).await?;

        log_operation_success!("update_profile", user_id = %user.id, role = %user.role);
        Ok(user)
    }

    /// Shut the manager down; the persisted record is left in place
    pub async fn dispose(self) {
        let state = self.state.read().await.label();
        info!(state = %state, "Disposing session manager");
    }

    /// Persist a session, then publish it to memory
    async fn commit(&self, session: Session) -> AuthResult<()> {
        let user_json =
            serde_json::to_string(&session.user).map_err(|e| storage_failure(e.into()))?;

        self.store
            .set_many(&[(TOKEN_KEY, session.token.clone()), (USER_KEY, user_json)])
            .await
            .map_err(storage_failure)?;

        self.set_state(SessionState::Authenticated(session)).await;
        Ok(())
    }

    async fn revoke_best_effort(&self, token: &str) {
        let revoked = with_deadline(
            self.backend.revoke_session(token),
            self.settings.request_timeout,
            "revoke_session",
        )
        .await;
        if let Err(e) = revoked {
            warn!(error = %e, "Backend logout failed; clearing local session anyway");
        }
    }

    async fn clear_record_best_effort(&self) {
        if let Err(e) = self.store.remove_many(&[TOKEN_KEY, USER_KEY]).await {
            warn!(error = %e, "Failed to clear persisted session record");
        }
    }

    async fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().await;
        debug!(from = %state.label(), to = %next.label(), "Session state transition");
        *state = next;
    }
}
