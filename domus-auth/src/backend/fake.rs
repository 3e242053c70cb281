//! Deterministic in-process identity backend
//!
//! Issues JWT-shaped tokens (`base64(header).base64(payload).signature`) for
//! two seeded demo accounts. Failures and latency are injected by the caller,
//! never drawn at random.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{TimeZone, Utc};
use domus_core::{
    AuthGrant, AuthProvider, DomusError, DomusResult, IdentityBackend, ProfileUpdate, Role, User,
    UserPatch,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SIGNATURE_SECRET: &str = "mock_signature";
const COMPONENT: &str = "fake_backend";

/// A failure the fake backend reports instead of answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    /// No answer at all, as if the device were offline
    Network,
    /// A non-success status with a `{"message"}` body
    Status { status: u16, message: String },
}

impl FakeFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        FakeFailure::Status {
            status,
            message: message.into(),
        }
    }

    fn to_error(&self, operation: &str) -> DomusError {
        match self {
            FakeFailure::Network => DomusError::network(
                format!("Simulated network error during {}", operation),
                COMPONENT,
            ),
            FakeFailure::Status { status, message } => {
                DomusError::backend(*status, message.clone(), COMPONENT)
            }
        }
    }
}

/// How `validate_token` answers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationBehavior {
    /// Check signature, expiry and revocation
    #[default]
    Verify,
    /// Every token is valid
    AcceptAll,
    /// Every token is invalid
    RejectAll,
    /// The call itself fails
    Fail(FakeFailure),
}

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub exchange: usize,
    pub validate: usize,
    pub revoke: usize,
    pub update: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    email: String,
    /// Expiry in milliseconds since the epoch
    exp: i64,
    /// Issue sequence number, keeps tokens distinct
    jti: u64,
}

struct FakeState {
    accounts: HashMap<AuthProvider, String>,
    users: HashMap<String, User>,
    revoked: HashSet<String>,
    next_token_id: u64,
    token_ttl: chrono::Duration,
    latency: Duration,
    exchange_failure: Option<FakeFailure>,
    revoke_failure: Option<FakeFailure>,
    update_failure: Option<FakeFailure>,
    validation: ValidationBehavior,
    grant_without_user: bool,
    partial_responses: bool,
}

/// Deterministic identity backend for tests and offline runs
pub struct FakeBackend {
    state: Mutex<FakeState>,
    exchange_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_user(id: &str, email: &str, name: &str, avatar_seed: &str) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        role: Role::Unset,
        phone: None,
        avatar: Some(format!("https://i.pravatar.cc/150?u={}", avatar_seed)),
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    }
}

impl FakeBackend {
    /// Create a backend seeded with the two demo accounts
    pub fn new() -> Self {
        let google = seed_user("google_123", "joao@gmail.com", "João Silva", "joao");
        let facebook = seed_user("facebook_456", "maria@outlook.com", "Maria Santos", "maria");

        let accounts = HashMap::from([
            (AuthProvider::Google, google.id.clone()),
            (AuthProvider::Facebook, facebook.id.clone()),
        ]);
        let users = HashMap::from([
            (google.id.clone(), google),
            (facebook.id.clone(), facebook),
        ]);

        Self {
            state: Mutex::new(FakeState {
                accounts,
                users,
                revoked: HashSet::new(),
                next_token_id: 1,
                token_ttl: chrono::Duration::hours(24),
                latency: Duration::ZERO,
                exchange_failure: None,
                revoke_failure: None,
                update_failure: None,
                validation: ValidationBehavior::default(),
                grant_without_user: false,
                partial_responses: false,
            }),
            exchange_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.state.get_mut().latency = latency;
        self
    }

    /// Replace the account a provider signs in as
    pub fn with_account(mut self, provider: AuthProvider, user: User) -> Self {
        let state = self.state.get_mut();
        state.accounts.insert(provider, user.id.clone());
        state.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.state.get_mut().token_ttl = ttl;
        self
    }

    pub fn with_exchange_failure(mut self, failure: FakeFailure) -> Self {
        self.state.get_mut().exchange_failure = Some(failure);
        self
    }

    pub fn with_validation(mut self, behavior: ValidationBehavior) -> Self {
        self.state.get_mut().validation = behavior;
        self
    }

    pub fn with_revoke_failure(mut self, failure: FakeFailure) -> Self {
        self.state.get_mut().revoke_failure = Some(failure);
        self
    }

    pub fn with_update_failure(mut self, failure: FakeFailure) -> Self {
        self.state.get_mut().update_failure = Some(failure);
        self
    }

    /// Grants carry a token but no user record
    pub fn with_grant_without_user(mut self) -> Self {
        self.state.get_mut().grant_without_user = true;
        self
    }

    /// Profile responses carry only the fields that were sent
    pub fn with_partial_responses(mut self) -> Self {
        self.state.get_mut().partial_responses = true;
        self
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    pub async fn set_exchange_failure(&self, failure: Option<FakeFailure>) {
        self.state.lock().await.exchange_failure = failure;
    }

    pub async fn set_validation(&self, behavior: ValidationBehavior) {
        self.state.lock().await.validation = behavior;
    }

    pub async fn set_revoke_failure(&self, failure: Option<FakeFailure>) {
        self.state.lock().await.revoke_failure = failure;
    }

    pub async fn set_update_failure(&self, failure: Option<FakeFailure>) {
        self.state.lock().await.update_failure = failure;
    }

    /// Snapshot of the calls received so far
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            exchange: self.exchange_calls.load(Ordering::SeqCst),
            validate: self.validate_calls.load(Ordering::SeqCst),
            revoke: self.revoke_calls.load(Ordering::SeqCst),
            update: self.update_calls.load(Ordering::SeqCst),
        }
    }

    pub async fn is_revoked(&self, token: &str) -> bool {
        self.state.lock().await.revoked.contains(token)
    }

    /// Backend-side copy of a user, reflecting profile updates
    pub async fn user(&self, user_id: &str) -> Option<User> {
        self.state.lock().await.users.get(user_id).cloned()
    }

    /// Issue a token for a known user with a custom lifetime
    ///
    /// A negative lifetime yields an already expired token.
    pub async fn issue_token(&self, user_id: &str, ttl: chrono::Duration) -> DomusResult<String> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| {
                DomusError::backend(404, format!("Unknown user {}", user_id), COMPONENT)
            })?;
        Self::mint(&mut state, &user, ttl)
    }

    fn mint(state: &mut FakeState, user: &User, ttl: chrono::Duration) -> DomusResult<String> {
        let claims = TokenClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: (Utc::now() + ttl).timestamp_millis(),
            jti: state.next_token_id,
        };
        state.next_token_id += 1;

        let header = BASE64.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = BASE64.encode(serde_json::to_vec(&claims)?);
        let signature = BASE64.encode(SIGNATURE_SECRET);
        Ok(format!("{}.{}.{}", header, payload, signature))
    }

    /// Claims of a well-formed, correctly signed token
    fn decode(token: &str) -> Option<TokenClaims> {
        let mut parts = token.split('.');
        let (_header, payload, signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || signature != BASE64.encode(SIGNATURE_SECRET) {
            return None;
        }
        let bytes = BASE64.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn verify(state: &FakeState, token: &str) -> Option<TokenClaims> {
        let claims = Self::decode(token)?;
        if claims.exp <= Utc::now().timestamp_millis() || state.revoked.contains(token) {
            return None;
        }
        Some(claims)
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().await.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl IdentityBackend for FakeBackend {
    async fn exchange_authorization_code(
        &self,
        provider: AuthProvider,
        code: &str,
        _redirect_uri: &str,
    ) -> DomusResult<AuthGrant> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        if let Some(failure) = &state.exchange_failure {
            debug!(provider = %provider, "Simulated code exchange failure");
            return Err(failure.to_error("exchange_authorization_code"));
        }
        if code.trim().is_empty() {
            return Err(DomusError::backend(400, "Missing authorization code", COMPONENT));
        }

        let user = state
            .accounts
            .get(&provider)
            .and_then(|id| state.users.get(id))
            .cloned()
            .ok_or_else(|| {
                DomusError::backend(404, format!("No demo account for {}", provider), COMPONENT)
            })?;

        let ttl = state.token_ttl;
        let token = Self::mint(&mut state, &user, ttl)?;
        info!(provider = %provider, user_id = %user.id, "Simulated sign-in");

        Ok(AuthGrant {
            token,
            user: (!state.grant_without_user).then_some(user),
        })
    }

    async fn validate_token(&self, token: &str) -> DomusResult<bool> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let state = self.state.lock().await;
        let valid = match &state.validation {
            ValidationBehavior::Verify => Self::verify(&state, token).is_some(),
            ValidationBehavior::AcceptAll => true,
            ValidationBehavior::RejectAll => false,
            ValidationBehavior::Fail(failure) => return Err(failure.to_error("validate_token")),
        };

        debug!(valid, "Simulated token validation");
        Ok(valid)
    }

    async fn revoke_session(&self, token: &str) -> DomusResult<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        if let Some(failure) = &state.revoke_failure {
            return Err(failure.to_error("revoke_session"));
        }

        state.revoked.insert(token.to_string());
        debug!("Simulated logout");
        Ok(())
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> DomusResult<UserPatch> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        if let Some(failure) = &state.update_failure {
            return Err(failure.to_error("update_profile"));
        }

        let claims = Self::verify(&state, token)
            .ok_or_else(|| DomusError::backend(401, "Invalid or expired token", COMPONENT))?;
        let partial = state.partial_responses;
        let user = state
            .users
            .get_mut(&claims.sub)
            .ok_or_else(|| DomusError::backend(404, "User not found", COMPONENT))?;

        if let Some(name) = &update.name {
            user.name = name.clone();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }

        debug!(user_id = %user.id, partial, "Simulated profile update");

        if partial {
            Ok(UserPatch {
                name: update.name.clone(),
                role: update.role,
                phone: update.phone.clone(),
                ..Default::default()
            })
        } else {
            Ok(UserPatch::from(user.clone()))
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
