//! Session Types and Structures

use domus_core::{Role, User, UserPatch};
use std::fmt;
use tracing::warn;

/// An authenticated session: a bearer token and the user it belongs to
#[derive(Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn new(token: String, user: User) -> Self {
        Self { token, user }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Token with everything but the last four characters hidden
    pub fn masked_token(&self) -> String {
        mask_token(&self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.masked_token())
            .field("user", &self.user)
            .finish()
    }
}

pub(crate) fn mask_token(token: &str) -> String {
    let visible: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

/// Lifecycle state of the session
///
/// `Unknown` and `LoadingStored` are transient; the routing layer shows a
/// splash screen until one of the stable states is reached.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Before the stored session has been looked at
    #[default]
    Unknown,
    /// Reading and validating the stored session
    LoadingStored,
    /// No usable session
    Unauthenticated,
    /// Signed in
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SessionState::Unknown | SessionState::LoadingStored)
    }

    /// Short label for logs and status output
    pub fn label(&self) -> String {
        match self {
            SessionState::Unknown => "unknown".to_string(),
            SessionState::LoadingStored => "loading_stored".to_string(),
            SessionState::Unauthenticated => "unauthenticated".to_string(),
            SessionState::Authenticated(session) => {
                format!("authenticated(role={})", session.user.role)
            }
        }
    }
}

/// Merge a profile response into an existing user
///
/// Only fields present in the patch are applied. Identity fields (`id`,
/// `email`, `createdAt`) are immutable; differing values are ignored.
pub fn merge_user(current: &User, patch: UserPatch) -> User {
    let mut merged = current.clone();

    if let Some(id) = patch.id.filter(|id| id != &current.id) {
        warn!(
            current = %current.id,
            returned = %id,
            "Backend returned a different user id; ignoring"
        );
    }
    if let Some(email) = patch.email.filter(|email| email != &current.email) {
        warn!(
            user_id = %current.id,
            returned = %email,
            "Backend returned a different email; ignoring"
        );
    }
    if patch.created_at.is_some_and(|at| at != current.created_at) {
        warn!(user_id = %current.id, "Backend returned a different createdAt; ignoring");
    }

    if let Some(name) = patch.name {
        merged.name = name;
    }
    if let Some(role) = patch.role {
        merged.role = role;
    }
    if let Some(phone) = patch.phone {
        merged.phone = Some(phone);
    }
    if let Some(avatar) = patch.avatar {
        merged.avatar = Some(avatar);
    }

    merged
}
