//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Marketplace role of a user
///
/// Tri-state on purpose: `Unset` is a real state (profile not completed yet),
/// not the absence of a value. On the wire it is `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Requests cleaning services
    Employer,
    /// Provides cleaning services
    Cleaner,
    /// Not chosen yet
    #[default]
    Unset,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employer => "employer",
            Role::Cleaner => "cleaner",
            Role::Unset => "unset",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Role::Unset)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "employer" => Ok(Role::Employer),
            "cleaner" => Ok(Role::Cleaner),
            "" | "unset" => Ok(Role::Unset),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Role::Unset => serializer.serialize_none(),
            role => serializer.serialize_str(role.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(Role::Unset),
            Some(value) => value.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// OAuth providers the backend can exchange authorization codes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Facebook,
}

impl AuthProvider {
    /// Path segment used by the backend (`/auth/oauth/{slug}`)
    pub fn slug(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Facebook => "facebook",
        }
    }

    pub fn all() -> [AuthProvider; 2] {
        [AuthProvider::Google, AuthProvider::Facebook]
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(AuthProvider::Google),
            "facebook" => Ok(AuthProvider::Facebook),
            _ => Err(format!("Unknown auth provider: {}", s)),
        }
    }
}

/// User record as issued by the identity backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend-assigned identifier, immutable
    pub id: String,
    /// Identity-provider email, immutable after creation
    pub email: String,
    /// Display name
    pub name: String,
    /// Marketplace role
    #[serde(default)]
    pub role: Role,
    /// Phone number in international format (`+244912345678`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First word of the display name, used for greetings
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn needs_profile_completion(&self) -> bool {
        !self.role.is_set()
    }
}

/// Partial user record returned by a profile update
///
/// Only the fields present in the response are applied to the local user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<User> for UserPatch {
    fn from(user: User) -> Self {
        Self {
            id: Some(user.id),
            email: Some(user.email),
            name: Some(user.name),
            role: Some(user.role),
            phone: user.phone,
            avatar: user.avatar,
            created_at: Some(user.created_at),
        }
    }
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.phone.is_none()
    }

    /// Structural checks that need no configuration
    ///
    /// Phone format is checked separately, since it depends on the default
    /// country code.
    pub fn validate(&self) -> crate::DomusResult<()> {
        if self.is_empty() {
            return Err(crate::validation_error!(
                "Profile update has no fields",
                "update",
                "profile_update"
            ));
        }
        if self.role == Some(Role::Unset) {
            return Err(crate::validation_error!(
                "Please select a role",
                "role",
                "profile_update"
            ));
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(crate::validation_error!(
                "Name must not be blank",
                "name",
                "profile_update"
            ));
        }
        Ok(())
    }
}

/// Result of exchanging an authorization code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGrant {
    /// Bearer token for subsequent calls
    pub token: String,
    /// User record, when the backend returned one
    #[serde(default)]
    pub user: Option<User>,
}

/// Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomusConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Which identity backend implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote identity service over HTTP
    Http,
    /// In-process deterministic stub
    Fake,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(BackendKind::Http),
            "fake" | "mock" => Ok(BackendKind::Fake),
            _ => Err(format!("Unknown backend kind: {}", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Http => f.write_str("http"),
            BackendKind::Fake => f.write_str("fake"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Server root, without the `/api/{version}` suffix
    pub api_url: String,
    pub api_version: String,
    /// Deadline applied to every backend call
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Custom URL scheme registered by the app
    pub redirect_scheme: String,
    pub redirect_path: String,
    pub google_client_id: String,
    pub facebook_client_id: String,
}

impl OAuthConfig {
    pub fn client_id(&self, provider: AuthProvider) -> &str {
        match provider {
            AuthProvider::Google => &self.google_client_id,
            AuthProvider::Facebook => &self.facebook_client_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted session record (`~` is expanded)
    pub session_dir: String,
}

/// What to do with a cached session when startup validation cannot reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflinePolicy {
    /// Keep the cached session until the backend says otherwise
    #[default]
    Optimistic,
    /// Log out and clear the cached session
    Pessimistic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub offline_policy: OfflinePolicy,
    /// Country calling code applied to national phone numbers
    pub default_country_code: String,
}
