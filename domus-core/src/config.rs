//! Configuration management

use crate::error::{DomusError, DomusResult};
use crate::types::{
    BackendConfig, BackendKind, DomusConfig, OAuthConfig, OfflinePolicy, SessionConfig,
    StorageConfig,
};

use std::path::{Path, PathBuf};

/// Environment variables that override file configuration
pub const ENV_API_URL: &str = "DOMUS_API_URL";
pub const ENV_API_VERSION: &str = "DOMUS_API_VERSION";
pub const ENV_BACKEND: &str = "DOMUS_BACKEND";
pub const ENV_GOOGLE_CLIENT_ID: &str = "DOMUS_GOOGLE_CLIENT_ID";
pub const ENV_FACEBOOK_CLIENT_ID: &str = "DOMUS_FACEBOOK_CLIENT_ID";

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Http,
            api_url: "http://localhost:8080".to_string(),
            api_version: "v1".to_string(),
            timeout_seconds: 10,
            user_agent: format!("domus/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_scheme: "domusapp".to_string(),
            redirect_path: "/auth/callback".to_string(),
            google_client_id: String::new(),
            facebook_client_id: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_dir: "~/.domus/session".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            offline_policy: OfflinePolicy::Optimistic,
            default_country_code: "244".to_string(),
        }
    }
}

impl BackendConfig {
    /// Base URL all backend routes hang off (`{api_url}/api/{version}`)
    pub fn base_url(&self) -> String {
        format!(
            "{}/api/{}",
            self.api_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

impl OAuthConfig {
    /// Redirect URI registered with the providers (`domusapp://auth/callback`)
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}://{}",
            self.redirect_scheme,
            self.redirect_path.trim_start_matches('/')
        )
    }
}

impl StorageConfig {
    /// Session directory with a leading `~` expanded to the home directory
    pub fn session_dir_path(&self) -> PathBuf {
        expand_home(&self.session_dir)
    }
}

/// Expand a leading `~` using the current user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(path)
}

impl DomusConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DomusResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DomusError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: DomusConfig = toml::from_str(&content).map_err(|e| DomusError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a file, creating the parent directory
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DomusResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| DomusError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| DomusError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply `DOMUS_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> DomusResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> DomusResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.backend.api_url = url;
        }
        if let Some(version) = lookup(ENV_API_VERSION) {
            self.backend.api_version = version;
        }
        if let Some(kind) = lookup(ENV_BACKEND) {
            self.backend.kind = kind.parse().map_err(|e: String| DomusError::Config {
                message: e,
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("apply_env_overrides")
                    .with_suggestion("Set DOMUS_BACKEND to 'http' or 'fake'"),
            })?;
        }
        if let Some(id) = lookup(ENV_GOOGLE_CLIENT_ID) {
            self.oauth.google_client_id = id;
        }
        if let Some(id) = lookup(ENV_FACEBOOK_CLIENT_ID) {
            self.oauth.facebook_client_id = id;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> DomusResult<()> {
        if self.backend.timeout_seconds == 0 {
            return Err(DomusError::Config {
                message: "Backend timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set backend.timeout_seconds to a positive value"),
            });
        }

        if self.backend.kind == BackendKind::Http {
            if let Err(e) = url::Url::parse(&self.backend.base_url()) {
                return Err(DomusError::Config {
                    message: format!("Invalid backend api_url '{}': {}", self.backend.api_url, e),
                    source: Some(Box::new(e)),
                    context: crate::ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Set backend.api_url to an absolute http(s) URL"),
                });
            }
        }

        if self.oauth.redirect_scheme.is_empty() {
            return Err(DomusError::Config {
                message: "OAuth redirect_scheme must not be empty".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set oauth.redirect_scheme, e.g. 'domusapp'"),
            });
        }

        let code = &self.session.default_country_code;
        if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomusError::Config {
                message: format!("Invalid default_country_code '{}'", code),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use 1-3 digits without '+', e.g. '244'"),
            });
        }

        Ok(())
    }
}
