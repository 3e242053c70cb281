//! Shared fixtures for session integration tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use domus_auth::session::{TOKEN_KEY, USER_KEY};
use domus_auth::{FakeBackend, MemorySessionStore, SessionManager, SessionSettings};
use domus_core::{DomusResult, OfflinePolicy, Role, SessionStore, User};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

// Install the subscriber once per test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Manager wired to a fake backend and an in-memory store
pub struct TestSession {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemorySessionStore>,
    pub manager: SessionManager,
}

impl TestSession {
    /// Current persisted (token, user JSON) pair
    pub async fn record(&self) -> (Option<String>, Option<String>) {
        read_record(self.store.as_ref()).await
    }

    pub async fn stored_user(&self) -> Option<User> {
        self.record()
            .await
            .1
            .and_then(|json| serde_json::from_str(&json).ok())
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings::default().with_request_timeout(Duration::from_millis(200))
}

pub fn spawn_session(backend: FakeBackend) -> TestSession {
    spawn_session_with(backend, MemorySessionStore::new(), test_settings())
}

pub fn spawn_session_with(
    backend: FakeBackend,
    store: MemorySessionStore,
    settings: SessionSettings,
) -> TestSession {
    LazyLock::force(&TRACING);

    let backend = Arc::new(backend);
    let store = Arc::new(store);
    let manager = SessionManager::new(backend.clone(), store.clone(), settings);

    TestSession {
        backend,
        store,
        manager,
    }
}

/// Store pre-populated as if a previous run had signed in
pub fn store_with_record(token: &str, user: &User) -> MemorySessionStore {
    MemorySessionStore::with_entries([
        (TOKEN_KEY.to_string(), token.to_string()),
        (
            USER_KEY.to_string(),
            serde_json::to_string(user).expect("user serializes"),
        ),
    ])
}

pub fn sample_user(role: Role) -> User {
    User {
        id: "google_123".to_string(),
        email: "joao@gmail.com".to_string(),
        name: "João Silva".to_string(),
        role,
        phone: None,
        avatar: None,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn settings_with_policy(policy: OfflinePolicy) -> SessionSettings {
    test_settings().with_offline_policy(policy)
}

pub async fn read_record(store: &dyn SessionStore) -> (Option<String>, Option<String>) {
    let mut values = store
        .get_many(&[TOKEN_KEY, USER_KEY])
        .await
        .expect("store readable")
        .into_iter();
    (values.next().flatten(), values.next().flatten())
}

/// Store whose writes always fail
pub struct BrokenStore;

#[async_trait::async_trait]
impl SessionStore for BrokenStore {
    async fn get_many(&self, keys: &[&str]) -> DomusResult<Vec<Option<String>>> {
        Ok(vec![None; keys.len()])
    }

    async fn set_many(&self, _entries: &[(&str, String)]) -> DomusResult<()> {
        Err(domus_core::storage_error!("Disk full", "broken_store"))
    }

    async fn remove_many(&self, _keys: &[&str]) -> DomusResult<()> {
        Err(domus_core::storage_error!("Disk full", "broken_store"))
    }
}
