//! Integration tests for domus-core infrastructure

use domus_core::{
    config_error, init_logging, storage_error, validation_error, with_deadline, with_timeout,
    AuthProvider, BackendKind, DomusConfig, DomusError, ErrorContext, LoggingConfig,
    OfflinePolicy, ProfileUpdate, Role, User, UserPatch,
};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_error_handling() {
    let error = storage_error!("Disk full", "test_component");

    match &error {
        DomusError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "Disk full");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Logging an error must not panic without a subscriber
    error.log();

    let network_error = DomusError::Network {
        message: "Connection refused".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network_error.is_recoverable());
    assert!(network_error.is_unreachable());
    assert!(!network_error.is_unauthorized());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());

    let validation = validation_error!("Too short", "phone", "test");
    match validation {
        DomusError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("phone")),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_backend_error_classification() {
    let unauthorized = DomusError::backend(401, "Token expired", "test");
    assert!(unauthorized.is_unauthorized());
    assert!(!unauthorized.is_recoverable());
    assert_eq!(unauthorized.backend_message(), Some("Token expired"));

    let forbidden = DomusError::backend(403, "Forbidden", "test");
    assert!(forbidden.is_unauthorized());

    let server = DomusError::backend(503, "Maintenance", "test");
    assert!(server.is_recoverable());
    assert!(!server.is_unreachable());
    assert_eq!(
        server.context().and_then(|c| c.metadata.get("status")).map(String::as_str),
        Some("503")
    );
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: domus_core::LogFormat::Compact,
        include_location: false,
        include_thread: false,
        log_to_file: false,
        log_file_path: None,
        enable_performance_monitoring: false,
        filter_directives: vec!["domus_core=debug".to_string()],
    };

    // A global subscriber can only be installed once per process, so the
    // second call must report an error instead of panicking.
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_logging_to_file_requires_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };
    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        "Success"
    };

    let result = with_timeout(quick_operation, Duration::from_millis(500), "quick_test").await;
    assert_eq!(assert_ok!(result), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(500)).await;
        "Should not reach here"
    };

    let result = with_timeout(slow_operation, Duration::from_millis(20), "slow_test").await;
    match assert_err!(result) {
        DomusError::Timeout {
            operation,
            duration_ms,
            ..
        } => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 20);
        }
        other => panic!("Expected Timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadline_flattens_inner_errors() {
    let failing = async { Err::<(), _>(DomusError::backend(500, "boom", "test")) };
    let result = with_deadline(failing, Duration::from_secs(1), "inner").await;
    assert!(matches!(result, Err(DomusError::Backend { status: 500, .. })));
}

#[test]
fn test_default_config_is_valid() {
    let config = DomusConfig::default();
    assert_ok!(config.validate());
    assert_eq!(config.backend.kind, BackendKind::Http);
    assert_eq!(config.backend.timeout_seconds, 10);
    assert_eq!(config.backend.base_url(), "http://localhost:8080/api/v1");
    assert_eq!(config.oauth.redirect_uri(), "domusapp://auth/callback");
    assert_eq!(config.session.offline_policy, OfflinePolicy::Optimistic);
    assert_eq!(config.session.default_country_code, "244");
}

#[test]
fn test_config_validation_failures() {
    let mut config = DomusConfig::default();
    config.backend.timeout_seconds = 0;
    assert!(matches!(config.validate(), Err(DomusError::Config { .. })));

    let mut config = DomusConfig::default();
    config.backend.api_url = "not a url".to_string();
    assert!(config.validate().is_err());

    // The fake backend never talks to the network, so the URL is irrelevant
    config.backend.kind = BackendKind::Fake;
    assert_ok!(config.validate());

    let mut config = DomusConfig::default();
    config.session.default_country_code = "+244".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = DomusConfig::default();
    config.backend.kind = BackendKind::Fake;
    config.session.offline_policy = OfflinePolicy::Pessimistic;
    config.oauth.google_client_id = "google-client".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = DomusConfig::from_file(&path).unwrap();
    assert_eq!(loaded.backend.kind, BackendKind::Fake);
    assert_eq!(loaded.session.offline_policy, OfflinePolicy::Pessimistic);
    assert_eq!(loaded.oauth.client_id(AuthProvider::Google), "google-client");
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("domus.toml");
    std::fs::write(
        &path,
        "[session]\noffline_policy = \"pessimistic\"\ndefault_country_code = \"351\"\n",
    )
    .unwrap();

    let config = DomusConfig::from_file(&path).unwrap();
    assert_eq!(config.session.offline_policy, OfflinePolicy::Pessimistic);
    assert_eq!(config.session.default_country_code, "351");
    assert_eq!(config.backend.api_version, "v1");
}

#[test]
fn test_single_key_sections_keep_remaining_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("domus.toml");
    std::fs::write(
        &path,
        concat!(
            "[backend]\napi_url = \"https://api.domus.ao\"\n\n",
            "[session]\noffline_policy = \"pessimistic\"\n",
        ),
    )
    .unwrap();

    let config = DomusConfig::from_file(&path).unwrap();
    assert_eq!(config.backend.api_url, "https://api.domus.ao");
    assert_eq!(config.backend.kind, BackendKind::Http);
    assert_eq!(config.backend.timeout_seconds, 10);
    assert_eq!(config.backend.base_url(), "https://api.domus.ao/api/v1");
    assert_eq!(config.session.offline_policy, OfflinePolicy::Pessimistic);
    assert_eq!(config.session.default_country_code, "244");
    assert_eq!(config.oauth.redirect_uri(), "domusapp://auth/callback");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_file_errors() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");
    assert!(matches!(
        DomusConfig::from_file(&missing),
        Err(DomusError::Config { .. })
    ));

    let broken = temp_dir.path().join("broken.toml");
    std::fs::write(&broken, "[backend\nkind = ").unwrap();
    assert!(DomusConfig::from_file(&broken).is_err());
}

#[test]
fn test_env_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DOMUS_API_URL", "https://api.domus.ao"),
        ("DOMUS_API_VERSION", "v2"),
        ("DOMUS_BACKEND", "mock"),
        ("DOMUS_FACEBOOK_CLIENT_ID", "fb-123"),
    ]);

    let mut config = DomusConfig::default();
    config
        .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.backend.base_url(), "https://api.domus.ao/api/v2");
    assert_eq!(config.backend.kind, BackendKind::Fake);
    assert_eq!(config.oauth.client_id(AuthProvider::Facebook), "fb-123");
    assert_eq!(config.oauth.client_id(AuthProvider::Google), "");

    let mut config = DomusConfig::default();
    let result = config.apply_overrides_from(|key| {
        (key == "DOMUS_BACKEND").then(|| "grpc".to_string())
    });
    assert!(result.is_err());
}

#[test]
fn test_role_wire_format() {
    let user: User = serde_json::from_str(
        r#"{
            "id": "google_123",
            "email": "joao@gmail.com",
            "name": "João Silva",
            "role": null,
            "avatar": "https://i.pravatar.cc/150?u=joao",
            "isEmailVerified": true,
            "createdAt": "2025-01-10T09:30:00Z"
        }"#,
    )
    .unwrap();
    assert_eq!(user.role, Role::Unset);
    assert!(user.needs_profile_completion());
    assert_eq!(user.first_name(), "João");

    let json = serde_json::to_value(&user).unwrap();
    assert!(json["role"].is_null());
    assert_eq!(json["createdAt"], "2025-01-10T09:30:00Z");
    assert!(json.get("phone").is_none());

    let cleaner: User = serde_json::from_value(serde_json::json!({
        "id": "1",
        "email": "a@b.c",
        "name": "Ana",
        "role": "cleaner",
        "createdAt": "2025-01-10T09:30:00Z"
    }))
    .unwrap();
    assert_eq!(cleaner.role, Role::Cleaner);

    let missing_role: User = serde_json::from_value(serde_json::json!({
        "id": "1",
        "email": "a@b.c",
        "name": "Ana",
        "createdAt": "2025-01-10T09:30:00Z"
    }))
    .unwrap();
    assert_eq!(missing_role.role, Role::Unset);

    let bad: Result<User, _> = serde_json::from_value(serde_json::json!({
        "id": "1",
        "email": "a@b.c",
        "name": "Ana",
        "role": "admin",
        "createdAt": "2025-01-10T09:30:00Z"
    }));
    assert!(bad.is_err());
}

#[test]
fn test_patch_and_update_wire_format() {
    let patch: UserPatch =
        serde_json::from_str(r#"{"role":"employer","phone":"+244923000000"}"#).unwrap();
    assert_eq!(patch.role, Some(Role::Employer));
    assert_eq!(patch.phone.as_deref(), Some("+244923000000"));
    assert!(patch.name.is_none());

    // A null role in a patch means "not part of the response"
    let patch: UserPatch = serde_json::from_str(r#"{"role":null}"#).unwrap();
    assert!(patch.role.is_none());

    let update = ProfileUpdate::new()
        .with_role(Role::Cleaner)
        .with_phone("+244912345678");
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"role": "cleaner", "phone": "+244912345678"})
    );
    assert!(ProfileUpdate::new().is_empty());
}

#[test]
fn test_provider_parsing() {
    assert_eq!("Google".parse::<AuthProvider>().unwrap(), AuthProvider::Google);
    assert_eq!(AuthProvider::Facebook.to_string(), "facebook");
    assert!("github".parse::<AuthProvider>().is_err());
}
