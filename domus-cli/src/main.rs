//! Domus CLI - Command-line driver for the session lifecycle
//!
//! Signs in, completes the profile, signs out and reports which screen the
//! app would show, using the same session manager as the mobile client.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use domus_auth::oauth;
use domus_auth::{
    AuthError, AuthorizationOutcome, BackendFactory, FileSessionStore, Session, SessionManager,
    SessionSettings,
};
use domus_core::{
    init_logging, log_operation_start, log_operation_success, AuthProvider, BackendKind,
    DomusConfig, LoggingConfig, ProfileUpdate, Role,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "domus")]
#[command(about = "Session lifecycle for the Domus cleaning marketplace")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Identity backend to use (http or fake), overrides the config file
    #[arg(long, global = true)]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the stored session and show where the app would go
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the provider authorization URL to open in a browser
    LoginUrl {
        /// OAuth provider (google or facebook)
        #[arg(short, long)]
        provider: AuthProvider,

        /// Opaque state echoed back by the provider
        #[arg(long)]
        state: Option<String>,
    },

    /// Sign in with an authorization code or the provider callback URL
    Login {
        /// OAuth provider (google or facebook)
        #[arg(short, long)]
        provider: AuthProvider,

        /// Authorization code returned by the provider
        #[arg(long, conflicts_with = "callback_url", required_unless_present = "callback_url")]
        code: Option<String>,

        /// Full redirect URL, e.g. domusapp://auth/callback?code=...
        #[arg(long)]
        callback_url: Option<String>,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Complete or update the profile
    Profile {
        /// Marketplace role (employer or cleaner)
        #[arg(long)]
        role: Option<Role>,

        /// Phone number; national numbers get the default country code
        #[arg(long)]
        phone: Option<String>,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging_config).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Domus CLI v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_ref())?;
    config.apply_env_overrides()?;
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }

    match cli.command {
        Commands::Status { json } => handle_status(&config, json).await,
        Commands::LoginUrl { provider, state } => handle_login_url(&config, provider, state),
        Commands::Login {
            provider,
            code,
            callback_url,
        } => handle_login(&config, provider, code, callback_url).await,
        Commands::Logout => handle_logout(&config).await,
        Commands::Profile { role, phone, name } => {
            handle_profile(&config, role, phone, name).await
        }
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(cli.config.as_ref(), &config, show, init, validate),
    }
}

fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<DomusConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return Ok(DomusConfig::from_file(path)?);
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("domus").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".domus").join("config.toml")),
        Some(PathBuf::from("domus.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return Ok(DomusConfig::from_file(path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(DomusConfig::default())
}

/// Default location written by `config --init`
fn default_config_path() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|d| d.join("domus").join("config.toml"))
        .context("Could not determine a configuration directory")
}

/// Wire a session manager from configuration and restore the stored session
async fn open_session(config: &DomusConfig) -> anyhow::Result<SessionManager> {
    config.validate()?;

    let backend = BackendFactory::create(&config.backend)?;
    let store = Arc::new(FileSessionStore::new(config.storage.session_dir_path())?);
    let manager = SessionManager::new(backend, store, SessionSettings::from_config(config));

    manager.load_stored_session().await;
    Ok(manager)
}

fn report(error: AuthError) -> anyhow::Error {
    eprintln!("❌ {}", error.user_message());
    anyhow::Error::new(error)
}

fn print_session(session: &Session) {
    let user = &session.user;
    println!("👤 {} <{}>", user.name, user.email);
    println!("   id:    {}", user.id);
    println!("   role:  {}", user.role);
    if let Some(phone) = &user.phone {
        println!("   phone: {}", phone);
    }
    println!("   token: {}", session.masked_token());
}

async fn print_next_screen(manager: &SessionManager) {
    let screen = manager.current_screen().await;
    println!("➡️  Next screen: {} ({})", screen, screen.path());
}

async fn handle_status(config: &DomusConfig, json: bool) -> anyhow::Result<()> {
    let manager = open_session(config).await?;
    let state = manager.state().await;

    if json {
        let screen = manager.current_screen().await;
        let output = serde_json::json!({
            "state": state.label(),
            "screen": screen.to_string(),
            "path": screen.path(),
            "user": state.session().map(|s| &s.user),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match state.session() {
            Some(session) => print_session(session),
            None => println!("🔒 Not signed in"),
        }
        print_next_screen(&manager).await;
    }

    manager.dispose().await;
    Ok(())
}

fn handle_login_url(
    config: &DomusConfig,
    provider: AuthProvider,
    state: Option<String>,
) -> anyhow::Result<()> {
    let url = oauth::authorization_url(
        provider,
        config.oauth.client_id(provider),
        &config.oauth.redirect_uri(),
        state.as_deref(),
    )?;

    println!("🔗 Open this URL to sign in with {}:", provider);
    println!("{}", url);
    println!();
    println!("Then run: domus login --provider {} --callback-url '<redirect url>'", provider);
    Ok(())
}

async fn handle_login(
    config: &DomusConfig,
    provider: AuthProvider,
    code: Option<String>,
    callback_url: Option<String>,
) -> anyhow::Result<()> {
    log_operation_start!("cli_login", provider = %provider);
    let manager = open_session(config).await?;

    let session = match (code, callback_url) {
        (Some(code), _) => manager.sign_in(provider, &code).await,
        (None, Some(url)) => {
            let outcome = AuthorizationOutcome::from_callback_url(&url)?;
            manager.sign_in_with_callback(provider, outcome).await
        }
        (None, None) => Err(AuthError::NoAuthorizationCode),
    }
    .map_err(report)?;

    println!("✅ Signed in with {}", provider);
    print_session(&session);
    print_next_screen(&manager).await;

    manager.dispose().await;
    log_operation_success!("cli_login", provider = %provider);
    Ok(())
}

async fn handle_logout(config: &DomusConfig) -> anyhow::Result<()> {
    let manager = open_session(config).await?;
    let was_signed_in = manager.current_session().await.is_some();

    manager.sign_out().await.map_err(report)?;

    if was_signed_in {
        println!("👋 Signed out");
    } else {
        println!("🔒 No active session");
    }
    print_next_screen(&manager).await;

    manager.dispose().await;
    Ok(())
}

async fn handle_profile(
    config: &DomusConfig,
    role: Option<Role>,
    phone: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let manager = open_session(config).await?;

    let update = ProfileUpdate { name, role, phone };
    let user = manager.update_profile(update).await.map_err(report)?;

    println!("✅ Profile updated for {}", user.first_name());
    if let Some(session) = manager.current_session().await {
        print_session(&session);
    }
    print_next_screen(&manager).await;

    manager.dispose().await;
    Ok(())
}

fn handle_config(
    config_path: Option<&PathBuf>,
    config: &DomusConfig,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        let path = match config_path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        if path.exists() {
            println!("⚠️  Configuration already exists at: {:?}", path);
        } else {
            DomusConfig::default().save_to_file(&path)?;
            println!("✅ Configuration initialized at: {:?}", path);
            println!("📝 Edit the file to add your OAuth client ids and backend URL.");
        }
    }

    if show {
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    if !(init || show || validate) {
        println!("Nothing to do. Use --show, --init or --validate.");
    }

    Ok(())
}
