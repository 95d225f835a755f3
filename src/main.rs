//! Secured Echo - JWT-protected echo service
//!
//! Usage:
//!   secured-echo --bind-addr 127.0.0.1:8080
//!
//! Environment:
//!   BIND_ADDR - Listen address (default: 0.0.0.0:8080)
//!   AUTH_DB_PATH - SQLite user database (default: secured_echo.db)
//!   JWT_SECRET - Signing secret, >= 32 bytes (default: random per process)
//!   TOKEN_TTL_MINUTES - Token lifetime (default: 15)
//!   TOKEN_LEEWAY_SECONDS - Expiry clock skew tolerance (default: 0)
//!   TOKEN_ISSUER - `iss` claim (default: secured-echo)
//!   BCRYPT_COST - Password hash work factor (default: bcrypt default)

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secured_echo::{
    auth::{clock::SystemClock, AuthState, KeyProvider, KeyStore, SqliteUserStore, UserStore},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate()?;

    info!("🚀 Secured Echo starting");

    // No key, no authenticated traffic: fail startup rather than serve unprotected
    let keys: Arc<dyn KeyProvider> = Arc::new(
        KeyStore::from_config(config.jwt_secret.as_deref())
            .context("Signing key unavailable")?,
    );
    if config.jwt_secret.is_none() {
        warn!("⚠️  JWT_SECRET not set: tokens are invalidated on restart and not shared across instances");
    }

    let user_store: Arc<dyn UserStore> = Arc::new(
        SqliteUserStore::open(&config.db_path)
            .with_context(|| format!("Failed to open user database at {}", config.db_path))?,
    );
    info!("🔐 User store initialized at: {}", config.db_path);

    let settings = config.token_settings()?;
    let state = AuthState::new(
        user_store,
        keys,
        &settings,
        config.bcrypt_cost,
        Arc::new(SystemClock),
    )?;
    info!(
        "🔐 Tokens: issuer={}, ttl={}m, leeway={}s",
        settings.issuer,
        settings.ttl.num_minutes(),
        settings.leeway.num_seconds()
    );

    let app = secured_echo::app(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secured_echo=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
