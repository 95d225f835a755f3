//! Runtime configuration, from flags or environment (`.env` supported).

use crate::auth::jwt::{TokenSettings, DEFAULT_ISSUER, DEFAULT_TTL_MINUTES};
use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::Parser;
use std::net::SocketAddr;

/// Longest accepted token lifetime (30 days)
pub const MAX_TTL_MINUTES: i64 = 30 * 24 * 60;
/// Largest accepted expiry skew (1 hour)
pub const MAX_LEEWAY_SECONDS: i64 = 60 * 60;

#[derive(Parser, Debug, Clone)]
#[command(name = "secured-echo")]
#[command(about = "Echo service with JWT-protected endpoints")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// SQLite database holding user accounts
    #[arg(long, env = "AUTH_DB_PATH", default_value = "secured_echo.db")]
    pub db_path: String,

    /// HMAC signing secret (at least 32 bytes). A random key is generated per process when unset.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in minutes
    #[arg(long, env = "TOKEN_TTL_MINUTES", default_value_t = DEFAULT_TTL_MINUTES)]
    pub token_ttl_minutes: i64,

    /// Clock skew tolerance applied to token expiry, in seconds
    #[arg(long, env = "TOKEN_LEEWAY_SECONDS", default_value_t = 0)]
    pub token_leeway_seconds: i64,

    /// `iss` claim written into and required from tokens
    #[arg(long, env = "TOKEN_ISSUER", default_value = DEFAULT_ISSUER)]
    pub token_issuer: String,

    /// bcrypt work factor for password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TTL_MINUTES).contains(&self.token_ttl_minutes) {
            bail!("TOKEN_TTL_MINUTES must be between 1 and {}", MAX_TTL_MINUTES);
        }
        if !(0..=MAX_LEEWAY_SECONDS).contains(&self.token_leeway_seconds) {
            bail!("TOKEN_LEEWAY_SECONDS must be between 0 and {}", MAX_LEEWAY_SECONDS);
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }
        Ok(())
    }

    pub fn token_settings(&self) -> Result<TokenSettings> {
        let ttl = Duration::try_minutes(self.token_ttl_minutes)
            .context("TOKEN_TTL_MINUTES out of range")?;
        let leeway = Duration::try_seconds(self.token_leeway_seconds)
            .context("TOKEN_LEEWAY_SECONDS out of range")?;

        Ok(TokenSettings {
            ttl,
            leeway,
            issuer: self.token_issuer.clone(),
        })
    }
}
