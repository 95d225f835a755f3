//! Credential Verifier
//! Mission: Check login/password pairs against stored bcrypt hashes

use crate::auth::models::Identity;
use crate::auth::user_store::{UserStore, UserStoreError};
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Login rejection. Unknown login and wrong password are the same outcome.
#[derive(Debug)]
pub enum AuthFailure {
    InvalidCredentials,
    StoreUnavailable(String),
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::InvalidCredentials => write!(f, "Invalid login or password"),
            AuthFailure::StoreUnavailable(e) => write!(f, "User store unavailable: {}", e),
        }
    }
}

impl std::error::Error for AuthFailure {}

pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    cost: u32,
    // Burned on unknown logins so they take as long as a wrong password
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>, cost: u32) -> Result<Self> {
        let dummy_hash =
            hash("not-a-real-password", cost).context("Failed to hash password")?;
        Ok(Self {
            store,
            cost,
            dummy_hash,
        })
    }

    /// Salted one-way hash for registration, using the same cost as verification
    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash(password, self.cost).context("Failed to hash password")
    }

    /// Verify login and password
    pub fn verify(&self, login: &str, password: &str) -> Result<Identity, AuthFailure> {
        let user = self
            .store
            .find_by_login(login)
            .map_err(|e: UserStoreError| {
                error!("User lookup failed: {}", e);
                AuthFailure::StoreUnavailable(e.to_string())
            })?;

        match user {
            Some(user) => match verify(password, &user.password_hash) {
                Ok(true) => Ok(user.identity()),
                Ok(false) => Err(AuthFailure::InvalidCredentials),
                Err(e) => {
                    // Corrupt stored hash: still just a failed login for the caller
                    error!("Stored hash for {} is unreadable: {}", user.id, e);
                    Err(AuthFailure::InvalidCredentials)
                }
            },
            None => {
                let _ = verify(password, &self.dummy_hash);
                Err(AuthFailure::InvalidCredentials)
            }
        }
    }
}
