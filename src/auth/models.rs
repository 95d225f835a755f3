//! Authentication Models
//! Mission: Define user, identity and token claim data structures

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub created_at: String,
}

impl User {
    /// The read-only view of this user that travels inside tokens
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.to_string(),
            login: self.login.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Authenticated identity, as issued into and recovered from a token.
///
/// Attached to request extensions by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
}

/// JWT Claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub login: String,
    pub given_name: String,
    pub family_name: String,
    pub iss: String,
    pub iat: i64, // issued-at, seconds since epoch
    pub exp: i64, // expiration, seconds since epoch
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            login: self.login.clone(),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
        }
    }
}

/// Login request body (form-encoded or JSON)
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64, // seconds until expiration
    pub user: Identity,
}

/// Create user request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            login: user.login.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}
