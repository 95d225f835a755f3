//! Authentication Module
//! Mission: Issue signed tokens on login and gate protected endpoints on them

pub mod api;
pub mod clock;
pub mod credentials;
pub mod jwt;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use api::AuthState;
pub use credentials::{AuthFailure, CredentialVerifier};
pub use jwt::{TokenIssuer, TokenSettings, TokenValidator, ValidationFailure};
pub use keys::{KeyProvider, KeyStore};
pub use middleware::{auth_middleware, CurrentUser};
pub use user_store::{SqliteUserStore, UserStore};
