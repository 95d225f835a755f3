//! JWT Token Issuer and Validator
//! Mission: Generate and validate signed, time-bounded tokens

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::keys::KeyProvider;
use crate::auth::models::{Claims, Identity};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_ISSUER: &str = "secured-echo";
pub const DEFAULT_TTL_MINUTES: i64 = 15;

const ALGORITHM: Algorithm = Algorithm::HS512;

/// Token lifetime and verification parameters
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub ttl: Duration,
    /// Clock skew tolerance added to the expiry comparison
    pub leeway: Duration,
    pub issuer: String,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            leeway: Duration::zero(),
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

/// Signed token handed back on login
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64, // seconds
}

/// Produces signed tokens for authenticated identities
pub struct TokenIssuer {
    keys: Arc<dyn KeyProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(keys: Arc<dyn KeyProvider>, settings: &TokenSettings) -> Self {
        Self {
            keys,
            clock: Arc::new(SystemClock),
            ttl: settings.ttl,
            issuer: settings.issuer.clone(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Generate a JWT for an identity
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken> {
        let key = self.keys.current_key();
        let now = self.clock.now();
        let expiration = now
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: identity.id.clone(),
            login: identity.login.clone(),
            given_name: identity.first_name.clone(),
            family_name: identity.last_name.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        let mut header = Header::new(ALGORITHM);
        header.kid = Some(key.id().to_string());

        debug!(
            "Generating JWT for user {} ({}), kid={}, expires in {}s",
            identity.login,
            identity.id,
            key.id(),
            self.ttl.num_seconds()
        );

        let token =
            encode(&header, &claims, &key.encoding_key()).context("Failed to generate JWT")?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl.num_seconds(),
        })
    }
}

/// Why a token was refused. Only ever logged, never returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    Malformed,
    BadSignature,
    Expired,
}

impl ValidationFailure {
    fn from_jwt(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => ValidationFailure::BadSignature,
            ErrorKind::ExpiredSignature => ValidationFailure::Expired,
            _ => ValidationFailure::Malformed,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Malformed => write!(f, "malformed token"),
            ValidationFailure::BadSignature => write!(f, "bad token signature"),
            ValidationFailure::Expired => write!(f, "token expired"),
        }
    }
}

impl std::error::Error for ValidationFailure {}

/// Verifies token structure, signature and expiry
pub struct TokenValidator {
    keys: Arc<dyn KeyProvider>,
    clock: Arc<dyn Clock>,
    leeway: Duration,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(keys: Arc<dyn KeyProvider>, settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);
        validation.set_issuer(&[settings.issuer.as_str()]);

        Self {
            keys,
            clock: Arc::new(SystemClock),
            leeway: settings.leeway.max(Duration::zero()),
            validation,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate a JWT and extract the embedded identity
    pub fn validate(&self, token: &str) -> Result<Identity, ValidationFailure> {
        let key = self.keys.current_key();

        let decoded = decode::<Claims>(token, &key.decoding_key(), &self.validation)
            .map_err(|e| ValidationFailure::from_jwt(&e))?;

        // Inclusive boundary: a token is still good at its exact expiry instant
        let expires_at = DateTime::<Utc>::from_timestamp(decoded.claims.exp, 0)
            .and_then(|exp| exp.checked_add_signed(self.leeway))
            .ok_or(ValidationFailure::Malformed)?;
        if self.clock.now() > expires_at {
            return Err(ValidationFailure::Expired);
        }

        debug!("Validated JWT for user {}", decoded.claims.login);

        Ok(decoded.claims.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::keys::{KeyMaterial, KeyStore};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn create_test_identity() -> Identity {
        Identity {
            id: Uuid::new_v4().to_string(),
            login: "testuser".to_string(),
            first_name: "first name".to_string(),
            last_name: "last name".to_string(),
        }
    }

    fn keys(secret: &str) -> Arc<KeyStore> {
        Arc::new(KeyStore::new(KeyMaterial::from_secret(secret.as_bytes()).unwrap()))
    }

    fn pair(keys: Arc<KeyStore>, clock: Arc<ManualClock>) -> (TokenIssuer, TokenValidator) {
        let settings = TokenSettings::default();
        (
            TokenIssuer::new(keys.clone(), &settings).with_clock(clock.clone()),
            TokenValidator::new(keys, &settings).with_clock(clock),
        )
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    const SECRET: &str = "test-secret-key-12345-test-secret-key-12345";

    #[test]
    fn test_jwt_generation_and_validation() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, validator) = pair(keys(SECRET), clock);
        let identity = create_test_identity();

        let issued = issuer.issue(&identity).unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.expires_in, 15 * 60);
        assert_eq!(issued.token.split('.').count(), 3);

        let validated = validator.validate(&issued.token).unwrap();
        assert_eq!(validated, identity);
    }

    #[test]
    fn test_system_clock_round_trip() {
        let keys = keys(SECRET);
        let settings = TokenSettings::default();
        let issuer = TokenIssuer::new(keys.clone(), &settings);
        let validator = TokenValidator::new(keys, &settings);
        let identity = create_test_identity();

        let issued = issuer.issue(&identity).unwrap();
        assert_eq!(validator.validate(&issued.token).unwrap(), identity);
    }

    #[test]
    fn test_header_carries_kid_and_algorithm() {
        let keys = keys(SECRET);
        let kid = keys.current_key().id().to_string();
        let (issuer, _) = pair(keys, Arc::new(ManualClock::new(start())));

        let issued = issuer.issue(&create_test_identity()).unwrap();
        let header = jsonwebtoken::decode_header(&issued.token).unwrap();
        assert_eq!(header.alg, Algorithm::HS512);
        assert_eq!(header.kid.as_deref(), Some(kid.as_str()));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let (_, validator) = pair(keys(SECRET), Arc::new(ManualClock::new(start())));

        for bad in ["", "invalid", "invalid.token", "invalid.token.here", "a.b.c.d"] {
            assert_eq!(
                validator.validate(bad),
                Err(ValidationFailure::Malformed),
                "input {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_different_secrets_reject() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, _) = pair(keys(SECRET), clock.clone());
        let (_, other) = pair(
            keys("another-secret-key-67890-another-secret-key"),
            clock,
        );

        let issued = issuer.issue(&create_test_identity()).unwrap();
        assert_eq!(
            other.validate(&issued.token),
            Err(ValidationFailure::BadSignature)
        );
    }

    #[test]
    fn test_any_single_byte_mutation_rejected() {
        let (issuer, validator) = pair(keys(SECRET), Arc::new(ManualClock::new(start())));
        let token = issuer.issue(&create_test_identity()).unwrap().token;

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            match validator.validate(&tampered) {
                Err(ValidationFailure::BadSignature) | Err(ValidationFailure::Malformed) => {}
                other => panic!("mutation at byte {} accepted: {:?}", i, other),
            }
        }
    }

    #[test]
    fn test_payload_swap_is_bad_signature() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, validator) = pair(keys(SECRET), clock);

        let a = issuer.issue(&create_test_identity()).unwrap().token;
        let b = issuer.issue(&create_test_identity()).unwrap().token;
        let a_parts: Vec<&str> = a.split('.').collect();
        let b_parts: Vec<&str> = b.split('.').collect();

        // b's claims under a's signature
        let forged = format!("{}.{}.{}", a_parts[0], b_parts[1], a_parts[2]);
        assert_eq!(
            validator.validate(&forged),
            Err(ValidationFailure::BadSignature)
        );
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let (issuer, validator) = pair(keys(SECRET), Arc::new(ManualClock::new(start())));
        let token = issuer.issue(&create_test_identity()).unwrap().token;
        let payload = token.split('.').nth(1).unwrap();

        // {"alg":"none","typ":"JWT"}
        let none_header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        let forged = format!("{}.{}.", none_header, payload);
        assert_eq!(validator.validate(&forged), Err(ValidationFailure::Malformed));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, validator) = pair(keys(SECRET), clock.clone());
        let identity = create_test_identity();
        let token = issuer.issue(&identity).unwrap().token;

        clock.set(start() + Duration::minutes(DEFAULT_TTL_MINUTES));
        assert_eq!(validator.validate(&token), Ok(identity));

        clock.advance(Duration::seconds(1));
        assert_eq!(validator.validate(&token), Err(ValidationFailure::Expired));
    }

    #[test]
    fn test_expiry_rejects_sub_second_overrun() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, validator) = pair(keys(SECRET), clock.clone());
        let token = issuer.issue(&create_test_identity()).unwrap().token;

        clock.set(start() + Duration::minutes(DEFAULT_TTL_MINUTES) + Duration::milliseconds(500));
        assert_eq!(validator.validate(&token), Err(ValidationFailure::Expired));

        clock.set(start() + Duration::minutes(DEFAULT_TTL_MINUTES) + Duration::milliseconds(1));
        assert_eq!(validator.validate(&token), Err(ValidationFailure::Expired));
    }

    #[test]
    fn test_leeway_extends_expiry() {
        let clock = Arc::new(ManualClock::new(start()));
        let keys = keys(SECRET);
        let settings = TokenSettings {
            ttl: Duration::seconds(60),
            leeway: Duration::seconds(30),
            ..TokenSettings::default()
        };
        let issuer = TokenIssuer::new(keys.clone(), &settings).with_clock(clock.clone());
        let validator = TokenValidator::new(keys, &settings).with_clock(clock.clone());
        let token = issuer.issue(&create_test_identity()).unwrap().token;

        clock.set(start() + Duration::seconds(90));
        assert!(validator.validate(&token).is_ok());

        clock.set(start() + Duration::seconds(91));
        assert_eq!(validator.validate(&token), Err(ValidationFailure::Expired));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let clock = Arc::new(ManualClock::new(start()));
        let keys = keys(SECRET);
        let foreign = TokenSettings {
            issuer: "somebody-else".to_string(),
            ..TokenSettings::default()
        };
        let issuer = TokenIssuer::new(keys.clone(), &foreign).with_clock(clock.clone());
        let validator =
            TokenValidator::new(keys, &TokenSettings::default()).with_clock(clock);

        let token = issuer.issue(&create_test_identity()).unwrap().token;
        assert_eq!(validator.validate(&token), Err(ValidationFailure::Malformed));
    }

    #[test]
    fn test_rotation_invalidates_old_tokens() {
        let clock = Arc::new(ManualClock::new(start()));
        let keys = keys(SECRET);
        let (issuer, validator) = pair(keys.clone(), clock);
        let identity = create_test_identity();

        let old = issuer.issue(&identity).unwrap().token;
        keys.rotate(KeyMaterial::generate().unwrap());

        assert_eq!(validator.validate(&old), Err(ValidationFailure::BadSignature));
        let fresh = issuer.issue(&identity).unwrap().token;
        assert_eq!(validator.validate(&fresh), Ok(identity));
    }

    #[test]
    fn test_concurrent_issue_and_validate() {
        let clock = Arc::new(ManualClock::new(start()));
        let (issuer, validator) = pair(keys(SECRET), clock);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let identity = create_test_identity();
                        let token = issuer.issue(&identity).unwrap().token;
                        assert_eq!(validator.validate(&token), Ok(identity));
                    }
                });
            }
        });
    }
}
