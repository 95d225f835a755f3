//! Authentication API Endpoints
//! Mission: Provide login and user management endpoints

use crate::auth::{
    clock::Clock,
    credentials::{AuthFailure, CredentialVerifier},
    jwt::{TokenIssuer, TokenSettings, TokenValidator},
    keys::KeyProvider,
    middleware::CurrentUser,
    models::{CreateUserRequest, Identity, LoginRequest, LoginResponse, UserResponse},
    user_store::{UserStore, UserStoreError},
};
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared auth state, built once at startup
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<dyn UserStore>,
    pub verifier: Arc<CredentialVerifier>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        keys: Arc<dyn KeyProvider>,
        settings: &TokenSettings,
        bcrypt_cost: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let verifier = CredentialVerifier::new(user_store.clone(), bcrypt_cost)?;
        let issuer = TokenIssuer::new(keys.clone(), settings).with_clock(clock.clone());
        let validator = TokenValidator::new(keys, settings).with_clock(clock);

        Ok(Self {
            user_store,
            verifier: Arc::new(verifier),
            issuer: Arc::new(issuer),
            validator: Arc::new(validator),
        })
    }
}

/// Login credentials from either a form-encoded or a JSON body
pub struct LoginForm(pub LoginRequest);

#[async_trait]
impl<S> FromRequest<S> for LoginForm
where
    S: Send + Sync,
{
    type Rejection = AuthApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        let payload = if is_json {
            Json::<LoginRequest>::from_request(req, state)
                .await
                .map(|Json(p)| p)
                .map_err(|_| AuthApiError::BadLoginRequest)?
        } else {
            Form::<LoginRequest>::from_request(req, state)
                .await
                .map(|Form(p)| p)
                .map_err(|_| AuthApiError::BadLoginRequest)?
        };

        Ok(LoginForm(payload))
    }
}

/// Login endpoint - POST /api/users/login
///
/// The token is returned in the `Authorization` response header and in the body.
pub async fn login(
    State(state): State<AuthState>,
    LoginForm(payload): LoginForm,
) -> Result<Response, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.username);

    let verifier = state.verifier.clone();
    let username = payload.username.clone();
    let identity = tokio::task::spawn_blocking(move || {
        verifier.verify(&payload.username, &payload.password)
    })
    .await
    .map_err(|e| {
        error!("Login task failed: {}", e);
        AuthApiError::InternalError
    })?
    .map_err(|e| match e {
        AuthFailure::InvalidCredentials => {
            warn!("❌ Failed login attempt: {}", username);
            AuthApiError::InvalidCredentials
        }
        AuthFailure::StoreUnavailable(_) => AuthApiError::InternalError,
    })?;

    let issued = state.issuer.issue(&identity).map_err(|e| {
        error!("Token issuance failed: {:#}", e);
        AuthApiError::InternalError
    })?;

    info!("✅ Login successful: {} ({})", identity.login, identity.id);

    let bearer = format!("Bearer {}", issued.token);
    Ok((
        StatusCode::OK,
        [(header::AUTHORIZATION, bearer)],
        Json(LoginResponse {
            token: issued.token,
            expires_in: issued.expires_in,
            user: identity,
        }),
    )
        .into_response())
}

/// Get current user info - GET /api/users/me
/// Built from the identity the auth gate attached (no database lookup needed)
pub async fn get_current_user(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

/// Create user - POST /api/users
pub async fn create_user(
    State(state): State<AuthState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Response, AuthApiError> {
    if payload.login.trim().is_empty() || payload.password.is_empty() {
        return Err(AuthApiError::MissingFields);
    }

    let identity = Identity {
        id: Uuid::new_v4().to_string(),
        login: payload.login.trim().to_string(),
        first_name: payload.first_name,
        last_name: payload.last_name,
    };

    let verifier = state.verifier.clone();
    let store = state.user_store.clone();
    let password = payload.password;
    let user = tokio::task::spawn_blocking(move || {
        let hashed = verifier.hash_password(&password).map_err(|e| {
            error!("Password hashing failed: {:#}", e);
            AuthApiError::InternalError
        })?;
        store.create(&identity, &hashed).map_err(|e| match e {
            UserStoreError::DuplicateLogin(login) => {
                warn!("Failed to create user, login taken: {}", login);
                AuthApiError::UserAlreadyExists
            }
            other => {
                error!("Failed to create user: {}", other);
                AuthApiError::InternalError
            }
        })
    })
    .await
    .map_err(|_| AuthApiError::InternalError)??;

    let location = format!("/api/users/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserResponse::from_user(&user)),
    )
        .into_response())
}

/// List all users - GET /api/users
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    let users = state.user_store.list().map_err(|e| {
        error!("Failed to list users: {}", e);
        AuthApiError::InternalError
    })?;

    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Find user - GET /api/users/:id
pub async fn get_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthApiError> {
    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    let user = state
        .user_store
        .find_by_id(&uuid)
        .map_err(|e| {
            error!("Failed to load user {}: {}", uuid, e);
            AuthApiError::InternalError
        })?
        .ok_or(AuthApiError::UserNotFound)?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Delete user - DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AuthApiError> {
    let uuid = Uuid::parse_str(&user_id).map_err(|_| AuthApiError::InvalidUserId)?;

    let deleted = state.user_store.delete(&uuid).map_err(|e| {
        error!("Failed to delete user {}: {}", uuid, e);
        AuthApiError::InternalError
    })?;

    if !deleted {
        return Err(AuthApiError::UserNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    BadLoginRequest,
    MissingFields,
    UserNotFound,
    UserAlreadyExists,
    InvalidUserId,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthApiError::BadLoginRequest => (
                StatusCode::BAD_REQUEST,
                "Expected username and password fields",
            ),
            AuthApiError::MissingFields => {
                (StatusCode::BAD_REQUEST, "Login and password are required")
            }
            AuthApiError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthApiError::UserAlreadyExists => (StatusCode::CONFLICT, "Login already exists"),
            AuthApiError::InvalidUserId => (StatusCode::BAD_REQUEST, "Invalid user ID format"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
