//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation

use crate::auth::{
    jwt::{TokenValidator, ValidationFailure},
    models::Identity,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Auth gate: rejects the request unless it carries a valid token.
///
/// On success the resolved [`Identity`] is inserted into request extensions,
/// and copied onto the response so the access log can name the caller.
pub async fn auth_middleware(
    State(validator): State<Arc<TokenValidator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_token)
        .ok_or(GateRejection::MissingToken)?;

    let identity = validator
        .validate(token)
        .map_err(GateRejection::Invalid)?;

    debug!(
        user = %identity.login,
        path = %req.uri().path(),
        "Request authenticated"
    );

    req.extensions_mut().insert(identity.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(identity);
    Ok(response)
}

/// Pull the token out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` (scheme case-insensitive) or a bare token.
pub fn extract_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Identity of the caller, available to handlers behind the auth gate
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(GateRejection::MissingToken)
    }
}

/// Gate rejection. Every variant renders as the same bare 401.
#[derive(Debug)]
pub enum GateRejection {
    MissingToken,
    Invalid(ValidationFailure),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match &self {
            GateRejection::MissingToken => debug!("Rejected request: missing token"),
            GateRejection::Invalid(ValidationFailure::Expired) => {
                debug!("Rejected request: token expired")
            }
            GateRejection::Invalid(reason) => warn!("Rejected request: {}", reason),
        }

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
        )
            .into_response()
    }
}
