//! Access log for the echo service.
//!
//! One line per request with the caller's login when the auth gate admitted
//! it. Headers and query strings are never logged, so tokens and echoed
//! messages stay out of the output.

use crate::auth::models::Identity;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, error, info};

const HEALTH_PATH: &str = "/health";
const ANONYMOUS: &str = "-";

/// Login the auth gate attached to the response, or `-` for public routes
/// and refused requests.
fn caller(response: &Response) -> &str {
    response
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.login.as_str())
        .unwrap_or(ANONYMOUS)
}

/// Outermost middleware: times the request and writes the access line.
///
/// Gate refusals go out at DEBUG since they carry no reason anyway; the
/// gate itself logs why it refused.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status();
    let user = caller(&response);

    match status {
        s if s.is_server_error() => {
            error!(%method, %path, status = s.as_u16(), user, elapsed_ms, "request failed")
        }
        StatusCode::UNAUTHORIZED => {
            debug!(%method, %path, elapsed_ms, "request refused")
        }
        s => info!(%method, %path, status = s.as_u16(), user, elapsed_ms, "request served"),
    }

    response
}
