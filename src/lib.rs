//! Secured Echo
//!
//! Echo service with token-based authentication: login issues a signed JWT,
//! and an auth gate in front of the protected routes validates it on every
//! request.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{api as auth_api, auth_middleware, AuthState};

/// Build the full application router
pub fn app(state: AuthState) -> Router {
    // Routes behind the auth gate
    let protected_routes = Router::new()
        .route("/api/securedecho", get(api::secured_echo))
        .route("/api/users/me", get(auth_api::get_current_user))
        .route_layer(axum_middleware::from_fn_with_state(
            state.validator.clone(),
            auth_middleware,
        ));

    let user_routes = Router::new()
        .route(
            "/api/users",
            get(auth_api::list_users).post(auth_api::create_user),
        )
        .route("/api/users/login", post(auth_api::login))
        .route(
            "/api/users/:id",
            get(auth_api::get_user).delete(auth_api::delete_user),
        )
        .with_state(state);

    let public_routes = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/echo", get(api::echo));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(user_routes)
        .layer(axum_middleware::from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
