//! Echo Endpoints
//! Mission: Public and token-protected echo of a query message

use crate::auth::middleware::CurrentUser;
use axum::extract::Query;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct EchoParams {
    pub message: Option<String>,
}

impl EchoParams {
    fn into_reply(self) -> String {
        self.message.unwrap_or_else(|| "no message".to_string())
    }
}

/// GET /api/echo
pub async fn echo(Query(params): Query<EchoParams>) -> String {
    params.into_reply()
}

/// GET /api/securedecho - only reachable behind the auth gate
pub async fn secured_echo(
    CurrentUser(identity): CurrentUser,
    Query(params): Query<EchoParams>,
) -> String {
    info!("🔒 Secured echo for {}", identity.login);
    params.into_reply()
}

pub async fn health_check() -> &'static str {
    "ok"
}
