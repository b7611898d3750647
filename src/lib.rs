//! reddit-oauth - Reddit OAuth2 authorization-code adapter for axum
//!
//! # Flow
//!
//! ```text
//!  browser ── GET /auth/reddit ──────────▶ authorize ── 302 ──▶ reddit.com/api/v1/authorize
//!  browser ── GET /auth/reddit/callback ─▶ access_token ── POST /api/v1/access_token
//!                                               │
//!                                               ▼
//!                                 RedditToken / TokenError in request extensions
//!                                               │
//!                                               ▼
//!                                       downstream handler
//! ```
//!
//! # Modules
//!
//! - `auth`: the adapter, its handlers and extractors
//! - `client`: OAuth2 authorization-code client
//! - `config`: Configuration resolution and validation
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;

use axum::{
    Json, Router,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

pub use auth::{MaybeTokenError, RedditOAuth, RedditToken, TokenError, access_token, authorize};
pub use client::{AccessToken, AuthorizationCodeClient, ExchangeError, OAuth2Client};
pub use crate::config::{ConfigSource, RedditOAuthConfig, Scope};
pub use error::AdapterError;

/// Login route
pub const LOGIN_PATH: &str = "/auth/reddit";
/// Callback route; must match the registered `callback_url`
pub const CALLBACK_PATH: &str = "/auth/reddit/callback";

/// Build the demo router
///
/// Shared by the binary and integration tests to keep route composition
/// consistent across environments.
pub fn build_router(adapter: RedditOAuth) -> Router {
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(auth::reddit_router(
            adapter,
            LOGIN_PATH,
            CALLBACK_PATH,
            token_summary,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Callback handler: summarises the attached token, or the attached
/// exchange error when `return_error` is on.
async fn token_summary(
    token: Option<RedditToken>,
    MaybeTokenError(token_error): MaybeTokenError,
) -> Response {
    if let Some(TokenError(error)) = token_error {
        return (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "token_error": error.to_string() })),
        )
            .into_response();
    }

    match token {
        Some(RedditToken(token)) => Json(serde_json::json!({
            "token_type": token.token_type(),
            "scope": token.scope(),
            "expires_at": token.expires_at(),
            "has_refresh_token": token.refresh_token().is_some(),
        }))
        .into_response(),
        None => AdapterError::Unauthorized.into_response(),
    }
}

async fn metrics_handler() -> Result<Response, AdapterError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&metrics::REGISTRY.gather())
        .map_err(|e| AdapterError::Internal(e.into()))?;

    Ok(([(CONTENT_TYPE, encoder.format_type().to_string())], body).into_response())
}

async fn health_check() -> &'static str {
    "OK"
}
