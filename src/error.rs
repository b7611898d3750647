//! Error types for the Reddit OAuth adapter
//!
//! Configuration problems surface from [`crate::RedditOAuth::create`] and
//! abort construction. Per-request problems are returned from the handlers
//! and rendered through `IntoResponse`, which stops the request pipeline.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::client::ExchangeError;

/// Adapter-wide error type
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A required configuration field is absent or falsy
    #[error("RedditOAuth requires a [{field}]")]
    MissingConfig { field: &'static str },

    /// A configuration field has the wrong type
    #[error("RedditOAuth expects [{field}] to be a [{expected}] but it was a [{actual}]")]
    TypeConfig {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The callback request did not carry a `code` query parameter (400)
    #[error("RedditOAuth expects [code] param in the request")]
    MissingCode,

    /// The token exchange with Reddit failed (502)
    #[error("Token exchange failed: {0}")]
    Exchange(Arc<ExchangeError>),

    /// An authorize/token parameter cannot be encoded into a query string
    #[error("Parameter [{name}] cannot be encoded as a query value")]
    InvalidParameter { name: String },

    /// No access token is attached to the request (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Configuration could not be loaded (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AdapterError {
    fn kind(&self) -> &'static str {
        match self {
            AdapterError::MissingConfig { .. } => "missing_config",
            AdapterError::TypeConfig { .. } => "type_config",
            AdapterError::MissingCode => "missing_code",
            AdapterError::Exchange(_) => "exchange",
            AdapterError::InvalidParameter { .. } => "invalid_parameter",
            AdapterError::Unauthorized => "unauthorized",
            AdapterError::Config(_) => "config",
            AdapterError::Internal(_) => "internal",
        }
    }
}

impl From<ExchangeError> for AdapterError {
    fn from(err: ExchangeError) -> Self {
        AdapterError::Exchange(Arc::new(err))
    }
}

impl From<config::ConfigError> for AdapterError {
    fn from(err: config::ConfigError) -> Self {
        AdapterError::Config(err.to_string())
    }
}

impl IntoResponse for AdapterError {
    /// Maps each variant to a status code and a JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = match &self {
            AdapterError::MissingCode => StatusCode::BAD_REQUEST,
            AdapterError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdapterError::Exchange(_) => StatusCode::BAD_GATEWAY,
            AdapterError::MissingConfig { .. }
            | AdapterError::TypeConfig { .. }
            | AdapterError::InvalidParameter { .. }
            | AdapterError::Config(_)
            | AdapterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
