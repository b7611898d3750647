//! OAuth 2.0 authorization-code client
//!
//! [`AuthorizationCodeClient`] is the seam between the adapter and the
//! protocol work: building authorize URLs, exchanging codes and refreshing
//! tokens. [`OAuth2Client`] implements it over reqwest.

use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::Endpoints;
use crate::error::AdapterError;

/// Query/form parameters in insertion order
pub type Params = Map<String, Value>;

/// Token endpoint response body
pub type RawToken = Map<String, Value>;

const DEFAULT_USER_AGENT: &str = concat!("reddit-oauth/", env!("CARGO_PKG_VERSION"));

/// Token exchange failure
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Reddit rejected the request
    #[error("Provider rejected token request ({status}): {error}")]
    Provider {
        status: u16,
        error: String,
        description: Option<String>,
    },

    /// Request parameters could not be form-encoded
    #[error("Invalid token request: {0}")]
    InvalidRequest(String),

    /// Response was not a token object
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// OAuth client credentials
#[derive(Clone)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Authorization-code grant operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationCodeClient: Send + Sync {
    /// Build the URL the browser is redirected to
    fn authorize_url(&self, params: &Params) -> Result<Url, AdapterError>;

    /// Exchange an authorization code for a token
    async fn exchange_code(&self, params: &Params) -> Result<RawToken, ExchangeError>;

    /// Obtain a fresh token from a refresh token
    async fn refresh_token(&self, refresh_token: &str) -> Result<RawToken, ExchangeError>;

    /// Wrap a raw token response
    fn wrap_token(&self, raw: RawToken) -> AccessToken {
        AccessToken::new(raw)
    }
}

/// reqwest-backed client bound to one set of credentials and endpoints
///
/// Construction performs no network I/O.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    credentials: Credentials,
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl OAuth2Client {
    pub fn new(
        credentials: Credentials,
        endpoints: Endpoints,
        user_agent: Option<&str>,
    ) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            endpoints,
            http,
        })
    }

    async fn request_token(&self, form: Vec<(String, String)>) -> Result<RawToken, ExchangeError> {
        let response = self
            .http
            .post(self.endpoints.token_url())
            .basic_auth(&self.credentials.id, Some(&self.credentials.secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        // Reddit reports some failures (e.g. invalid_grant) with a 200 status.
        let provider_error = parsed
            .as_ref()
            .and_then(|v| v.get("error"))
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        if !status.is_success() || provider_error.is_some() {
            let description = parsed
                .as_ref()
                .and_then(|v| v.get("error_description").or_else(|| v.get("message")))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            return Err(ExchangeError::Provider {
                status: status.as_u16(),
                error: provider_error.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown_error")
                        .to_string()
                }),
                description,
            });
        }

        match parsed {
            Some(Value::Object(token)) if token.contains_key("access_token") => Ok(token),
            Some(Value::Object(_)) => Err(ExchangeError::InvalidResponse(
                "missing access_token".to_string(),
            )),
            _ => Err(ExchangeError::InvalidResponse(format!(
                "expected a JSON object, got {} bytes",
                body.len()
            ))),
        }
    }
}

#[async_trait]
impl AuthorizationCodeClient for OAuth2Client {
    fn authorize_url(&self, params: &Params) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.endpoints.authorize_url()).map_err(|e| {
            AdapterError::Config(format!(
                "invalid authorize URL {}: {e}",
                self.endpoints.authorize_url()
            ))
        })?;

        let pairs = encode_params(params)?;
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in &pairs {
                if name == "response_type" || name == "client_id" {
                    continue;
                }
                query.append_pair(name, value);
            }
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.credentials.id);
        }

        Ok(url)
    }

    async fn exchange_code(&self, params: &Params) -> Result<RawToken, ExchangeError> {
        let mut form = encode_params(params)
            .map_err(|e| ExchangeError::InvalidRequest(e.to_string()))?;
        form.retain(|(name, _)| name != "grant_type");
        form.push(("grant_type".to_string(), "authorization_code".to_string()));

        tracing::debug!(token_url = %self.endpoints.token_url(), "Exchanging authorization code");
        self.request_token(form).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RawToken, ExchangeError> {
        let form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];

        tracing::debug!(token_url = %self.endpoints.token_url(), "Refreshing access token");
        self.request_token(form).await
    }
}

/// Flatten parameters into query pairs
///
/// Scalars are stringified, string lists are joined with a space and
/// null becomes an empty value. Objects and nested lists are rejected.
pub fn encode_params(params: &Params) -> Result<Vec<(String, String)>, AdapterError> {
    let mut pairs = Vec::with_capacity(params.len());
    for (name, value) in params {
        let encoded = match value {
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(scalar_to_string(item).ok_or_else(|| {
                        AdapterError::InvalidParameter { name: name.clone() }
                    })?);
                }
                parts.join(" ")
            }
            other => scalar_to_string(other)
                .ok_or_else(|| AdapterError::InvalidParameter { name: name.clone() })?,
        };
        pairs.push((name.clone(), encoded));
    }
    Ok(pairs)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// An access token with its computed expiry
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    token: RawToken,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: RawToken) -> Self {
        let expires_at = token
            .get("expires_in")
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
        Self { token, expires_at }
    }

    pub fn raw(&self) -> &RawToken {
        &self.token
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token.get("access_token").and_then(Value::as_str)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token.get("refresh_token").and_then(Value::as_str)
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token.get("token_type").and_then(Value::as_str)
    }

    pub fn scope(&self) -> Option<&str> {
        self.token.get("scope").and_then(Value::as_str)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_within(Duration::zero())
    }

    /// True when the token expires within `window` from now.
    /// Tokens without `expires_in` never expire.
    pub fn is_expired_within(&self, window: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - window <= Utc::now())
    }
}
