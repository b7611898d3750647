//! Reddit OAuth adapter
//!
//! Binds an [`AuthorizationCodeClient`] to Reddit's endpoints and the
//! resolved configuration. Both request handlers borrow the same adapter;
//! nothing per-request is retained.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::State,
    handler::Handler,
    http::{StatusCode, header::LOCATION},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use url::Url;

use super::middleware::access_token;
use crate::client::{AccessToken, AuthorizationCodeClient, Credentials, OAuth2Client, Params};
use crate::config::{ConfigSource, RedditOAuthConfig};
use crate::error::AdapterError;
use crate::metrics::{
    AUTHORIZE_REDIRECTS_TOTAL, TOKEN_EXCHANGE_DURATION_SECONDS, TOKEN_EXCHANGES_TOTAL,
};

/// Configured adapter: resolved configuration plus the shared client handle
///
/// Cheap to clone; use it as axum state for [`authorize`] and
/// [`access_token`].
#[derive(Clone)]
pub struct RedditOAuth {
    config: Arc<RedditOAuthConfig>,
    oauth2: Arc<dyn AuthorizationCodeClient>,
}

impl std::fmt::Debug for RedditOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditOAuth")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedditOAuth {
    /// Create an adapter from a configuration value or factory
    ///
    /// # Steps
    /// 1. Resolve the source (calls a factory once)
    /// 2. Default absent `scope` / `return_error`
    /// 3. Validate required fields, then `scope`
    /// 4. Build the OAuth2 client (no network I/O)
    ///
    /// # Errors
    /// `MissingConfig` / `TypeConfig` for the first invalid field.
    pub fn create(source: impl Into<ConfigSource>) -> Result<Self, AdapterError> {
        let config = RedditOAuthConfig::from_source(source)?;
        let client = OAuth2Client::new(
            Credentials {
                id: config.client_id.clone(),
                secret: config.client_secret.clone(),
            },
            config.endpoints.clone(),
            config.user_agent.as_deref(),
        )?;

        tracing::info!(
            authorize_url = %config.endpoints.authorize_url(),
            token_url = %config.endpoints.token_url(),
            return_error = config.return_error,
            "Reddit OAuth adapter created"
        );

        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create an adapter around a custom client implementation
    pub fn with_client(config: RedditOAuthConfig, oauth2: Arc<dyn AuthorizationCodeClient>) -> Self {
        Self {
            config: Arc::new(config),
            oauth2,
        }
    }

    pub fn config(&self) -> &RedditOAuthConfig {
        &self.config
    }

    /// The shared OAuth2 client handle
    pub fn oauth2(&self) -> &Arc<dyn AuthorizationCodeClient> {
        &self.oauth2
    }

    /// Parameters for the authorize redirect
    ///
    /// `authorize_options` first, then `scope`, `state` and `redirect_uri`,
    /// which replace any option of the same name.
    pub fn authorization_params(&self) -> Params {
        let scope = self
            .config
            .scope
            .as_ref()
            .map_or(Value::Null, |scope| Value::String(scope.to_param()));

        merge_fixed(
            &self.config.authorize_options,
            [
                ("scope", scope),
                ("state", Value::String(self.config.state.clone())),
                ("redirect_uri", Value::String(self.config.callback_url.clone())),
            ],
        )
    }

    pub fn authorization_url(&self) -> Result<Url, AdapterError> {
        self.oauth2.authorize_url(&self.authorization_params())
    }

    /// Parameters for the code exchange
    ///
    /// `token_options` first, then the fixed grant fields. A `code` in
    /// `token_options` never reaches Reddit.
    pub fn token_params(&self, code: &str) -> Params {
        merge_fixed(
            &self.config.token_options,
            [
                ("code", Value::String(code.to_string())),
                ("state", Value::String(self.config.state.clone())),
                ("client_id", Value::String(self.config.client_id.clone())),
                (
                    "client_secret",
                    Value::String(self.config.client_secret.clone()),
                ),
                ("redirect_uri", Value::String(self.config.callback_url.clone())),
            ],
        )
    }

    /// Exchange an authorization code for an access token
    ///
    /// # Errors
    /// `MissingCode` without touching the network when `code` is absent or
    /// empty; `Exchange` when the token endpoint call fails.
    pub async fn exchange(&self, code: Option<&str>) -> Result<AccessToken, AdapterError> {
        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(AdapterError::MissingCode)?;

        let started = Instant::now();
        let result = self.oauth2.exchange_code(&self.token_params(code)).await;
        TOKEN_EXCHANGE_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        match result {
            Ok(raw) => {
                TOKEN_EXCHANGES_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!("Authorization code exchanged for access token");
                Ok(self.oauth2.wrap_token(raw))
            }
            Err(error) => {
                TOKEN_EXCHANGES_TOTAL.with_label_values(&["failure"]).inc();
                tracing::warn!(%error, "Authorization code exchange failed");
                Err(error.into())
            }
        }
    }

    /// Refresh an access token through the same client
    pub async fn refresh(&self, token: &AccessToken) -> Result<AccessToken, AdapterError> {
        let refresh_token = token.refresh_token().ok_or(AdapterError::Unauthorized)?;
        let raw = self.oauth2.refresh_token(refresh_token).await?;
        Ok(self.oauth2.wrap_token(raw))
    }
}

/// Copy `options`, dropping keys that the fixed values replace, then append
/// the fixed values in order.
fn merge_fixed<const N: usize>(options: &Params, fixed: [(&str, Value); N]) -> Params {
    let mut params: Params = options
        .iter()
        .filter(|(name, _)| !fixed.iter().any(|(fixed_name, _)| *fixed_name == name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    for (name, value) in fixed {
        params.insert(name.to_string(), value);
    }
    params
}

/// GET handler redirecting the browser to Reddit's authorize page
///
/// Responds with 302 Found. An option that cannot be encoded surfaces as
/// an error response.
pub async fn authorize(State(adapter): State<RedditOAuth>) -> Result<Response, AdapterError> {
    let url = adapter.authorization_url()?;
    AUTHORIZE_REDIRECTS_TOTAL.inc();
    tracing::debug!(%url, "Redirecting to Reddit authorization page");

    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response())
}

/// Create the Reddit login router
///
/// Routes:
/// - GET `login_path` - Redirect to Reddit
/// - GET `callback_path` - Token exchange, then `on_callback`
pub fn reddit_router<H, T>(
    adapter: RedditOAuth,
    login_path: &str,
    callback_path: &str,
    on_callback: H,
) -> Router
where
    H: Handler<T, RedditOAuth>,
    T: 'static,
{
    let callback_routes = Router::new()
        .route(callback_path, get(on_callback))
        .route_layer(middleware::from_fn_with_state(
            adapter.clone(),
            access_token,
        ));

    Router::new()
        .route(login_path, get(authorize))
        .merge(callback_routes)
        .with_state(adapter)
}
