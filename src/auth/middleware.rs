//! Token exchange middleware
//!
//! Runs on the OAuth callback route, ahead of the handler that consumes
//! the token.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{Request, Uri, request::Parts},
    middleware::Next,
    response::Response,
};

use super::oauth::RedditOAuth;
use crate::client::{AccessToken, ExchangeError};
use crate::error::AdapterError;

/// First `code` query parameter Reddit appended to the callback URL
fn callback_code(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "code")
        .map(|(_, value)| value.into_owned())
}

/// Token attached to the request after a successful exchange
#[derive(Debug, Clone)]
pub struct RedditToken(pub AccessToken);

/// Exchange failure attached to the request when `return_error` is set
#[derive(Debug, Clone)]
pub struct TokenError(pub Arc<ExchangeError>);

/// Middleware exchanging the callback `code` for an access token
///
/// - No `code`: returns `MissingCode`, the downstream handler never runs.
/// - Success: inserts [`RedditToken`] into request extensions and continues.
/// - Failure: with `return_error` inserts [`TokenError`] and continues,
///   otherwise returns the error.
///
/// # Usage
/// ```ignore
/// let callback = Router::new()
///     .route("/auth/reddit/callback", get(handler))
///     .route_layer(middleware::from_fn_with_state(adapter, access_token));
/// ```
pub async fn access_token(
    State(adapter): State<RedditOAuth>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AdapterError> {
    let code = callback_code(request.uri());

    match adapter.exchange(code.as_deref()).await {
        Ok(token) => {
            request.extensions_mut().insert(RedditToken(token));
        }
        Err(AdapterError::Exchange(error)) if adapter.config().return_error => {
            request.extensions_mut().insert(TokenError(error));
        }
        Err(error) => return Err(error),
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for RedditToken
where
    S: Send + Sync,
{
    type Rejection = AdapterError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RedditToken>()
            .cloned()
            .ok_or(AdapterError::Unauthorized)
    }
}

/// Optional token error extractor
///
/// `None` when the exchange succeeded or `return_error` is off.
#[derive(Debug, Clone)]
pub struct MaybeTokenError(pub Option<TokenError>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeTokenError
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeTokenError(parts.extensions.get::<TokenError>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(uri: &str) -> Option<String> {
        callback_code(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn callback_code_takes_first_code_parameter() {
        assert_eq!(
            code_of("/cb?code=good-code&code=x").as_deref(),
            Some("good-code")
        );
        assert_eq!(
            code_of("/cb?state=s&code=a%2Bb").as_deref(),
            Some("a+b")
        );
    }

    #[test]
    fn callback_code_is_none_without_code() {
        assert_eq!(code_of("/cb"), None);
        assert_eq!(code_of("/cb?state=test-state"), None);
    }
}
