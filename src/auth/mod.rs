//! Reddit OAuth authentication
//!
//! Handles:
//! - Authorize redirect
//! - Authorization code exchange middleware
//! - Token extractors

mod middleware;
mod oauth;

pub use middleware::{MaybeTokenError, RedditToken, TokenError, access_token};
pub use oauth::{RedditOAuth, authorize, reddit_router};
