//! E2E tests for the authorization code exchange middleware

mod common;

use axum::http::StatusCode;
use common::{
    BASIC_AUTH, CALLBACK_URL, CLIENT_ID, CLIENT_SECRET, GOOD_CODE, QUIRK_CODE, StubReddit,
    body_json, get,
};
use reddit_oauth::{AdapterError, ConfigSource, ExchangeError, RedditOAuth, build_router};
use serde_json::json;

#[tokio::test]
async fn test_missing_code_stops_pipeline_without_token_request() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    let response = get(build_router(adapter), "/auth/reddit/callback?state=test-state").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "RedditOAuth expects [code] param in the request"
    );
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_valid_code_attaches_token_and_continues() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    let response = get(
        build_router(adapter),
        &format!("/auth/reddit/callback?code={GOOD_CODE}&state=test-state"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["scope"], "identity");
    assert_eq!(body["has_refresh_token"], true);
    assert!(body["expires_at"].is_string());

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some(BASIC_AUTH));
    assert_eq!(request.user_agent.as_deref(), Some("reddit-oauth-tests/1.0"));
    assert_eq!(request.form["grant_type"], "authorization_code");
    assert_eq!(request.form["code"], GOOD_CODE);
    assert_eq!(request.form["state"], "test-state");
    assert_eq!(request.form["client_id"], CLIENT_ID);
    assert_eq!(request.form["client_secret"], CLIENT_SECRET);
    assert_eq!(request.form["redirect_uri"], CALLBACK_URL);
}

#[tokio::test]
async fn test_repeated_code_uses_first_value() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    let response = get(
        build_router(adapter),
        &format!("/auth/reddit/callback?code={GOOD_CODE}&code=x&state=test-state"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].form["code"], GOOD_CODE);
}

#[tokio::test]
async fn test_rejected_code_aborts_pipeline_by_default() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    let response = get(build_router(adapter), "/auth/reddit/callback?code=expired").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert!(body.get("token_error").is_none());
    assert!(body["error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_rejected_code_is_attached_when_return_error_is_set() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({ "return_error": true }))).unwrap();

    let response = get(build_router(adapter), "/auth/reddit/callback?code=expired").await;

    // The downstream handler ran and rendered the attached error.
    let body = body_json(response).await;
    assert!(body.get("error").is_none());
    assert!(body["token_error"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_error_body_with_success_status_is_a_failure() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    match adapter.exchange(Some(QUIRK_CODE)).await {
        Err(AdapterError::Exchange(error)) => match error.as_ref() {
            ExchangeError::Provider { status, error, .. } => {
                assert_eq!(*status, 200);
                assert_eq!(error, "invalid_grant");
            }
            other => panic!("expected provider error, got {other:?}"),
        },
        other => panic!("expected exchange error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forged_code_in_token_options_is_ignored() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({
        "token_options": { "code": "forged", "device_id": "DO_NOT_TRACK_THIS_DEVICE" }
    })))
    .unwrap();

    let token = adapter.exchange(Some(GOOD_CODE)).await.unwrap();
    assert_eq!(token.access_token(), Some("reddit-access"));

    let requests = stub.requests();
    assert_eq!(requests[0].form["code"], GOOD_CODE);
    assert_eq!(requests[0].form["device_id"], "DO_NOT_TRACK_THIS_DEVICE");
}

#[tokio::test]
async fn test_refresh_uses_refresh_token_grant() {
    let stub = StubReddit::start().await;
    let adapter = RedditOAuth::create(stub.config(json!({}))).unwrap();

    let token = adapter.exchange(Some(GOOD_CODE)).await.unwrap();
    let refreshed = adapter.refresh(&token).await.unwrap();
    assert_eq!(refreshed.access_token(), Some("reddit-access-refreshed"));

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].form["grant_type"], "refresh_token");
    assert_eq!(requests[1].form["refresh_token"], "reddit-refresh");
    assert_eq!(requests[1].authorization.as_deref(), Some(BASIC_AUTH));
}

#[tokio::test]
async fn test_factory_config_is_resolved_once_at_creation() {
    let stub = StubReddit::start().await;
    let config = stub.config(json!({ "return_error": true }));

    let adapter = RedditOAuth::create(ConfigSource::factory(move || config.clone())).unwrap();
    assert!(adapter.config().return_error);

    let token = adapter.exchange(Some(GOOD_CODE)).await.unwrap();
    assert!(!token.is_expired());
}
