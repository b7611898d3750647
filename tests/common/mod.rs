//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const CALLBACK_URL: &str = "https://app.example.com/auth/reddit/callback";
/// `Basic base64(CLIENT_ID:CLIENT_SECRET)`
pub const BASIC_AUTH: &str = "Basic dGVzdC1jbGllbnQtaWQ6dGVzdC1jbGllbnQtc2VjcmV0";

/// Code the stub exchanges successfully
pub const GOOD_CODE: &str = "good-code";
/// Code the stub rejects with a 200 `{"error": "invalid_grant"}` body
pub const QUIRK_CODE: &str = "quirk-code";

/// A token request received by the stub
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub form: HashMap<String, String>,
}

type Recorded = Arc<Mutex<Vec<TokenRequest>>>;

/// Stub of Reddit's token endpoint
pub struct StubReddit {
    pub addr: String,
    requests: Recorded,
}

impl StubReddit {
    pub async fn start() -> Self {
        let requests: Recorded = Arc::default();
        let app = Router::new()
            .route("/api/v1/access_token", post(token_endpoint))
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    /// Adapter configuration pointing the token endpoint at this stub
    pub fn config(&self, overrides: Value) -> Value {
        let mut config = json!({
            "client_id": CLIENT_ID,
            "client_secret": CLIENT_SECRET,
            "callback_url": CALLBACK_URL,
            "state": "test-state",
            "token_host": self.addr,
            "user_agent": "reddit-oauth-tests/1.0",
        });
        for (key, value) in overrides.as_object().unwrap() {
            config[key] = value.clone();
        }
        config
    }

    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn token_endpoint(
    State(requests): State<Recorded>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
    };
    requests.lock().unwrap().push(TokenRequest {
        authorization: header("authorization"),
        user_agent: header("user-agent"),
        form: form.clone(),
    });

    if form.get("grant_type").map(String::as_str) == Some("refresh_token") {
        return Json(json!({
            "access_token": "reddit-access-refreshed",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "identity",
        }))
        .into_response();
    }

    match form.get("code").map(String::as_str) {
        Some(GOOD_CODE) => Json(json!({
            "access_token": "reddit-access",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "identity",
            "refresh_token": "reddit-refresh",
        }))
        .into_response(),
        Some(QUIRK_CODE) => Json(json!({ "error": "invalid_grant" })).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized", "error": 401 })),
        )
            .into_response(),
    }
}

/// Send a GET request through the router without binding a port
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
