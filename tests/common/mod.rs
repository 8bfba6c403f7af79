// Common test utilities and helper structs
// Shared across all test files to avoid duplication
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, Response, StatusCode},
    Router,
};
use goplex_backend_core::{
    app::{build_router_with, AppState},
    app_config::{AppConfig, Environment},
    db::{MemoryStore, PermissionStore, Stores},
    models::{Token, User},
    services::{ActivationNotifier, RateLimitConfig},
};
use serde::Serialize;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub const TRUSTED_ORIGIN: &str = "http://localhost:9000";
pub const TEST_PASSWORD: &str = "pa55word";

/// Records every activation token instead of delivering it
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ActivationNotifier for CapturingNotifier {
    async fn send_activation(&self, user: &User, token: &Token) {
        self.sent
            .lock()
            .unwrap()
            .push((user.email.clone(), token.plaintext.clone()));
    }
}

impl CapturingNotifier {
    /// Most recent activation token sent to `email`
    pub fn token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// Configuration for tests: cheap bcrypt, limiter off, one trusted origin
pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Test,
        store_timeout: Duration::from_secs(1),
        bcrypt_cost: 4,
        limiter: RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        },
        cors_trusted_origins: vec![TRUSTED_ORIGIN.to_string()],
        ..AppConfig::default()
    }
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<CapturingNotifier>,
}

impl TestApp {
    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "PUT", uri)
    }

    pub fn request(&self, method: &str, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, method, uri)
    }

    /// Register through the API and return the new user's id
    pub async fn register(&self, name: &str, email: &str) -> i64 {
        let response = self
            .post("/v1/users")
            .json(&json!({ "name": name, "email": email, "password": TEST_PASSWORD }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body: Value = response.json().await;
        body["user"]["id"].as_i64().unwrap()
    }

    /// Register and activate, returning the user's id
    pub async fn activated_user(&self, email: &str) -> i64 {
        let id = self.register("Test User", email).await;
        let token = self.notifier.token_for(email).unwrap();

        let response = self
            .put("/v1/users/activated")
            .json(&json!({ "token": token }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        id
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .post("/v1/tokens/authentication")
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await;
        body["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn grant(&self, user_id: i64, codes: &[&str]) {
        self.store.add_for_user(user_id, codes).await.unwrap();
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    builder: axum::http::request::Builder,
    body: Body,
    peer: Option<SocketAddr>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
            peer: Some("127.0.0.1:12345".parse().unwrap()),
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(serde_json::to_vec(body).unwrap());
        self
    }

    /// Raw body with a JSON content type
    pub fn raw_json(mut self, body: &'static str) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(body);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {}", token))
    }

    /// Set the socket peer address (useful for rate limiting tests)
    pub fn with_ip(mut self, ip: &str) -> Self {
        self.peer = Some(format!("{}:12345", ip).parse().unwrap());
        self
    }

    /// Send without a socket peer, as a router served without connect info would
    pub fn without_peer(mut self) -> Self {
        self.peer = None;
        self
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut request = self.builder.body(self.body).unwrap();
        if let Some(peer) = self.peer {
            request.extensions_mut().insert(ConnectInfo(peer));
        }

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// All values of `name` joined with ", "
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .response
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    pub async fn text(self) -> String {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }
}

/// Setup test application over an in-memory store
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(), |_| Router::new()).await
}

/// Setup with a custom config and extra routes mounted behind the middleware chain
pub async fn setup_test_app_with<F>(config: AppConfig, extra: F) -> TestApp
where
    F: FnOnce(&AppState) -> Router<AppState>,
{
    let store = Arc::new(MemoryStore::new());
    let stores = Stores::from_backend(store.clone());
    setup_test_app_with_stores(config, store, stores, extra).await
}

/// Like `setup_test_app_with`, with individual stores swapped out. `store` is
/// the backend the helpers on `TestApp` talk to.
pub async fn setup_test_app_with_stores<F>(
    config: AppConfig,
    store: Arc<MemoryStore>,
    stores: Stores,
    extra: F,
) -> TestApp
where
    F: FnOnce(&AppState) -> Router<AppState>,
{
    let notifier = Arc::new(CapturingNotifier::default());

    let state = AppState::new(Arc::new(config), stores, notifier.clone()).unwrap();
    let routes = extra(&state);
    let app = build_router_with(state.clone(), routes);

    TestApp {
        app,
        state,
        store,
        notifier,
    }
}
