// Integration tests for registration, activation and token issuance

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{setup_test_app, TEST_PASSWORD};

#[tokio::test]
async fn test_register_activate_and_login() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/users")
        .json(&json!({
            "name": "Alice Smith",
            "email": "alice@example.com",
            "password": TEST_PASSWORD
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body: Value = response.json().await;
    assert_eq!(body["user"]["name"], "Alice Smith");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"]["created_at"].is_string());
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("version").is_none());

    let token = app.notifier.token_for("alice@example.com").unwrap();
    assert_eq!(token.len(), 26);

    let response = app
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["user"]["activated"], true);

    let response = app
        .post("/v1/tokens/authentication")
        .json(&json!({ "email": "alice@example.com", "password": TEST_PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    assert_eq!(
        body["authentication_token"]["token"].as_str().unwrap().len(),
        26
    );
    assert!(body["authentication_token"]["expiry"].is_string());
}

#[tokio::test]
async fn test_registration_validation_errors() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/users")
        .json(&json!({ "name": "", "email": "not-an-email", "password": "short" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json().await;
    assert_eq!(body["error"]["name"], "must be provided");
    assert_eq!(body["error"]["email"], "must be a valid email address");
    assert_eq!(body["error"]["password"], "must be at least 8 bytes long");
    assert_eq!(app.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_registration_with_existing_email() {
    let app = setup_test_app().await;
    app.register("Alice", "alice@example.com").await;

    let response = app
        .post("/v1/users")
        .json(&json!({
            "name": "Another Alice",
            "email": "alice@example.com",
            "password": TEST_PASSWORD
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json().await;
    assert_eq!(
        body["error"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/users")
        .raw_json("{\"name\": \"Alice\",")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_activation_token_is_single_use() {
    let app = setup_test_app().await;
    app.register("Bob", "bob@example.com").await;
    let token = app.notifier.token_for("bob@example.com").unwrap();

    let first = app
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .send()
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .send()
        .await;
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = second.json().await;
    assert_eq!(body["error"]["token"], "invalid or expired activation token");
}

#[tokio::test]
async fn test_activation_token_format_checked() {
    let app = setup_test_app().await;

    let response = app
        .put("/v1/users/activated")
        .json(&json!({ "token": "too-short" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await;
    assert_eq!(body["error"]["token"], "must be 26 bytes long");
}

#[tokio::test]
async fn test_expired_activation_token() {
    let app = setup_test_app().await;
    app.register("Carol", "carol@example.com").await;
    let token = app.notifier.token_for("carol@example.com").unwrap();

    app.store.advance_clock(chrono::Duration::days(4));

    let response = app
        .put("/v1/users/activated")
        .json(&json!({ "token": token }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_credentials() {
    let app = setup_test_app().await;
    app.activated_user("dave@example.com").await;

    let wrong_password = app
        .post("/v1/tokens/authentication")
        .json(&json!({ "email": "dave@example.com", "password": "not-the-password" }))
        .send()
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let body: Value = wrong_password.json().await;
    assert_eq!(body["error"], "invalid authentication credentials");

    let unknown_email = app
        .post("/v1/tokens/authentication")
        .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
        .send()
        .await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_user_can_still_get_a_token() {
    let app = setup_test_app().await;
    app.register("Erin", "erin@example.com").await;

    let token = app.login("erin@example.com").await;
    assert_eq!(token.len(), 26);
}

#[tokio::test]
async fn test_current_user_lists_permissions() {
    let app = setup_test_app().await;
    let id = app.activated_user("frank@example.com").await;
    app.grant(id, &["movies:write"]).await;
    let token = app.login("frank@example.com").await;

    let response = app.get("/v1/users/me").bearer(&token).send().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await;
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["permissions"], json!(["movies:read", "movies:write"]));
}

#[tokio::test]
async fn test_login_email_ignores_case() {
    let app = setup_test_app().await;
    app.activated_user("Quinn@Example.com").await;

    let response = app
        .post("/v1/tokens/authentication")
        .json(&json!({ "email": "quinn@example.com", "password": TEST_PASSWORD }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_missing_fields_fail_validation() {
    let app = setup_test_app().await;

    let response = app.put("/v1/users/activated").raw_json("{}").send().await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await;
    assert_eq!(body["error"]["token"], "must be provided");

    let response = app.post("/v1/users").raw_json("{}").send().await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await;
    assert_eq!(body["error"]["name"], "must be provided");
    assert_eq!(body["error"]["email"], "must be provided");
    assert_eq!(body["error"]["password"], "must be provided");

    let response = app
        .post("/v1/tokens/authentication")
        .raw_json("{}")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
