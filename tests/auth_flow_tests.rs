// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization-code flow tests against a mocked provider.

use glass_mirror::db::{MemoryTokenStore, TokenStore};
use glass_mirror::error::AppError;
use glass_mirror::models::PersistedTokenRecord;
use glass_mirror::services::{CallbackParams, ConnectOutcome};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{
    auth_flow, refresh_rejected_mock, seeded_session, test_profile, LOCATIONS_PATH, TOKEN_PATH,
    USERINFO_PATH,
};

fn callback(code: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.to_string()),
        state: Some("default".to_string()),
        error: None,
    }
}

fn exchange_mock(response: ResponseTemplate) -> Mock {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(response)
}

fn token_response(refresh_token: Option<&str>) -> ResponseTemplate {
    let mut body = json!({
        "access_token": "ya29.access",
        "expires_in": 3599,
        "token_type": "Bearer"
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

fn userinfo_mock() -> Mock {
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .and(query_param("access_token", "ya29.access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1234567890",
            "name": "Ada Lovelace",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "locale": "en"
        })))
}

#[tokio::test]
async fn test_missing_code_fails_without_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let flow = auth_flow(&server, store.clone());

    let result = flow.remember(&CallbackParams::default()).await;
    assert!(matches!(result, Err(AppError::AuthenticationFailed(_))));

    let result = flow.remember(&callback("")).await;
    assert!(matches!(result, Err(AppError::AuthenticationFailed(_))));

    assert!(store.is_empty());
}

#[tokio::test]
async fn test_provider_error_parameter_fails() {
    let server = MockServer::start().await;
    let flow = auth_flow(&server, MemoryTokenStore::new());

    let params = CallbackParams {
        code: None,
        state: Some("default".to_string()),
        error: Some("access_denied".to_string()),
    };

    match flow.remember(&params).await {
        Err(AppError::AuthenticationFailed(msg)) => assert!(msg.contains("access_denied")),
        other => panic!("expected AuthenticationFailed, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn test_successful_callback_persists_record() {
    let server = MockServer::start().await;
    exchange_mock(token_response(Some("1//fresh-refresh")))
        .expect(1)
        .mount(&server)
        .await;
    userinfo_mock().expect(1).mount(&server).await;

    let store = MemoryTokenStore::new();
    let flow = auth_flow(&server, store.clone());

    let session = flow.remember(&callback("4/auth-code")).await.unwrap();

    assert_eq!(session.code(), "4/auth-code");
    assert_eq!(session.profile(), &test_profile());
    assert_eq!(session.access_token().await, "ya29.access");
    assert_eq!(session.refresh_token().await.as_deref(), Some("1//fresh-refresh"));

    let record = store.get("1//fresh-refresh").await.unwrap().unwrap();
    assert_eq!(record.code, "4/auth-code");
    assert_eq!(record.profile.id, "1234567890");
    assert_eq!(record.access_token, "ya29.access");
    assert!(record.expires > chrono::Utc::now());
}

#[tokio::test]
async fn test_exchange_failure_persists_nothing() {
    let server = MockServer::start().await;
    exchange_mock(ResponseTemplate::new(400).set_body_json(json!({
        "error": "invalid_grant",
        "error_description": "Malformed auth code."
    })))
    .expect(1)
    .mount(&server)
    .await;
    userinfo_mock().expect(0).mount(&server).await;

    let store = MemoryTokenStore::new();
    let result = auth_flow(&server, store.clone())
        .remember(&callback("4/bad-code"))
        .await;

    assert!(matches!(result, Err(AppError::AuthExchange(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_profile_failure_persists_nothing() {
    let server = MockServer::start().await;
    exchange_mock(token_response(Some("1//fresh-refresh")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let result = auth_flow(&server, store.clone())
        .remember(&callback("4/auth-code"))
        .await;

    assert!(matches!(result, Err(AppError::AuthExchange(_))));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_returning_user_reuses_stored_refresh_token() {
    let server = MockServer::start().await;
    exchange_mock(token_response(None)).mount(&server).await;
    userinfo_mock().mount(&server).await;

    let store = MemoryTokenStore::new();
    store
        .upsert(&PersistedTokenRecord {
            code: "4/first-code".to_string(),
            profile: test_profile(),
            access_token: "ya29.old".to_string(),
            refresh_token: "1//original".to_string(),
            expires: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let session = auth_flow(&server, store.clone())
        .remember(&callback("4/second-code"))
        .await
        .unwrap();

    assert_eq!(session.refresh_token().await.as_deref(), Some("1//original"));
    let record = store.get("1//original").await.unwrap().unwrap();
    assert_eq!(record.code, "4/second-code");
    assert_eq!(record.access_token, "ya29.access");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_no_refresh_token_anywhere_fails() {
    let server = MockServer::start().await;
    exchange_mock(token_response(None)).mount(&server).await;
    userinfo_mock().mount(&server).await;

    let store = MemoryTokenStore::new();
    let result = auth_flow(&server, store.clone())
        .remember(&callback("4/auth-code"))
        .await;

    assert!(matches!(result, Err(AppError::AuthenticationFailed(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_connect_without_session_redirects() {
    let server = MockServer::start().await;
    let flow = auth_flow(&server, MemoryTokenStore::new());

    match flow.connect(None).await {
        ConnectOutcome::Redirect(uri) => {
            assert!(uri.starts_with(&format!("{}/o/oauth2/auth?", server.uri())));
            assert!(uri.contains("access_type=offline"));
            assert!(uri.contains("state=default"));
        }
        other => panic!("expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connect_with_working_session_is_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = seeded_session(&store, "ya29.access", "1//refresh", 3600).await;

    let outcome = auth_flow(&server, store).connect(Some(&session)).await;
    assert_eq!(outcome, ConnectOutcome::Connected);
}

#[tokio::test]
async fn test_connect_with_revoked_session_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;
    refresh_rejected_mock(Duration::ZERO)
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = seeded_session(&store, "ya29.access", "1//refresh", 3600).await;

    let outcome = auth_flow(&server, store).connect(Some(&session)).await;
    assert!(matches!(outcome, ConnectOutcome::Redirect(_)));
}

#[tokio::test]
async fn test_connect_ignores_unrelated_remote_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": 500, "message": "Backend Error"}
        })))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let session = seeded_session(&store, "ya29.access", "1//refresh", 3600).await;

    let outcome = auth_flow(&server, store).connect(Some(&session)).await;
    assert_eq!(outcome, ConnectOutcome::Connected);
}
