// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::Utc;
use glass_mirror::config::Config;
use glass_mirror::db::{MemoryTokenStore, TokenBackend, TokenStore};
use glass_mirror::models::{PersistedTokenRecord, TokenSet, UserProfile};
use glass_mirror::routes::create_router;
use glass_mirror::services::{AuthFlow, AuthSession, AuthenticatedExecutor, MirrorClient, OAuthClient};
use glass_mirror::AppState;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/o/oauth2/token";
pub const USERINFO_PATH: &str = "/oauth2/v1/userinfo";
pub const LOCATIONS_PATH: &str = "/mirror/v1/locations";
pub const TIMELINE_PATH: &str = "/mirror/v1/timeline";

#[allow(dead_code)]
pub fn test_profile() -> UserProfile {
    UserProfile {
        id: "1234567890".to_string(),
        name: "Ada Lovelace".to_string(),
        given_name: Some("Ada".to_string()),
        family_name: Some("Lovelace".to_string()),
        picture: None,
        locale: Some("en".to_string()),
    }
}

/// Build a Mirror client whose endpoints all point at `server`.
#[allow(dead_code)]
pub fn mirror_client(server: &MockServer, store: MemoryTokenStore) -> MirrorClient<MemoryTokenStore> {
    let config = Config::test_default_with_base(&server.uri());
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .expect("http client");
    let oauth = OAuthClient::with_http(Arc::new(config.oauth.clone()), http.clone());
    let executor = AuthenticatedExecutor::new(http, oauth, store);
    MirrorClient::new(executor, config.oauth.mirror_base_uri())
}

#[allow(dead_code)]
pub fn auth_flow(server: &MockServer, store: MemoryTokenStore) -> AuthFlow<MemoryTokenStore> {
    AuthFlow::new(mirror_client(server, store))
}

/// Persist a record for the given tokens and return the matching session.
///
/// A negative `expires_in` produces an already-expired access token.
#[allow(dead_code)]
pub async fn seeded_session(
    store: &MemoryTokenStore,
    access_token: &str,
    refresh_token: &str,
    expires_in: i64,
) -> AuthSession {
    let tokens = TokenSet::from_lifetime(
        access_token.to_string(),
        Some(refresh_token.to_string()),
        Some(expires_in),
        None,
        Utc::now(),
    );

    store
        .upsert(&PersistedTokenRecord {
            code: "4/test-code".to_string(),
            profile: test_profile(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires: tokens.expires_at,
        })
        .await
        .expect("seed record");

    AuthSession::new("4/test-code".to_string(), test_profile(), tokens)
}

/// Token endpoint answering refresh grants with `access_token`.
#[allow(dead_code)]
pub fn refresh_mock(access_token: &str, delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "access_token": access_token,
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }))
                .set_delay(delay),
        )
}

/// Token endpoint rejecting refresh grants.
#[allow(dead_code)]
pub fn refresh_rejected_mock(delay: Duration) -> Mock {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({
                    "error": "invalid_grant",
                    "error_description": "Token has been expired or revoked."
                }))
                .set_delay(delay),
        )
}

/// Create a test app backed by an in-memory store and `server`.
#[allow(dead_code)]
pub fn create_test_app(server: &MockServer) -> (axum::Router, Arc<AppState>, MemoryTokenStore) {
    let config = Config::test_default_with_base(&server.uri());
    let store = MemoryTokenStore::new();
    let state = Arc::new(
        AppState::new(config, TokenBackend::Memory(store.clone())).expect("app state"),
    );
    (create_router(state.clone()), state, store)
}
