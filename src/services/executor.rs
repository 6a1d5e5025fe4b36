// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request execution.
//!
//! Every Mirror API call goes through [`AuthenticatedExecutor::execute`],
//! which:
//! - injects the session's current bearer token
//! - classifies the response body (success, remote error, invalid credentials)
//! - on invalid credentials, refreshes the access token once and replays
//!   the call with the new token
//!
//! Refreshes are single-flight per session: callers that were rejected with
//! the same token generation wait for one refresh and share its outcome.

use crate::db::TokenStore;
use crate::error::AppError;
use crate::services::oauth::OAuthClient;
use crate::services::session::{AuthSession, RefreshFailure, TokenSnapshot};
use chrono::{Duration, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

/// Body the provider sends when the access token is no longer valid.
pub const INVALID_CREDENTIALS: &str = "Invalid Credentials";

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Refreshes allowed within one logical call, proactive ones included.
const MAX_REFRESHES_PER_CALL: u8 = 1;

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
}

/// Description of one outbound API call.
///
/// Any `Authorization` header set here is replaced with the session's
/// bearer token at send time.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Response body after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

/// Successful API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Body as a JSON value. Text bodies become JSON strings.
    pub fn into_value(self) -> Result<Value, AppError> {
        match self.body {
            ResponseBody::Empty => Ok(Value::Null),
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => Ok(Value::String(text)),
            ResponseBody::Binary(_) => Err(AppError::Remote(
                "Expected JSON response, got binary data".to_string(),
            )),
        }
    }

    /// Deserialize a JSON body into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, AppError> {
        serde_json::from_value(self.into_value()?)
            .map_err(|e| AppError::Remote(format!("JSON parse error: {}", e)))
    }

    /// Raw body bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.body {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Json(value) => value.to_string().into_bytes(),
            ResponseBody::Text(text) => text.into_bytes(),
            ResponseBody::Binary(bytes) => bytes,
        }
    }
}

/// What a raw response body means to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Success(ResponseBody),
    InvalidCredentials,
    RemoteError(String),
}

/// Classify a raw response body.
///
/// Only JSON objects with an `error.message` are treated as errors, plus
/// the literal invalid-credentials body. Everything else, including
/// primitives and non-JSON bodies, is an opaque success payload.
pub fn classify(raw: &[u8]) -> Classified {
    if raw.is_empty() {
        return Classified::Success(ResponseBody::Empty);
    }

    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(obj)) => {
            let message = obj
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string);
            match message.as_deref() {
                Some(INVALID_CREDENTIALS) => Classified::InvalidCredentials,
                Some(message) => Classified::RemoteError(message.to_string()),
                None => Classified::Success(ResponseBody::Json(Value::Object(obj))),
            }
        }
        Ok(Value::String(s)) if s == INVALID_CREDENTIALS => Classified::InvalidCredentials,
        Ok(value) => Classified::Success(ResponseBody::Json(value)),
        Err(_) => match std::str::from_utf8(raw) {
            Ok(INVALID_CREDENTIALS) => Classified::InvalidCredentials,
            Ok(text) => Classified::Success(ResponseBody::Text(text.to_string())),
            Err(_) => Classified::Success(ResponseBody::Binary(raw.to_vec())),
        },
    }
}

/// Executes API calls on behalf of a session, refreshing tokens as needed.
#[derive(Clone)]
pub struct AuthenticatedExecutor<S> {
    http: reqwest::Client,
    oauth: OAuthClient,
    store: S,
}

impl<S: TokenStore> AuthenticatedExecutor<S> {
    pub fn new(http: reqwest::Client, oauth: OAuthClient, store: S) -> Self {
        Self { http, oauth, store }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one logical API call under a valid access token.
    ///
    /// The call is replayed at most once, after a successful refresh. A
    /// second invalid-credentials response fails with
    /// [`AppError::AuthExpired`].
    pub async fn execute(
        &self,
        session: &AuthSession,
        spec: &RequestSpec,
    ) -> Result<ApiResponse, AppError> {
        let mut refreshes_left = MAX_REFRESHES_PER_CALL;
        let mut snapshot = session.snapshot().await;

        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if !snapshot.tokens.is_usable() || snapshot.tokens.expires_within(Utc::now(), margin) {
            tracing::debug!(
                generation = snapshot.generation,
                "Access token expiring, refreshing before call"
            );
            snapshot = self
                .refresh(session, snapshot.generation, Instant::now())
                .await?;
            refreshes_left -= 1;
        }

        loop {
            let sent_at = Instant::now();
            let (status, raw) = self.send(spec, &snapshot.tokens.access_token).await?;

            match classify(&raw) {
                Classified::Success(body) => return Ok(ApiResponse { status, body }),
                Classified::RemoteError(message) => {
                    tracing::debug!(url = %spec.url, error = %message, "Remote API error");
                    return Err(AppError::Remote(message));
                }
                Classified::InvalidCredentials if refreshes_left == 0 => {
                    tracing::warn!(
                        url = %spec.url,
                        generation = snapshot.generation,
                        "Credentials rejected after refresh"
                    );
                    return Err(AppError::AuthExpired);
                }
                Classified::InvalidCredentials => {
                    tracing::info!(
                        url = %spec.url,
                        generation = snapshot.generation,
                        "Access token rejected, refreshing"
                    );
                    snapshot = self.refresh(session, snapshot.generation, sent_at).await?;
                    refreshes_left -= 1;
                }
            }
        }
    }

    /// Single-flight refresh for `session`.
    ///
    /// `observed_generation` is the token generation the caller was using
    /// and `observed_at` when it started using it. If another caller has
    /// already moved the session past that generation, its tokens are
    /// reused. If another caller's refresh of the same generation failed
    /// after `observed_at`, that failure is shared instead of retried.
    async fn refresh(
        &self,
        session: &AuthSession,
        observed_generation: u64,
        observed_at: Instant,
    ) -> Result<TokenSnapshot, AppError> {
        let mut state = session.lock_refresh().await;

        let current = session.snapshot().await;
        if current.generation != observed_generation {
            tracing::debug!(
                generation = current.generation,
                "Tokens already refreshed by concurrent call"
            );
            return Ok(current);
        }

        if let Some(failure) = &state.last_failure {
            if failure.generation == observed_generation && failure.at >= observed_at {
                return Err(AppError::RefreshFailed(failure.message.clone()));
            }
        }

        match self.refresh_and_persist(session, &current).await {
            Ok(snapshot) => {
                state.last_failure = None;
                tracing::info!(generation = snapshot.generation, "Access token refreshed");
                Ok(snapshot)
            }
            Err(message) => {
                tracing::warn!(error = %message, "Access token refresh failed");
                state.last_failure = Some(RefreshFailure {
                    generation: observed_generation,
                    at: Instant::now(),
                    message: message.clone(),
                });
                Err(AppError::RefreshFailed(message))
            }
        }
    }

    /// Exchange the refresh token, persist, then update the session.
    ///
    /// The store write completes before the session changes, so a failed
    /// write leaves both the session and the store on the old tokens.
    async fn refresh_and_persist(
        &self,
        session: &AuthSession,
        current: &TokenSnapshot,
    ) -> Result<TokenSnapshot, String> {
        let refresh_token = current
            .tokens
            .refresh_token
            .clone()
            .ok_or_else(|| "Session has no refresh token".to_string())?;

        let refreshed = self
            .oauth
            .refresh_tokens(&refresh_token)
            .await
            .map_err(|e| e.to_string())?;

        match refreshed.refresh_token.as_deref() {
            Some(rotated) if rotated != refresh_token => {
                let mut record = self
                    .store
                    .get(&refresh_token)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| "No token record for refresh token".to_string())?;
                record.access_token = refreshed.access_token.clone();
                record.refresh_token = rotated.to_string();
                record.expires = refreshed.expires_at;
                self.store.upsert(&record).await.map_err(|e| e.to_string())?;
            }
            _ => {
                self.store
                    .update_access_token(
                        &refresh_token,
                        &refreshed.access_token,
                        refreshed.expires_at,
                    )
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }

        session.apply_refresh(refreshed).await;
        Ok(session.snapshot().await)
    }

    async fn send(
        &self,
        spec: &RequestSpec,
        access_token: &str,
    ) -> Result<(StatusCode, Vec<u8>), AppError> {
        let mut request = self.http.request(spec.method.clone(), &spec.url);

        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.bearer_auth(access_token);
        if let RequestBody::Json(body) = &spec.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        let raw = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        Ok((status, raw.to_vec()))
    }
}
