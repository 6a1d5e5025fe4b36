// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 client.
//!
//! Handles:
//! - Building the authorization redirect URI
//! - Authorization code exchange
//! - Refresh token exchange
//! - User profile lookup

use crate::config::OAuthConfig;
use crate::error::AuthExchangeError;
use crate::models::{TokenSet, UserProfile};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Fixed `state` marker sent with every authorization request.
pub const AUTH_STATE: &str = "default";

/// Assemble the provider authorization URI.
///
/// Pure function of the configuration; every parameter appears once.
pub fn build_authorization_uri(config: &OAuthConfig) -> String {
    format!(
        "{}?response_type=code&\
         client_id={}&\
         redirect_uri={}&\
         scope={}&\
         state={}&\
         access_type=offline&\
         approval_prompt=auto",
        config.auth_uri(),
        urlencoding::encode(config.client_id()),
        urlencoding::encode(config.callback_uri()),
        urlencoding::encode(&config.scopes().join(" ")),
        AUTH_STATE,
    )
}

/// Client for the provider's token and user-info endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: Arc<OAuthConfig>,
}

impl OAuthClient {
    /// Create a client sharing an existing connection pool.
    pub fn with_http(config: Arc<OAuthConfig>, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn authorization_uri(&self) -> String {
        build_authorization_uri(&self.config)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthExchangeError> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret()),
            ("redirect_uri", self.config.callback_uri()),
            ("grant_type", "authorization_code"),
        ];

        let tokens = self.post_token_form(&form).await?;
        tracing::info!(
            has_refresh_token = tokens.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Trade a refresh token for a new access token.
    ///
    /// When the provider does not rotate the refresh token, the returned set
    /// carries `refresh_token` so callers never lose it.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenSet, AuthExchangeError> {
        let form = [
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let mut tokens = self.post_token_form(&form).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    /// Fetch the profile of the user owning `access_token`.
    pub async fn fetch_user_profile(
        &self,
        access_token: &str,
    ) -> Result<UserProfile, AuthExchangeError> {
        let response = self
            .http
            .get(self.config.userinfo_uri())
            .query(&[("alt", "json"), ("access_token", access_token)])
            .send()
            .await
            .map_err(|e| AuthExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthExchangeError::Transport(e.to_string()))?;

        if let Some(message) = provider_error(&body) {
            return Err(AuthExchangeError::Provider(message));
        }
        if !status.is_success() {
            return Err(AuthExchangeError::Provider(format!("HTTP {}", status)));
        }

        serde_json::from_str(&body).map_err(|e| AuthExchangeError::Malformed(e.to_string()))
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenSet, AuthExchangeError> {
        let response = self
            .http
            .post(self.config.token_uri())
            .form(form)
            .send()
            .await
            .map_err(|e| AuthExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthExchangeError::Transport(e.to_string()))?;

        parse_token_response(status, &body)
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    token_type: Option<String>,
}

fn parse_token_response(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<TokenSet, AuthExchangeError> {
    if let Some(message) = provider_error(body) {
        tracing::warn!(status = %status, error = %message, "Token endpoint returned error");
        return Err(AuthExchangeError::Provider(message));
    }

    let response: TokenResponse = serde_json::from_str(body).map_err(|e| {
        if status.is_success() {
            AuthExchangeError::Malformed(e.to_string())
        } else {
            AuthExchangeError::Provider(format!("HTTP {}", status))
        }
    })?;

    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthExchangeError::Malformed("missing access_token".to_string()))?;

    Ok(TokenSet::from_lifetime(
        access_token,
        response.refresh_token,
        response.expires_in.as_ref().and_then(parse_lifetime),
        response.token_type,
        Utc::now(),
    ))
}

/// Accept integer lifetimes sent either as numbers or as numeric strings.
fn parse_lifetime(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract an OAuth error from a JSON body, if it carries one.
///
/// Handles both `{"error": "invalid_grant", "error_description": ...}` and
/// the API style `{"error": {"message": ...}}`.
fn provider_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.as_object()?.get("error")?;

    match error {
        serde_json::Value::String(code) => {
            let description = value
                .get("error_description")
                .and_then(|d| d.as_str())
                .filter(|d| !d.is_empty());
            Some(match description {
                Some(d) => format!("{}: {}", code, d),
                None => code.clone(),
            })
        }
        serde_json::Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    }
}
