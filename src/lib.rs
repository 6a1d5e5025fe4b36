// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Glass-Mirror: act on behalf of a Google Glass user against the Mirror API.
//!
//! This crate owns the OAuth 2.0 credential lifecycle: the authorization
//! code exchange, token persistence, and transparent refresh-and-retry of
//! API calls rejected for expired credentials.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::TokenBackend;
use error::AppError;
use services::{AuthFlow, AuthenticatedExecutor, MirrorClient, OAuthClient, SessionRegistry};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub mirror: MirrorClient<TokenBackend>,
    pub auth_flow: AuthFlow<TokenBackend>,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Wire up the services around one HTTP client and token store.
    pub fn new(config: Config, store: TokenBackend) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        let oauth_config = Arc::new(config.oauth.clone());
        let oauth = OAuthClient::with_http(oauth_config, http.clone());
        let executor = AuthenticatedExecutor::new(http, oauth, store);
        let mirror = MirrorClient::new(executor, config.oauth.mirror_base_uri());
        let auth_flow = AuthFlow::new(mirror.clone());

        Ok(Self {
            config,
            mirror,
            auth_flow,
            sessions: SessionRegistry::new(),
        })
    }
}
