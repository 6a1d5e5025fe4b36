// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization-code flow.
//!
//! `connect` decides whether a session must (re)authorize, and `remember`
//! turns the provider's callback into an [`AuthSession`]. A session is only
//! returned once tokens, profile and persisted record all exist.

use crate::db::TokenStore;
use crate::error::AppError;
use crate::models::PersistedTokenRecord;
use crate::services::mirror::MirrorClient;
use crate::services::session::AuthSession;
use serde::Deserialize;

/// Query parameters of the provider callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a connect attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// The user must visit this URI to authorize.
    Redirect(String),
    /// The session is authorized and its credentials still work.
    Connected,
}

/// Drives the authorization-code flow for one provider.
#[derive(Clone)]
pub struct AuthFlow<S> {
    mirror: MirrorClient<S>,
}

impl<S: TokenStore> AuthFlow<S> {
    pub fn new(mirror: MirrorClient<S>) -> Self {
        Self { mirror }
    }

    pub fn authorization_uri(&self) -> String {
        self.mirror.executor().oauth().authorization_uri()
    }

    /// Start or confirm authorization.
    ///
    /// Without a session the user is sent to the provider. With one, a
    /// lightweight call confirms the credentials still work; failures that
    /// need a new consent send the user back to the provider.
    pub async fn connect(&self, session: Option<&AuthSession>) -> ConnectOutcome {
        let Some(session) = session else {
            tracing::info!("No session, redirecting to provider");
            return ConnectOutcome::Redirect(self.authorization_uri());
        };

        match self.mirror.list_locations(session).await {
            Ok(_) => ConnectOutcome::Connected,
            Err(e) if e.requires_reauthorization() => {
                tracing::info!(
                    user_id = %session.profile().id,
                    error = %e,
                    "Session credentials unusable, redirecting to provider"
                );
                ConnectOutcome::Redirect(self.authorization_uri())
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %session.profile().id,
                    error = %e,
                    "Session confirmation call failed, keeping session"
                );
                ConnectOutcome::Connected
            }
        }
    }

    /// Handle the provider callback: exchange the code, fetch the profile
    /// and persist the token record.
    pub async fn remember(&self, params: &CallbackParams) -> Result<AuthSession, AppError> {
        if let Some(error) = params.error.as_deref() {
            tracing::warn!(error = %error, "OAuth error from provider");
            return Err(AppError::AuthenticationFailed(format!(
                "Provider returned error: {}",
                error
            )));
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::AuthenticationFailed("Missing authorization code".into()))?;

        let oauth = self.mirror.executor().oauth();
        let store = self.mirror.executor().store();

        tracing::info!("Exchanging authorization code for tokens");
        let mut tokens = oauth.exchange_code(code).await?;
        let profile = oauth.fetch_user_profile(&tokens.access_token).await?;

        // Google only issues a refresh token on first consent.
        let refresh_token = match tokens.refresh_token.clone() {
            Some(token) => token,
            None => store
                .find_by_user(&profile.id)
                .await?
                .map(|record| record.refresh_token)
                .ok_or_else(|| {
                    AppError::AuthenticationFailed(
                        "Provider issued no refresh token and none is on record".to_string(),
                    )
                })?,
        };
        tokens.refresh_token = Some(refresh_token.clone());

        let record = PersistedTokenRecord {
            code: code.to_string(),
            profile: profile.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token,
            expires: tokens.expires_at,
        };
        store.upsert(&record).await?;

        tracing::info!(
            user_id = %profile.id,
            name = %profile.name,
            "OAuth callback handled, tokens stored"
        );

        Ok(AuthSession::new(code.to_string(), profile, tokens))
    }
}
