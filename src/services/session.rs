// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user session state.
//!
//! An [`AuthSession`] is the single source of truth for the tokens used on
//! outbound calls. Every successful refresh bumps its generation, which lets
//! concurrent callers tell whether the token they were rejected with is still
//! current.

use crate::error::AppError;
use crate::models::{PersistedTokenRecord, TokenSet, UserProfile};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;

/// Token set paired with the generation it belongs to.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub tokens: TokenSet,
    pub generation: u64,
}

/// Outcome of the most recent failed refresh, shared with concurrent callers.
#[derive(Debug, Clone)]
pub(crate) struct RefreshFailure {
    pub generation: u64,
    pub at: Instant,
    pub message: String,
}

/// Serializes refreshes for one session.
#[derive(Debug, Default)]
pub(crate) struct RefreshState {
    pub last_failure: Option<RefreshFailure>,
}

/// Authenticated user session.
#[derive(Debug)]
pub struct AuthSession {
    code: String,
    profile: UserProfile,
    tokens: RwLock<TokenSnapshot>,
    refresh: Mutex<RefreshState>,
}

impl AuthSession {
    pub fn new(code: String, profile: UserProfile, tokens: TokenSet) -> Self {
        Self {
            code,
            profile,
            tokens: RwLock::new(TokenSnapshot {
                tokens,
                generation: 0,
            }),
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    /// Rebuild a session from its persisted record.
    pub fn from_record(record: PersistedTokenRecord) -> Self {
        let tokens = TokenSet {
            access_token: record.access_token,
            refresh_token: Some(record.refresh_token),
            expires_at: record.expires,
            token_type: "Bearer".to_string(),
        };
        Self::new(record.code, record.profile, tokens)
    }

    /// Authorization code that produced this session.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Copy of the current tokens and their generation.
    pub async fn snapshot(&self) -> TokenSnapshot {
        self.tokens.read().await.clone()
    }

    pub async fn access_token(&self) -> String {
        self.tokens.read().await.tokens.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.tokens.refresh_token.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.tokens.read().await.generation
    }

    /// Install refreshed tokens, keeping the refresh token if none was issued.
    pub(crate) async fn apply_refresh(&self, refreshed: TokenSet) -> u64 {
        let mut current = self.tokens.write().await;
        current.tokens.apply_refresh(refreshed);
        current.generation += 1;
        current.generation
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, RefreshState> {
        self.refresh.lock().await
    }
}

/// Live sessions keyed by an opaque session ID.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<AuthSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new random session ID.
    pub fn new_session_id(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; 32];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate session ID")))?;
        Ok(hex::encode(bytes))
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<AuthSession>> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// Bind `session` to `session_id`, replacing any previous binding.
    pub fn insert(&self, session_id: String, session: Arc<AuthSession>) {
        self.sessions.insert(session_id, session);
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<AuthSession>> {
        self.sessions.remove(session_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
