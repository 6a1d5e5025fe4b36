// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token persistence.
//!
//! Records are keyed by refresh token. Writes are idempotent upserts, so
//! the only consistency requirement on a backend is atomic per-record
//! update.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryTokenStore;

use crate::error::AppError;
use crate::models::PersistedTokenRecord;
use chrono::{DateTime, Utc};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const TOKENS: &str = "tokens";
}

/// Durable key/value storage for token records.
pub trait TokenStore: Send + Sync {
    /// Look up the record issued with `refresh_token`.
    fn get(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Option<PersistedTokenRecord>, AppError>> + Send;

    /// Look up the most recent record belonging to user `user_id`.
    fn find_by_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<PersistedTokenRecord>, AppError>> + Send;

    /// Create or replace the record keyed by `record.refresh_token`.
    fn upsert(
        &self,
        record: &PersistedTokenRecord,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Replace the access token and expiry of an existing record.
    ///
    /// Fails with [`AppError::Store`] when no record exists for the key.
    fn update_access_token(
        &self,
        refresh_token: &str,
        access_token: &str,
        expires: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Token store selected at startup.
#[derive(Clone)]
pub enum TokenBackend {
    Firestore(FirestoreDb),
    Memory(MemoryTokenStore),
}

impl TokenStore for TokenBackend {
    async fn get(&self, refresh_token: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        match self {
            TokenBackend::Firestore(db) => db.get(refresh_token).await,
            TokenBackend::Memory(mem) => mem.get(refresh_token).await,
        }
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        match self {
            TokenBackend::Firestore(db) => db.find_by_user(user_id).await,
            TokenBackend::Memory(mem) => mem.find_by_user(user_id).await,
        }
    }

    async fn upsert(&self, record: &PersistedTokenRecord) -> Result<(), AppError> {
        match self {
            TokenBackend::Firestore(db) => db.upsert(record).await,
            TokenBackend::Memory(mem) => mem.upsert(record).await,
        }
    }

    async fn update_access_token(
        &self,
        refresh_token: &str,
        access_token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AppError> {
        match self {
            TokenBackend::Firestore(db) => {
                db.update_access_token(refresh_token, access_token, expires)
                    .await
            }
            TokenBackend::Memory(mem) => {
                mem.update_access_token(refresh_token, access_token, expires)
                    .await
            }
        }
    }
}
