// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process token store for local development and tests.

use super::TokenStore;
use crate::error::AppError;
use crate::models::PersistedTokenRecord;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Token records held in a concurrent map. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    records: Arc<DashMap<String, PersistedTokenRecord>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total successful writes (upserts and access token updates).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    async fn get(&self, refresh_token: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        Ok(self.records.get(refresh_token).map(|r| r.clone()))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.profile.id == user_id)
            .max_by_key(|r| r.expires)
            .map(|r| r.clone()))
    }

    async fn upsert(&self, record: &PersistedTokenRecord) -> Result<(), AppError> {
        self.records
            .insert(record.refresh_token.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_access_token(
        &self,
        refresh_token: &str,
        access_token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut record = self.records.get_mut(refresh_token).ok_or_else(|| {
            AppError::Store("No token record for refresh token".to_string())
        })?;

        record.access_token = access_token.to_string();
        record.expires = expires;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn record() -> PersistedTokenRecord {
        PersistedTokenRecord {
            code: "code".to_string(),
            profile: UserProfile {
                id: "42".to_string(),
                name: "Ada".to_string(),
                given_name: None,
                family_name: None,
                picture: None,
                locale: None,
            },
            access_token: "access-1".to_string(),
            refresh_token: "1//refresh".to_string(),
            expires: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = MemoryTokenStore::new();
        store.upsert(&record()).await.unwrap();
        store.upsert(&record()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1//refresh").await.unwrap(), Some(record()));
        assert_eq!(store.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_user_prefers_latest_record() {
        let store = MemoryTokenStore::new();
        let older = record();
        let mut newer = record();
        newer.refresh_token = "1//newer".to_string();
        newer.expires = older.expires + chrono::Duration::hours(1);

        store.upsert(&older).await.unwrap();
        store.upsert(&newer).await.unwrap();

        let found = store.find_by_user("42").await.unwrap().unwrap();
        assert_eq!(found.refresh_token, "1//newer");
        assert_eq!(store.find_by_user("7").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_access_token_only_touches_token_fields() {
        let store = MemoryTokenStore::new();
        store.upsert(&record()).await.unwrap();

        let expires = Utc::now() + chrono::Duration::hours(1);
        store
            .update_access_token("1//refresh", "access-2", expires)
            .await
            .unwrap();

        let stored = store.get("1//refresh").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "access-2");
        assert_eq!(stored.expires, expires);
        assert_eq!(stored.code, "code");
        assert_eq!(stored.profile.name, "Ada");
    }

    #[tokio::test]
    async fn test_update_unknown_record_fails() {
        let store = MemoryTokenStore::new();
        let result = store
            .update_access_token("missing", "access", Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::Store(_))));
        assert_eq!(store.write_count(), 0);
    }
}
