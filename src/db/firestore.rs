// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed token store.
//!
//! Refresh tokens contain `/`, which Firestore rejects in document IDs, so
//! each record is stored under the hex SHA-256 of its refresh token.

use super::{collections, TokenStore};
use crate::error::AppError;
use crate::models::PersistedTokenRecord;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| AppError::Store(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Store("Database not connected (offline mode)".to_string()))
    }

    async fn read_record(&self, doc_id: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(doc_id)
            .await
            .map_err(|e| AppError::Store(e.to_string()))
    }

    async fn write_record(
        &self,
        doc_id: String,
        record: &PersistedTokenRecord,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(doc_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Update mask for an access token refresh. Everything else in the record
/// is left as stored.
fn access_token_fields() -> Vec<String> {
    firestore::paths!(PersistedTokenRecord::{access_token, expires})
}

/// Document ID for the record keyed by `refresh_token`.
pub fn token_document_id(refresh_token: &str) -> String {
    hex::encode(Sha256::digest(refresh_token.as_bytes()))
}

impl TokenStore for FirestoreDb {
    async fn get(&self, refresh_token: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        self.read_record(&token_document_id(refresh_token)).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<PersistedTokenRecord>, AppError> {
        let user_id = user_id.to_string();
        let records: Vec<PersistedTokenRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TOKENS)
            .filter(move |q| q.for_all([q.field("profile.id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        Ok(records.into_iter().max_by_key(|r| r.expires))
    }

    async fn upsert(&self, record: &PersistedTokenRecord) -> Result<(), AppError> {
        self.write_record(token_document_id(&record.refresh_token), record)
            .await?;
        tracing::debug!(user_id = %record.profile.id, "Token record stored");
        Ok(())
    }

    async fn update_access_token(
        &self,
        refresh_token: &str,
        access_token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let doc_id = token_document_id(refresh_token);
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Store(format!("Failed to begin transaction: {}", e)))?;

        // Read inside the transaction so a concurrent write to the same
        // record makes the commit fail instead of being overwritten.
        let existing: Option<PersistedTokenRecord> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Store(format!("Failed to read token in transaction: {}", e)))?;

        let Some(mut record) = existing else {
            let _ = transaction.rollback().await;
            return Err(AppError::Store(
                "No token record for refresh token".to_string(),
            ));
        };

        record.access_token = access_token.to_string();
        record.expires = expires;

        client
            .fluent()
            .update()
            .fields(access_token_fields())
            .in_col(collections::TOKENS)
            .document_id(&doc_id)
            .object(&record)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Store(format!("Failed to add token update to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Store(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(user_id = %record.profile.id, "Access token updated");
        Ok(())
    }
}
