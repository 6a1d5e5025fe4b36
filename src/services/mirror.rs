// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirror API resource calls.
//!
//! Each method builds one request and hands it to the
//! [`AuthenticatedExecutor`]. Payloads are passed through as JSON.

use crate::db::TokenStore;
use crate::error::AppError;
use crate::services::executor::{AuthenticatedExecutor, RequestSpec};
use crate::services::session::AuthSession;
use crate::services::validation::{validate_contact, validate_item, validate_subscription};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Pacing unit for bundle inserts.
const BUNDLE_STEP_DELAY: std::time::Duration = std::time::Duration::from_millis(5);

/// Wait before inserting the bundle item at `index`. Grows with position,
/// nothing for the cover.
fn bundle_step_delay(index: usize) -> std::time::Duration {
    BUNDLE_STEP_DELAY.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

/// Mirror API client.
#[derive(Clone)]
pub struct MirrorClient<S> {
    executor: AuthenticatedExecutor<S>,
    base_uri: String,
}

impl<S: TokenStore> MirrorClient<S> {
    pub fn new(executor: AuthenticatedExecutor<S>, base_uri: impl Into<String>) -> Self {
        Self {
            executor,
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn executor(&self) -> &AuthenticatedExecutor<S> {
        &self.executor
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_uri.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    async fn call(&self, session: &AuthSession, spec: RequestSpec) -> Result<Value, AppError> {
        self.executor.execute(session, &spec).await?.into_value()
    }

    // ─── Contacts ────────────────────────────────────────────────────────────

    /// Insert a new contact.
    pub async fn insert_contact(
        &self,
        session: &AuthSession,
        contact: &Value,
    ) -> Result<Value, AppError> {
        validate_contact(contact)?;
        let spec = RequestSpec::post(self.url(&["contacts"])).json(contact.clone());
        self.call(session, spec).await
    }

    pub async fn get_contact(&self, session: &AuthSession, id: &str) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["contacts", id])))
            .await
    }

    /// Replace an existing contact.
    pub async fn update_contact(
        &self,
        session: &AuthSession,
        id: &str,
        contact: &Value,
    ) -> Result<Value, AppError> {
        validate_contact(contact)?;
        let spec = RequestSpec::put(self.url(&["contacts", id])).json(contact.clone());
        self.call(session, spec).await
    }

    pub async fn remove_contact(&self, session: &AuthSession, id: &str) -> Result<(), AppError> {
        self.call(session, RequestSpec::delete(self.url(&["contacts", id])))
            .await?;
        Ok(())
    }

    pub async fn list_contacts(&self, session: &AuthSession) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["contacts"])))
            .await
    }

    // ─── Timeline Items ──────────────────────────────────────────────────────

    /// Insert a new timeline item.
    pub async fn insert_item(&self, session: &AuthSession, item: &Value) -> Result<Value, AppError> {
        validate_item(item)?;
        let spec = RequestSpec::post(self.url(&["timeline"])).json(item.clone());
        self.call(session, spec).await
    }

    pub async fn get_item(&self, session: &AuthSession, item_id: &str) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["timeline", item_id])))
            .await
    }

    pub async fn update_item(
        &self,
        session: &AuthSession,
        item_id: &str,
        item: &Value,
    ) -> Result<Value, AppError> {
        validate_item(item)?;
        let spec = RequestSpec::put(self.url(&["timeline", item_id])).json(item.clone());
        self.call(session, spec).await
    }

    pub async fn remove_item(&self, session: &AuthSession, item_id: &str) -> Result<(), AppError> {
        self.call(session, RequestSpec::delete(self.url(&["timeline", item_id])))
            .await?;
        Ok(())
    }

    /// List timeline items, optionally restricted to one bundle.
    pub async fn list_items(
        &self,
        session: &AuthSession,
        bundle_id: Option<&str>,
    ) -> Result<Value, AppError> {
        let mut spec = RequestSpec::get(self.url(&["timeline"]));
        if let Some(bundle_id) = bundle_id {
            spec = spec.query("bundleId", bundle_id);
        }
        self.call(session, spec).await
    }

    // ─── Bundles ─────────────────────────────────────────────────────────────

    /// Insert `items` as one bundle.
    ///
    /// The first item becomes the bundle cover. The others are stamped with
    /// descending display times so they keep their order inside the bundle.
    /// Inserts run one after another, each paced by its position, and stop
    /// at the first failure.
    pub async fn insert_bundle_items(
        &self,
        session: &AuthSession,
        bundle_id: &str,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, AppError> {
        for item in &items {
            validate_item(item)?;
        }

        let bundle_time = Utc::now();
        let count = items.len() as i64;
        let mut inserted = Vec::with_capacity(items.len());

        for (index, mut item) in items.into_iter().enumerate() {
            let is_cover = index == 0;
            item["bundleId"] = json!(bundle_id);
            item["isBundleCover"] = json!(is_cover);

            if !is_cover {
                let display_time = bundle_time + Duration::seconds(count - index as i64);
                item["displayTime"] =
                    json!(display_time.to_rfc3339_opts(SecondsFormat::Millis, true));
            }

            tokio::time::sleep(bundle_step_delay(index)).await;
            inserted.push(self.insert_item(session, &item).await?);
        }

        tracing::debug!(bundle_id, count, "Bundle inserted");
        Ok(inserted)
    }

    // ─── Attachments ─────────────────────────────────────────────────────────

    /// Get attachment metadata.
    pub async fn get_attachment(
        &self,
        session: &AuthSession,
        item_id: &str,
        attachment_id: &str,
    ) -> Result<Value, AppError> {
        let url = self.url(&["timeline", item_id, "attachments", attachment_id]);
        self.call(session, RequestSpec::get(url)).await
    }

    pub async fn list_attachments(
        &self,
        session: &AuthSession,
        item_id: &str,
    ) -> Result<Value, AppError> {
        let url = self.url(&["timeline", item_id, "attachments"]);
        self.call(session, RequestSpec::get(url)).await
    }

    /// Get attachment metadata and its raw content.
    pub async fn get_attachment_image(
        &self,
        session: &AuthSession,
        item_id: &str,
        attachment_id: &str,
    ) -> Result<(Value, Vec<u8>), AppError> {
        let attachment = self
            .get_attachment(session, item_id, attachment_id)
            .await?;

        let content_url = attachment
            .get("contentUrl")
            .and_then(|u| u.as_str())
            .ok_or_else(|| AppError::Remote("Attachment has no contentUrl".to_string()))?
            .to_string();

        let image = self
            .executor
            .execute(session, &RequestSpec::get(content_url))
            .await?
            .into_bytes();

        Ok((attachment, image))
    }

    // ─── Locations ───────────────────────────────────────────────────────────

    pub async fn get_location(&self, session: &AuthSession, id: &str) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["locations", id])))
            .await
    }

    pub async fn list_locations(&self, session: &AuthSession) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["locations"])))
            .await
    }

    // ─── Subscriptions ───────────────────────────────────────────────────────

    /// Subscribe to notifications for a collection.
    pub async fn insert_subscription(
        &self,
        session: &AuthSession,
        subscription: &Value,
    ) -> Result<Value, AppError> {
        validate_subscription(subscription)?;
        let spec = RequestSpec::post(self.url(&["subscriptions"])).json(subscription.clone());
        self.call(session, spec).await
    }

    pub async fn update_subscription(
        &self,
        session: &AuthSession,
        id: &str,
        subscription: &Value,
    ) -> Result<Value, AppError> {
        validate_subscription(subscription)?;
        let spec = RequestSpec::put(self.url(&["subscriptions", id])).json(subscription.clone());
        self.call(session, spec).await
    }

    pub async fn remove_subscription(&self, session: &AuthSession, id: &str) -> Result<(), AppError> {
        self.call(session, RequestSpec::delete(self.url(&["subscriptions", id])))
            .await?;
        Ok(())
    }

    pub async fn list_subscriptions(&self, session: &AuthSession) -> Result<Value, AppError> {
        self.call(session, RequestSpec::get(self.url(&["subscriptions"])))
            .await
    }
}
