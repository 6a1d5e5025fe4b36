// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimal payload checks run before any Mirror API request.
//!
//! Payloads are forwarded as opaque JSON; only the fields the API requires
//! are checked here, for presence and type.

use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

#[allow(dead_code)]
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ContactFields {
    id: String,
    display_name: String,
    #[validate(length(min = 1, message = "imageUrls must not be empty"))]
    image_urls: Vec<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionFields {
    callback_url: String,
    collection: String,
}

/// A contact needs a string `id`, a string `displayName` and at least one
/// image URL.
pub fn validate_contact(contact: &Value) -> Result<(), AppError> {
    let fields = ContactFields::deserialize(contact)
        .map_err(|e| AppError::Validation(format!("Invalid contact provided: {}", e)))?;
    fields
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid contact provided: {}", e)))
}

/// A subscription needs a string `callbackUrl` and a string `collection`.
pub fn validate_subscription(subscription: &Value) -> Result<(), AppError> {
    SubscriptionFields::deserialize(subscription)
        .map(|_| ())
        .map_err(|e| AppError::Validation(format!("Invalid subscription provided: {}", e)))
}

/// Timeline items have no required fields, but must be JSON objects.
pub fn validate_item(item: &Value) -> Result<(), AppError> {
    if item.is_object() {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Invalid item provided: expected a JSON object".to_string(),
        ))
    }
}
