//! User profile and the persisted token record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile returned by the Google user-info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Google account ID
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Profile picture URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Durable counterpart of an authenticated session, keyed by refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTokenRecord {
    /// Authorization code that produced the tokens
    pub code: String,
    /// Profile snapshot taken at authorization time
    pub profile: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires
    pub expires: DateTime<Utc>,
}
