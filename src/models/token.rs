// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token set held by a session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair with its computed expiry.
///
/// The expiry is advisory. The provider rejecting the access token is the
/// authoritative signal that it has expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Absent when the provider did not issue one.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl TokenSet {
    /// Build a token set whose expiry is `now + lifetime`.
    ///
    /// A missing lifetime, or one too large to represent, yields a token set
    /// that is already expired, so the first use refreshes it.
    pub fn from_lifetime(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        token_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = match expires_in_secs {
            Some(secs) if secs > 0 => Duration::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or(now),
            _ => now,
        };

        Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }

    /// Only a token set with an access token can authorize a call.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// True when the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }

    /// Fold a refresh response into this token set.
    ///
    /// The refresh token is replaced only when the response carries a new
    /// one; it is never cleared.
    pub fn apply_refresh(&mut self, refreshed: TokenSet) {
        self.access_token = refreshed.access_token;
        self.expires_at = refreshed.expires_at;
        self.token_type = refreshed.token_type;
        if let Some(refresh_token) = refreshed.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
    }
}
