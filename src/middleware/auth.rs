// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookie middleware.

use crate::services::AuthSession;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Name of the cookie holding the session ID.
pub const SESSION_COOKIE: &str = "glass_session";

/// Session bound to the current request.
#[derive(Clone)]
pub struct CurrentSession {
    pub id: String,
    pub session: Arc<AuthSession>,
}

/// Middleware that requires an authorized session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let session = state.sessions.get(&id).ok_or(StatusCode::UNAUTHORIZED)?;

    request
        .extensions_mut()
        .insert(CurrentSession { id, session });

    Ok(next.run(request).await)
}
