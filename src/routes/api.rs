// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for connected users.

use crate::error::AppError;
use crate::middleware::CurrentSession;
use crate::models::UserProfile;
use crate::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

/// API routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/locations", get(list_locations))
        .route("/api/timeline", post(insert_timeline_item))
}

/// Turn a failed call into a response.
///
/// Credential failures drop the session and send the user back through
/// authorization.
fn failure_response(state: &AppState, current: &CurrentSession, err: AppError) -> Response {
    if err.requires_reauthorization() {
        tracing::info!(
            user_id = %current.session.profile().id,
            error = %err,
            "Session needs re-authorization"
        );
        state.sessions.remove(&current.id);
        return Redirect::temporary(&state.auth_flow.authorization_uri()).into_response();
    }
    err.into_response()
}

/// Get current user profile.
async fn get_me(Extension(current): Extension<CurrentSession>) -> Json<UserProfile> {
    Json(current.session.profile().clone())
}

/// List the user's known locations.
async fn list_locations(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    match state.mirror.list_locations(&current.session).await {
        Ok(locations) => Json(locations).into_response(),
        Err(e) => failure_response(&state, &current, e),
    }
}

/// Insert a timeline item on the user's behalf.
async fn insert_timeline_item(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Json(item): Json<Value>,
) -> Response {
    match state.mirror.insert_item(&current.session, &item).await {
        Ok(inserted) => Json(inserted).into_response(),
        Err(e) => failure_response(&state, &current, e),
    }
}
