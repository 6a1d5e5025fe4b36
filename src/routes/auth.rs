// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Glass OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::SESSION_COOKIE;
use crate::services::{CallbackParams, ConnectOutcome};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/glass", get(auth_connect))
        .route("/auth/glass/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Start OAuth flow, or confirm an existing session is still authorized.
async fn auth_connect(State(state): State<Arc<AppState>>, jar: CookieJar) -> Redirect {
    let session = jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.sessions.get(c.value()));

    match state.auth_flow.connect(session.as_deref()).await {
        ConnectOutcome::Redirect(uri) => Redirect::temporary(&uri),
        ConnectOutcome::Connected => Redirect::temporary("/"),
    }
}

/// OAuth callback - exchange code for tokens, bind a new session.
///
/// Authentication failures send the user back to the provider; exchange
/// and store failures are reported as errors.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    match bind_session(&state, jar, &params).await {
        Ok(response) => response.into_response(),
        Err(e) if e.requires_reauthorization() => {
            tracing::info!(error = %e, "Callback rejected, restarting authorization");
            Redirect::temporary(&state.auth_flow.authorization_uri()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn bind_session(
    state: &AppState,
    jar: CookieJar,
    params: &CallbackParams,
) -> Result<(CookieJar, Redirect)> {
    let session = state.auth_flow.remember(params).await?;

    if let Some(old) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(old.value());
    }

    let session_id = state.sessions.new_session_id()?;
    state.sessions.insert(session_id.clone(), Arc::new(session));

    let secure = state.config.oauth.callback_uri().starts_with("https://");
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure);

    Ok((jar.add(cookie), Redirect::temporary("/")))
}

/// Logout - drop the session binding and its cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::temporary("/"),
    )
}
