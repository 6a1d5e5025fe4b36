// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - credential lifecycle and API calls.

pub mod auth_flow;
pub mod executor;
pub mod mirror;
pub mod oauth;
pub mod session;
pub mod validation;

pub use auth_flow::{AuthFlow, CallbackParams, ConnectOutcome};
pub use executor::{ApiResponse, AuthenticatedExecutor, RequestSpec, ResponseBody};
pub use mirror::MirrorClient;
pub use oauth::{build_authorization_uri, OAuthClient};
pub use session::{AuthSession, SessionRegistry};
