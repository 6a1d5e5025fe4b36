// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod token;
pub mod user;

pub use token::TokenSet;
pub use user::{PersistedTokenRecord, UserProfile};
