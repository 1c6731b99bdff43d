// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Supabase Token Verifier - bearer token verification for Supabase Auth
//!
//! Verifies Supabase access tokens against the project's published JWKS
//! (RS256), falling back to the project JWT secret (HS256).
//!
//! ## Modules
//!
//! - `auth` - Key cache, token verification and Axum extractors
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup
//! - `state` - Shared state for Axum handlers

pub mod auth;
pub mod config;
pub mod logging;
pub mod state;
