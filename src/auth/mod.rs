// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! This module verifies Supabase access tokens.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with Supabase Auth
//! 2. Frontend sends `Authorization: Bearer <access token>`
//! 3. Server:
//!    - Reads the unverified header to pick RS256 (JWKS) or HS256 (JWT secret)
//!    - Fetches Supabase JWKS via HTTPS, cached for an hour
//!    - Verifies signature, expiry, audience and (RS256 only) issuer
//!    - Extracts `sub` → canonical `user_id`, plus email and role
//!
//! ## Security
//!
//! - Every failure is reported to clients as the same 401
//! - A stale JWKS is served if the provider is unreachable
//! - JWKS fetches are bounded by a timeout (10 seconds by default)
//! - [`unverified`] helpers never establish trust

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod token;
pub mod unverified;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{AuthenticatedUser, ClaimSet};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use jwks::{Clock, FetchError, HttpKeySetFetcher, JwksCache, KeySetFetcher, SystemClock};
pub use token::VerificationPath;
pub use unverified::{extract_subject_unsafe, is_expired};
pub use verifier::{TokenVerifier, Verified};
