// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payload inspection WITHOUT signature verification.
//!
//! Never use these for authorization. They exist for log correlation and
//! for UX hints such as prompting a re-login before a request is even sent
//! to [`TokenVerifier::verify`](super::TokenVerifier::verify).

use chrono::{DateTime, Utc};

use super::token::TokenParts;

/// Read the `sub` claim without checking the signature.
///
/// For logging and correlation only.
pub fn extract_subject_unsafe(token: &str) -> Option<String> {
    let claims = TokenParts::split(token).ok()?.claims().ok()?;
    claims.subject().map(str::to_string)
}

/// Whether the token's `exp` is in the past, without checking the signature.
///
/// Fails closed: an undecodable payload or a missing or non-numeric `exp`
/// counts as expired. This differs from `python-jose`, whose expiry check
/// passes a token that has no `exp` at all.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// [`is_expired`] against an explicit instant.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    let Ok(claims) = TokenParts::split(token).and_then(|parts| parts.claims()) else {
        return true;
    };

    match claims.expires_at() {
        Some(exp) => exp < now.timestamp(),
        None => true,
    }
}
