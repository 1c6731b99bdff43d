// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::jwks::FetchError;

/// Authentication error type.
///
/// The variants exist for logging only. At the HTTP boundary every variant
/// collapses into the same `401 Unauthorized` body, so callers never learn
/// which check failed or anything about the key material involved.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingAuthHeader,
    /// Invalid authorization header format
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Token is not three base64url segments with a JSON header
    #[error("Token is malformed")]
    MalformedToken,
    /// Header names an algorithm other than RS256 or HS256
    #[error("Token algorithm {0:?} is not supported")]
    UnsupportedAlgorithm(String),
    /// No usable RSA key with this id in the key set
    #[error("No key with id {0:?} in the key set")]
    KeyNotFound(String),
    /// Key set could not be fetched and nothing was cached
    #[error("Failed to fetch signing keys: {0}")]
    FetchError(#[from] FetchError),
    /// Token signature is invalid
    #[error("Token signature is invalid")]
    InvalidSignature,
    /// Signature is valid but `exp` is in the past
    #[error("Token has expired")]
    TokenExpired,
    /// Signature is valid but a required claim is missing or wrong
    #[error("Token claim `{0}` is missing or does not match")]
    ClaimMismatch(String),
    /// Verified token carries no subject
    #[error("Token has no subject")]
    MissingSubject,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl AuthError {
    /// Get the error code for this error. Used in logs, never sent to clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::FetchError(_) => "jwks_fetch_error",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::ClaimMismatch(_) => "claim_mismatch",
            AuthError::MissingSubject => "missing_subject",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorBody {
            error: "Authentication failed",
            error_code: "authentication_failed",
        });
        (self.status_code(), [(WWW_AUTHENTICATE, "Bearer")], body).into_response()
    }
}
