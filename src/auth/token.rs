// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compact token parsing that happens before any signature check.
//!
//! Nothing decoded here is trusted. The header only picks which verification
//! function to try; the payload is only read by the unverified helpers.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::claims::ClaimSet;
use super::error::AuthError;

/// The three dot-separated segments of a compact token.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenParts<'a> {
    header: &'a str,
    payload: &'a str,
}

impl<'a> TokenParts<'a> {
    /// Split `token` into exactly three segments. Header and payload must be
    /// non-empty; the signature may be empty.
    pub(crate) fn split(token: &'a str) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(header), Some(payload), Some(_signature), None)
                if !header.is_empty() && !payload.is_empty() =>
            {
                Ok(Self { header, payload })
            }
            _ => Err(AuthError::MalformedToken),
        }
    }

    pub(crate) fn header(&self) -> Result<Header, AuthError> {
        decode_segment(self.header)
    }

    pub(crate) fn claims(&self) -> Result<ClaimSet, AuthError> {
        decode_segment(self.payload)
    }
}

/// Base64url-decode a segment (padding tolerated) and parse it as JSON.
fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

/// Unverified token header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Which verification function to try first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationPath {
    /// RS256 against the provider's published key `kid`, falling back to
    /// [`VerificationPath::Symmetric`] on key or signature failure.
    Asymmetric { kid: String },
    /// HS256 against the shared project secret.
    Symmetric,
}

impl VerificationPath {
    /// Select a path from the unverified header.
    ///
    /// A missing `alg` is read as HS256. RS256 without a usable `kid` has no
    /// key to look up and goes straight to the symmetric path.
    pub fn select(header: &Header) -> Result<Self, AuthError> {
        let kid = header.kid.as_deref().filter(|kid| !kid.is_empty());

        match (header.alg.as_deref().unwrap_or("HS256"), kid) {
            ("RS256", Some(kid)) => Ok(Self::Asymmetric {
                kid: kid.to_string(),
            }),
            ("RS256", None) | ("HS256", _) => Ok(Self::Symmetric),
            (other, _) => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}
