// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claim sets and the authenticated user derived from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AuthError;

/// Role Supabase assigns to signed-in users when no other role is set.
pub const DEFAULT_ROLE: &str = "authenticated";

/// Decoded token payload.
///
/// A plain string-to-JSON mapping. Only [`TokenVerifier`](super::TokenVerifier)
/// hands these out as trusted; the unverified helpers read one internally and
/// never return it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// `exp` claim as Unix seconds. Fractional values are truncated.
    pub fn expires_at(&self) -> Option<i64> {
        let exp = self.0.get("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
    }

    /// `iss` claim.
    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    /// `aud` claim, which may be a single string or an array.
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    pub fn role(&self) -> Option<&str> {
        self.str_claim("role")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn str_claim(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Authenticated user information extracted from a verified token.
///
/// This is the type request handlers receive from the [`Auth`](super::Auth)
/// extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Canonical user ID (Supabase `sub` claim)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// True once Supabase has recorded `email_confirmed_at`
    pub email_verified: bool,

    /// Token role, `authenticated` unless the provider says otherwise
    pub role: String,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: Option<i64>,
}

impl AuthenticatedUser {
    /// Create from verified claims. A token without a subject is rejected.
    pub fn from_claims(claims: &ClaimSet) -> Result<Self, AuthError> {
        let user_id = claims
            .subject()
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::MissingSubject)?;

        let email_verified = claims
            .get("email_confirmed_at")
            .is_some_and(|confirmed| !confirmed.is_null());

        Ok(Self {
            user_id: user_id.to_string(),
            email: claims.email().map(str::to_string),
            email_verified,
            role: claims.role().unwrap_or(DEFAULT_ROLE).to_string(),
            expires_at: claims.expires_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimSet {
        serde_json::from_value(value).unwrap()
    }

    fn sample_claims() -> ClaimSet {
        claims(json!({
            "sub": "8d0f1c2e-0000-4000-8000-000000000001",
            "aud": "authenticated",
            "iss": "https://project.supabase.co/auth/v1",
            "exp": 1767229200,
            "email": "ada@example.com",
            "role": "service_role",
            "email_confirmed_at": "2026-01-01T00:00:00Z"
        }))
    }

    #[test]
    fn accessors_read_standard_claims() {
        let claims = sample_claims();
        assert_eq!(claims.subject(), Some("8d0f1c2e-0000-4000-8000-000000000001"));
        assert_eq!(claims.expires_at(), Some(1767229200));
        assert_eq!(claims.issuer(), Some("https://project.supabase.co/auth/v1"));
        assert_eq!(claims.audiences(), vec!["authenticated"]);
        assert_eq!(claims.email(), Some("ada@example.com"));
    }

    #[test]
    fn audience_may_be_an_array() {
        let claims = claims(json!({ "aud": ["authenticated", "other"] }));
        assert_eq!(claims.audiences(), vec!["authenticated", "other"]);
    }

    #[test]
    fn fractional_expiry_is_truncated() {
        let claims = claims(json!({ "exp": 1767229200.75 }));
        assert_eq!(claims.expires_at(), Some(1767229200));
    }

    #[test]
    fn serializes_back_to_the_same_mapping() {
        let original = json!({ "sub": "u1", "custom": { "nested": [1, 2, 3] } });
        let claims = claims(original.clone());
        assert_eq!(serde_json::to_value(&claims).unwrap(), original);
    }

    #[test]
    fn from_claims_extracts_user() {
        let user = AuthenticatedUser::from_claims(&sample_claims()).unwrap();
        assert_eq!(user.user_id, "8d0f1c2e-0000-4000-8000-000000000001");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(user.email_verified);
        assert_eq!(user.role, "service_role");
        assert_eq!(user.expires_at, Some(1767229200));
    }

    #[test]
    fn from_claims_defaults_role_and_verification() {
        let user = AuthenticatedUser::from_claims(&claims(json!({
            "sub": "u1",
            "email_confirmed_at": null
        })))
        .unwrap();
        assert_eq!(user.role, DEFAULT_ROLE);
        assert!(!user.email_verified);
        assert!(user.email.is_none());
    }

    #[test]
    fn from_claims_requires_subject() {
        for value in [json!({}), json!({ "sub": "" }), json!({ "sub": 42 })] {
            let result = AuthenticatedUser::from_claims(&claims(value));
            assert!(matches!(result, Err(AuthError::MissingSubject)));
        }
    }
}
