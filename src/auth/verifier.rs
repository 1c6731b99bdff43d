// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! ## Verification chain
//!
//! 1. Split the token and decode its header without trusting it
//! 2. `RS256` with a `kid`: verify against the cached JWKS, then check
//!    `exp`, `aud` and `iss`
//! 3. Key lookup, key fetch or signature failure on step 2 falls through to
//!    `HS256` with the project JWT secret, which checks `exp` and `aud`
//! 4. Claim failures after a valid RS256 signature are final and do not
//!    fall through
//!
//! The verifier keeps no state of its own beyond configuration and a handle
//! to the shared [`JwksCache`], so one instance serves every request.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use super::claims::ClaimSet;
use super::error::AuthError;
use super::jwks::{FetchError, JwksCache};
use super::token::{TokenParts, VerificationPath};
use crate::config::AuthSettings;

/// Audience Supabase stamps on user access tokens.
pub const DEFAULT_AUDIENCE: &str = "authenticated";

/// A verified claim set and the algorithm that verified it.
#[derive(Debug, Clone, PartialEq)]
pub struct Verified {
    pub claims: ClaimSet,
    pub algorithm: Algorithm,
}

/// Why the RS256 path did not produce claims.
enum AsymmetricFailure {
    /// Key or signature problem: try HS256 next.
    FallThrough(AuthError),
    /// Signature was valid but the claims were not: stop here.
    Terminal(AuthError),
}

/// Token verifier for Supabase access tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: JwksCache,
    hs256_key: DecodingKey,
    audience: String,
    issuer: String,
    leeway: u64,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    /// - `keys`: shared key material cache for RS256
    /// - `hs256_secret`: project JWT secret for HS256
    /// - `issuer`: expected `iss` on RS256 tokens (`{SUPABASE_URL}/auth/v1`)
    pub fn new(keys: JwksCache, hs256_secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            hs256_key: DecodingKey::from_secret(hs256_secret.as_bytes()),
            audience: DEFAULT_AUDIENCE.to_string(),
            issuer: issuer.into(),
            leeway: 0,
        }
    }

    /// Build the production verifier: an HTTPS-backed JWKS cache plus the
    /// settings' secret, audience, issuer and leeway.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, FetchError> {
        let keys = JwksCache::from_jwks_url(settings.jwks_url(), settings.jwks_fetch_timeout)?
            .with_cache_ttl(settings.jwks_cache_ttl);

        Ok(Self::new(keys, &settings.jwt_secret, settings.issuer.clone())
            .with_audience(settings.audience.clone())
            .with_leeway(settings.leeway_secs))
    }

    /// Set the expected audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Set the clock skew tolerance applied to `exp`, in seconds.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    pub fn key_cache(&self) -> &JwksCache {
        &self.keys
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a bearer token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        self.verify_with_path(token).await.map(|verified| verified.claims)
    }

    /// Verify a bearer token, also reporting which algorithm succeeded.
    pub async fn verify_with_path(&self, token: &str) -> Result<Verified, AuthError> {
        let header = TokenParts::split(token)?.header()?;

        let kid = match VerificationPath::select(&header)? {
            VerificationPath::Symmetric => {
                return self.verified_symmetric(token);
            }
            VerificationPath::Asymmetric { kid } => kid,
        };

        let fall_through = match self.verify_asymmetric(token, &kid).await {
            Ok(claims) => {
                return Ok(Verified {
                    claims,
                    algorithm: Algorithm::RS256,
                })
            }
            Err(AsymmetricFailure::Terminal(e)) => return Err(e),
            Err(AsymmetricFailure::FallThrough(e)) => e,
        };

        warn!(
            kid = %kid,
            error = %fall_through,
            "RS256 verification failed, trying HS256"
        );

        self.verified_symmetric(token).map_err(|symmetric| {
            // A missing key set is the more useful thing to report.
            if matches!(fall_through, AuthError::FetchError(_)) {
                fall_through
            } else {
                symmetric
            }
        })
    }

    /// HS256-only verification with the project JWT secret.
    ///
    /// Checks `exp` and `aud`. The issuer is not checked on this path.
    pub fn verify_symmetric(&self, token: &str) -> Result<ClaimSet, AuthError> {
        TokenParts::split(token)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway;

        decode::<ClaimSet>(token, &self.hs256_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "HS256 verification failed");
                claim_failure(&e).unwrap_or(AuthError::InvalidSignature)
            })
    }

    fn verified_symmetric(&self, token: &str) -> Result<Verified, AuthError> {
        self.verify_symmetric(token).map(|claims| Verified {
            claims,
            algorithm: Algorithm::HS256,
        })
    }

    async fn verify_asymmetric(
        &self,
        token: &str,
        kid: &str,
    ) -> Result<ClaimSet, AsymmetricFailure> {
        let key = self
            .keys
            .decoding_key(kid)
            .await
            .map_err(AsymmetricFailure::FallThrough)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.leeway;

        decode::<ClaimSet>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match claim_failure(&e) {
                Some(claim_error) => AsymmetricFailure::Terminal(claim_error),
                None => AsymmetricFailure::FallThrough(AuthError::InvalidSignature),
            })
    }
}

/// Map the errors jsonwebtoken only reports once the signature has checked
/// out. Anything else is a signature or structure failure.
fn claim_failure(error: &JwtError) -> Option<AuthError> {
    match error.kind() {
        ErrorKind::ExpiredSignature => Some(AuthError::TokenExpired),
        ErrorKind::InvalidAudience => Some(AuthError::ClaimMismatch("aud".to_string())),
        ErrorKind::InvalidIssuer => Some(AuthError::ClaimMismatch("iss".to_string())),
        ErrorKind::MissingRequiredClaim(claim) => Some(AuthError::ClaimMismatch(claim.clone())),
        _ => None,
    }
}
