// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values for
//! token verification. Configuration is loaded from the environment at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SUPABASE_URL` | Supabase project URL | Required |
//! | `SUPABASE_JWT_SECRET` | Project JWT secret for HS256 tokens | Required |
//! | `SUPABASE_JWT_AUDIENCE` | Expected `aud` claim | `authenticated` |
//! | `SUPABASE_JWT_ISSUER` | Expected `iss` claim on RS256 tokens | `{SUPABASE_URL}/auth/v1` |
//! | `JWKS_CACHE_TTL_SECS` | How long a fetched JWKS stays fresh | `3600` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Bound on a single JWKS fetch | `10` |
//! | `JWT_LEEWAY_SECS` | Clock skew tolerance for `exp` | `0` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::auth::jwks::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT};
use crate::auth::verifier::DEFAULT_AUDIENCE;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_JWT_SECRET_ENV: &str = "SUPABASE_JWT_SECRET";
pub const SUPABASE_JWT_AUDIENCE_ENV: &str = "SUPABASE_JWT_AUDIENCE";
pub const SUPABASE_JWT_ISSUER_ENV: &str = "SUPABASE_JWT_ISSUER";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const JWT_LEEWAY_ENV: &str = "JWT_LEEWAY_SECS";

/// Path of the Supabase Auth service under the project URL.
const AUTH_PATH: &str = "/auth/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration missing: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Token verification settings.
#[derive(Clone)]
pub struct AuthSettings {
    /// Supabase project URL, without trailing slash
    pub supabase_url: String,
    pub jwt_secret: String,
    pub audience: String,
    pub issuer: String,
    pub jwks_cache_ttl: Duration,
    pub jwks_fetch_timeout: Duration,
    pub leeway_secs: u64,
}

impl AuthSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its raw
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_url = env_optional(SUPABASE_URL_ENV).ok_or(ConfigError::Missing(SUPABASE_URL_ENV))?;
        let parsed = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: SUPABASE_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: SUPABASE_URL_ENV,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        let supabase_url = parsed.as_str().trim_end_matches('/').to_string();

        let jwt_secret = env_optional(SUPABASE_JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(SUPABASE_JWT_SECRET_ENV))?;

        let audience =
            env_optional(SUPABASE_JWT_AUDIENCE_ENV).unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());
        let issuer = env_optional(SUPABASE_JWT_ISSUER_ENV)
            .unwrap_or_else(|| format!("{supabase_url}{AUTH_PATH}"));

        let jwks_cache_ttl = match env_optional(JWKS_CACHE_TTL_ENV) {
            Some(raw) => Duration::from_secs(parse_secs(JWKS_CACHE_TTL_ENV, &raw)?),
            None => DEFAULT_CACHE_TTL,
        };
        let jwks_fetch_timeout = match env_optional(JWKS_FETCH_TIMEOUT_ENV) {
            Some(raw) => match parse_secs(JWKS_FETCH_TIMEOUT_ENV, &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        name: JWKS_FETCH_TIMEOUT_ENV,
                        reason: "timeout must be at least one second".to_string(),
                    })
                }
                secs => Duration::from_secs(secs),
            },
            None => DEFAULT_FETCH_TIMEOUT,
        };
        let leeway_secs = match env_optional(JWT_LEEWAY_ENV) {
            Some(raw) => parse_secs(JWT_LEEWAY_ENV, &raw)?,
            None => 0,
        };

        Ok(Self {
            supabase_url,
            jwt_secret,
            audience,
            issuer,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            leeway_secs,
        })
    }

    /// Supabase JWKS endpoint, `{SUPABASE_URL}/auth/v1/jwks`.
    pub fn jwks_url(&self) -> String {
        format!("{}{AUTH_PATH}/jwks", self.supabase_url)
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("supabase_url", &self.supabase_url)
            .field("jwt_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

fn parse_secs(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("expected whole seconds, got {raw:?}"),
    })
}
