// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixtures shared by the auth tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::jwks::{Clock, FetchError, JwksCache, KeySetFetcher};
use super::verifier::TokenVerifier;

pub const KID: &str = "k1";
pub const SUPABASE_URL: &str = "https://project.supabase.co";
pub const ISSUER: &str = "https://project.supabase.co/auth/v1";
pub const JWT_SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

/// Private half of the `k1` entry in [`key_set`].
pub const SIGNING_KEY_PEM: &str = include_str!("testdata/rsa_signing_key.pem");
/// Private half of the `k2` entry in [`second_key_set`]; not in [`key_set`].
pub const FOREIGN_KEY_PEM: &str = include_str!("testdata/rsa_foreign_key.pem");

const SIGNING_KEY_N: &str = "rqH-wzOgbD62HpVsp1yxArsEqM7yebeN1F5FHZtGuxOw3rF7bmQHyl7BGA9W4C_4fmyDZrxrGtSPg7gVu2pF3ir0R8zJPAdnnqcWeFdS8VOMnaodyfMzYyJkBxX0qPZaVi3BUd5IIwCWoNXQ8UGcDiaAI56Ii549eYsO3gng1YyhoN1TBTjNLBySayd5c7AdP2eEaKwgQavdv1Hfx9Q5pciFnGteAaDuQr0h0oYAVvhvAYDDeE6cgP2H8KLjPPmLDKAoJly06cWp16lVU-8Ls5WBp2jP9wuEUD7jhr0CIQf1RCxmmBHb8TL0FC6igIFqGRfXFre0Za3mxJxBCy4lDQ";
const FOREIGN_KEY_N: &str = "0WNMIfsxY7vOGmc9sgm-gzG5uHePCR36llP6UVqS01ooCr1ozakpW3XfQu06tsZbhrrECtdue3G-JmlHpXSaFiJZ8YnWGTEo8hwT8IMC8ZrmSvXAX7h0R_j2fLXEDS1Yfz5mvu0yCmNZbG9_UyFLIOm8QEKnFCe1_IrLOT3k_I5UvHw1mnz5VXCzvpGwLOtZEIG2OBgkDhILF27MzXoJYErqGCLXR0PtMbESJ9f1q4HEmHTQkVs8cbqX8KD_4HxYfuadog37XJvvDt50g3FplOR-CHXQu58FIHYtYQcatoxDeJ171tsfTYmIaXIGt7S-xc-rnSrO6FBwXdQC_YhczQ";

fn rsa_jwk(kid: &str, n: &str) -> Value {
    json!({ "kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": n, "e": "AQAB" })
}

/// Key set holding only `k1`.
pub fn key_set() -> JwkSet {
    serde_json::from_value(json!({ "keys": [rsa_jwk(KID, SIGNING_KEY_N)] })).unwrap()
}

/// Key set holding only `k2`, as after a rotation.
pub fn second_key_set() -> JwkSet {
    serde_json::from_value(json!({ "keys": [rsa_jwk("k2", FOREIGN_KEY_N)] })).unwrap()
}

/// Fetcher that returns a scripted key set and counts its calls.
pub struct ScriptedFetcher {
    key_set: Mutex<JwkSet>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(key_set: JwkSet) -> Self {
        Self {
            key_set: Mutex::new(key_set),
            failing: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_key_set(&self, key_set: JwkSet) {
        *self.key_set.lock().unwrap() = key_set;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<JwkSet, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status(503));
        }
        Ok(self.key_set.lock().unwrap().clone())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + TimeDelta::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Verifier over a scripted key set, with the default audience and issuer.
pub fn verifier_with(fetcher: &Arc<ScriptedFetcher>) -> TokenVerifier {
    let keys = JwksCache::new(fetcher.clone());
    TokenVerifier::new(keys, JWT_SECRET, ISSUER)
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Claims a Supabase access token carries, expiring an hour from now.
pub fn supabase_claims(sub: &str) -> Map<String, Value> {
    let value = json!({
        "sub": sub,
        "aud": "authenticated",
        "iss": ISSUER,
        "exp": now_secs() + 3600,
        "iat": now_secs(),
        "email": "ada@example.com",
        "role": "authenticated",
        "email_confirmed_at": "2026-01-01T00:00:00Z",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn mint_rs256(kid: Option<&str>, pem: &str, claims: &Map<String, Value>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap()).unwrap()
}

pub fn mint_hs256(kid: Option<&str>, secret: &str, claims: &Map<String, Value>) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

/// Assemble a token from raw JSON segments and an arbitrary signature.
pub fn raw_token(header: &Value, payload: &Value, signature: &str) -> String {
    use base64ct::{Base64UrlUnpadded, Encoding};

    format!(
        "{}.{}.{}",
        Base64UrlUnpadded::encode_string(header.to_string().as_bytes()),
        Base64UrlUnpadded::encode_string(payload.to_string().as_bytes()),
        signature
    )
}

/// Counts the verifier's RS256 to HS256 fallback warnings. Attach with
/// `tracing::instrument::WithSubscriber::with_subscriber(counter.subscriber())`.
#[derive(Clone, Default)]
pub struct FallbackCounter(Arc<AtomicUsize>);

impl FallbackCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(self.clone())
    }
}

impl<S: Subscriber> Layer<S> for FallbackCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // The verifier's only warning is the fallback to HS256.
        if *metadata.level() == Level::WARN && metadata.target().ends_with("auth::verifier") {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
