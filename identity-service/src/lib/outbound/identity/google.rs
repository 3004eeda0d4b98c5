use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use serde::Deserialize;

use crate::domain::authentication::errors::FederatedTokenError;
use crate::domain::authentication::models::FederatedIdentity;
use crate::domain::authentication::ports::FederatedTokenVerifier;

/// Google's published signing keys.
pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Unknown `kid`s do not trigger another fetch within this window.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// A single RSA key from a JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    /// Modulus, base64url
    pub n: String,
    /// Exponent, base64url
    pub e: String,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

struct CachedKeys {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    aud: String,
    exp: i64,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Verifies Google ID tokens against Google's JWKS.
///
/// Keys are cached for an hour and refetched early when a token names a
/// `kid` the cache does not know, at most once a minute. Concurrent misses
/// share a single fetch. The audience is returned, not checked.
pub struct GoogleIdTokenVerifier {
    cached: RwLock<Option<CachedKeys>>,
    refresh: tokio::sync::Mutex<()>,
    jwks_url: String,
    http_client: Option<reqwest::Client>,
}

impl GoogleIdTokenVerifier {
    /// Create a verifier fetching keys from `jwks_url`.
    ///
    /// `request_timeout` bounds every key fetch.
    pub fn new(
        jwks_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            cached: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
            jwks_url: jwks_url.into(),
            http_client: Some(http_client),
        })
    }

    /// Create a verifier that only ever trusts `keys` and never fetches.
    pub fn with_static_keys(keys: Vec<Jwk>) -> Self {
        Self {
            cached: RwLock::new(Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            })),
            refresh: tokio::sync::Mutex::new(()),
            jwks_url: String::new(),
            http_client: None,
        }
    }

    async fn find_key(&self, kid: &str) -> Result<Jwk, FederatedTokenError> {
        if let Some(key) = self.lookup_cached(kid) {
            return Ok(key);
        }

        if self.http_client.is_some() {
            let _refreshing = self.refresh.lock().await;

            // Another request may have refreshed while this one waited.
            if let Some(key) = self.lookup_cached(kid) {
                return Ok(key);
            }

            if !self.fetched_within(MIN_REFRESH_INTERVAL) {
                self.refresh_keys().await?;
                if let Some(key) = self.lookup_cached(kid) {
                    return Ok(key);
                }
            }
        }

        Err(FederatedTokenError::NoMatchingKey(kid.to_string()))
    }

    fn fetched_within(&self, interval: Duration) -> bool {
        self.cached
            .read()
            .ok()
            .and_then(|cache| cache.as_ref().map(|c| c.fetched_at.elapsed() < interval))
            .unwrap_or(false)
    }

    fn lookup_cached(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cached.read().ok()?;
        let cached = cache.as_ref()?;

        // Static keys never expire.
        if self.http_client.is_some() && cached.fetched_at.elapsed() > JWKS_CACHE_TTL {
            return None;
        }

        cached.keys.iter().find(|k| k.kid == kid).cloned()
    }

    async fn refresh_keys(&self) -> Result<(), FederatedTokenError> {
        let client = self
            .http_client
            .as_ref()
            .ok_or_else(|| FederatedTokenError::KeyFetch("static keys only".to_string()))?;

        let response: JwksResponse = client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .json()
            .await
            .map_err(fetch_error)?;

        tracing::debug!(keys = response.keys.len(), "Refreshed Google signing keys");

        let mut cache = self
            .cached
            .write()
            .map_err(|e| FederatedTokenError::KeyFetch(e.to_string()))?;

        *cache = Some(CachedKeys {
            keys: response.keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}

fn fetch_error(err: reqwest::Error) -> FederatedTokenError {
    if err.is_timeout() {
        FederatedTokenError::Timeout
    } else {
        FederatedTokenError::KeyFetch(err.to_string())
    }
}

#[async_trait]
impl FederatedTokenVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, raw_token: &str) -> Result<FederatedIdentity, FederatedTokenError> {
        let header = decode_header(raw_token)
            .map_err(|e| FederatedTokenError::InvalidFormat(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(FederatedTokenError::InvalidFormat(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let kid = header.kid.ok_or_else(|| {
            FederatedTokenError::InvalidFormat("missing kid in token header".to_string())
        })?;

        let key = self.find_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| FederatedTokenError::InvalidSignature(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);

        let claims = decode::<GoogleClaims>(raw_token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => FederatedTokenError::Expired,
                ErrorKind::InvalidIssuer => FederatedTokenError::InvalidIssuer,
                ErrorKind::InvalidSignature => FederatedTokenError::InvalidSignature(e.to_string()),
                _ => FederatedTokenError::InvalidFormat(e.to_string()),
            })?
            .claims;

        let email = claims
            .email
            .filter(|email| !email.is_empty())
            .ok_or(FederatedTokenError::MissingEmail)?;

        if claims.email_verified != Some(true) {
            return Err(FederatedTokenError::UnverifiedEmail);
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| FederatedTokenError::InvalidFormat("exp out of range".to_string()))?;

        Ok(FederatedIdentity {
            subject: claims.sub,
            email,
            audience: claims.aud,
            expires_at,
        })
    }
}
