//! JWKS (JSON Web Key Set) client with caching and fetch rate limiting.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use tracing::{debug, info, warn};
use url::Url;

use crate::authority::{KeySetClient, SigningKey};
use crate::error::Error;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Options the key-set client is built from.
///
/// ```rust,ignore
/// let options = KeySetOptions::for_domain("acme.eu.auth0.com")?
///     .with_requests_per_minute(10);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct KeySetOptions {
    pub(crate) cache: bool,
    pub(crate) cache_max_age: Duration,
    pub(crate) rate_limit: bool,
    pub(crate) jwks_requests_per_minute: u32,
    pub(crate) jwks_uri: Url,
}

impl KeySetOptions {
    /// Caching and rate limiting on, 5 fetches per minute, 10 minute max age.
    #[must_use]
    pub fn new(jwks_uri: Url) -> Self {
        Self {
            cache: true,
            cache_max_age: Duration::from_secs(600),
            rate_limit: true,
            jwks_requests_per_minute: 5,
            jwks_uri,
        }
    }

    /// Options for the tenant's `/.well-known/jwks.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `domain` does not form a valid URL.
    pub fn for_domain(domain: &str) -> Result<Self, Error> {
        let uri: Url = format!("https://{domain}/.well-known/jwks.json")
            .parse()
            .map_err(|e| Error::Validation(format!("jwks uri: {e}")))?;
        Ok(Self::new(uri))
    }

    #[must_use]
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: bool) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    #[must_use]
    pub fn with_requests_per_minute(mut self, requests: u32) -> Self {
        self.jwks_requests_per_minute = requests;
        self
    }

    #[must_use]
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }
}

struct CachedKey {
    key: SigningKey,
    fetched_at: Instant,
}

struct FetchWindow {
    started: Instant,
    count: u32,
}

/// Fetches the provider's key set and serves signing keys by `kid`.
pub struct JwksClient {
    options: KeySetOptions,
    http: reqwest::Client,
    keys: RwLock<HashMap<String, CachedKey>>,
    fetches: Mutex<FetchWindow>,
}

impl JwksClient {
    #[must_use]
    pub fn new(options: KeySetOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
            keys: RwLock::new(HashMap::new()),
            fetches: Mutex::new(FetchWindow {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Use a custom HTTP client (timeouts, proxies, connection pool reuse).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn options(&self) -> &KeySetOptions {
        &self.options
    }

    fn cached(&self, kid: Option<&str>) -> Option<SigningKey> {
        let keys = self.keys.read().ok()?;
        let entry = match kid {
            Some(kid) => keys.get(kid)?,
            None if keys.len() == 1 => keys.values().next()?,
            None => return None,
        };
        (entry.fetched_at.elapsed() < self.options.cache_max_age).then(|| entry.key.clone())
    }

    fn store(&self, fetched: &[SigningKey]) {
        let Ok(mut keys) = self.keys.write() else {
            warn!("JWKS cache lock poisoned, skipping cache update");
            return;
        };
        let now = Instant::now();
        *keys = fetched
            .iter()
            .map(|key| {
                (
                    key.kid().0.clone(),
                    CachedKey {
                        key: key.clone(),
                        fetched_at: now,
                    },
                )
            })
            .collect();
    }

    fn acquire_fetch(&self) -> Result<(), Error> {
        if !self.options.rate_limit {
            return Ok(());
        }
        let mut window = self
            .fetches
            .lock()
            .map_err(|_| Error::KeySet("rate limiter lock poisoned".into()))?;
        if window.started.elapsed() >= RATE_WINDOW {
            window.started = Instant::now();
            window.count = 0;
        }
        if window.count >= self.options.jwks_requests_per_minute {
            warn!(
                uri = %self.options.jwks_uri,
                limit = self.options.jwks_requests_per_minute,
                "JWKS fetch rate limit reached"
            );
            return Err(Error::RateLimited);
        }
        window.count += 1;
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<SigningKey>, Error> {
        debug!(uri = %self.options.jwks_uri, "Fetching JWKS");

        let response = self
            .http
            .get(self.options.jwks_uri.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::KeySet(format!(
                "{} returned status {}",
                self.options.jwks_uri,
                response.status()
            )));
        }

        let set: JwkSet = response.json().await?;

        let mut keys = Vec::with_capacity(set.keys.len());
        for jwk in &set.keys {
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                continue;
            }
            let Some(kid) = jwk.common.key_id.as_deref() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push(SigningKey::new(kid, key)),
                Err(e) => warn!(kid = %kid, error = %e, "Failed to parse JWK, skipping"),
            }
        }

        if keys.is_empty() {
            return Err(Error::KeySet("no signing keys in JWKS".into()));
        }

        info!(
            uri = %self.options.jwks_uri,
            key_count = keys.len(),
            "JWKS fetched"
        );
        Ok(keys)
    }
}

impl KeySetClient for JwksClient {
    async fn signing_key(&self, kid: Option<&str>) -> Result<SigningKey, Error> {
        if self.options.cache {
            if let Some(key) = self.cached(kid) {
                debug!(kid = ?kid, "JWKS cache hit");
                return Ok(key);
            }
        }

        self.acquire_fetch()?;
        let keys = self.fetch().await?;
        if self.options.cache {
            self.store(&keys);
        }

        let found = match kid {
            Some(kid) => keys.into_iter().find(|key| key.kid().0 == kid),
            None if keys.len() == 1 => keys.into_iter().next(),
            None => None,
        };
        found.ok_or_else(|| Error::KeyNotFound(kid.map(str::to_owned)))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const JWKS: &str = include_str!("../tests/fixtures/jwks.json");

    async fn jwks_server(expected_fetches: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .expect(expected_fetches)
            .mount(&server)
            .await;
        server
    }

    fn options_for(server: &MockServer) -> KeySetOptions {
        KeySetOptions::new(
            format!("{}/.well-known/jwks.json", server.uri())
                .parse()
                .unwrap(),
        )
    }

    #[test]
    fn domain_options_use_well_known_uri() {
        let options = KeySetOptions::for_domain("test.eu.auth0.com").unwrap();
        assert_eq!(
            options.jwks_uri().as_str(),
            "https://test.eu.auth0.com/.well-known/jwks.json"
        );
        assert!(options.cache);
        assert!(options.rate_limit);
        assert_eq!(options.jwks_requests_per_minute, 5);
    }

    #[tokio::test]
    async fn cached_key_is_served_without_refetch() {
        let server = jwks_server(1).await;
        let client = JwksClient::new(options_for(&server));

        let first = client.signing_key(Some("test-key-1")).await.unwrap();
        let second = client.signing_key(Some("test-key-1")).await.unwrap();

        assert_eq!(first.kid().to_string(), "test-key-1");
        assert_eq!(second.kid().to_string(), "test-key-1");
    }

    #[tokio::test]
    async fn disabled_cache_refetches() {
        let server = jwks_server(2).await;
        let client = JwksClient::new(options_for(&server).with_cache(false));

        client.signing_key(Some("test-key-1")).await.unwrap();
        client.signing_key(Some("test-key-1")).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found() {
        let server = jwks_server(1).await;
        let client = JwksClient::new(options_for(&server));

        let err = client.signing_key(Some("rotated-away")).await.unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(Some(ref kid)) if kid == "rotated-away"));
    }

    #[tokio::test]
    async fn missing_kid_uses_single_key() {
        let server = jwks_server(1).await;
        let client = JwksClient::new(options_for(&server));

        let key = client.signing_key(None).await.unwrap();
        assert_eq!(key.kid().to_string(), "test-key-1");
    }

    #[tokio::test]
    async fn fetches_beyond_budget_are_rate_limited() {
        let server = jwks_server(1).await;
        let client = JwksClient::new(
            options_for(&server)
                .with_cache(false)
                .with_requests_per_minute(1),
        );

        client.signing_key(Some("test-key-1")).await.unwrap();
        let err = client.signing_key(Some("test-key-1")).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = JwksClient::new(options_for(&server));

        let err = client.signing_key(Some("test-key-1")).await.unwrap_err();
        assert!(matches!(err, Error::KeySet(_)));
    }
}
