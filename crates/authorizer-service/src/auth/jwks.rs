//! Per-tenant signing key resolution with caching.
//!
//! A [`KeyResolver`] is built once per tenant at startup. For tokens carrying
//! a key ID it resolves keys from the tenant's key-set endpoint and caches
//! them; for tokens without one it hands out the tenant's static key.
//!
//! # Concurrency
//!
//! - Cache entries are immutable `Arc`s and are replaced, never mutated
//! - Concurrent lookups for the same uncached key ID share one fetch; every
//!   waiter receives the same outcome
//! - Fetches run on a spawned task. A caller abandoning its request does not
//!   cancel the fetch, and the result still lands in the cache
//! - Fetches are rate limited per tenant across all callers
//!
//! # Security
//!
//! - An unknown key ID never falls back to the static key
//! - A stale or failed fetch never returns a previously cached key

use crate::auth::keys::{JwksResponse, SigningKey};
use crate::auth::rate_limit::FetchRateLimiter;
use crate::auth::registry::TrustConfig;
use crate::config::{ConfigError, JwksSettings};
use crate::errors::KeyResolutionError;
use crate::observability::metrics;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Upper bound on an accepted key-set document.
const MAX_JWKS_BODY_BYTES: usize = 64 * 1024;

/// Attempts per fetch, including the first. Only transient failures retry.
const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Delay before retrying a transient fetch failure.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Connect timeout for key-set requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type ResolveResult = Result<Arc<SigningKey>, KeyResolutionError>;
type SharedFetch = Shared<BoxFuture<'static, ResolveResult>>;

/// Cached key with the time it was fetched.
struct CachedKey {
    key: Arc<SigningKey>,
    fetched_at: Instant,
}

/// Resolves verification keys for one tenant.
///
/// Cheap to share: clone the surrounding `Arc` or the resolver itself.
#[derive(Clone)]
pub struct KeyResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    /// Tenant name, used for logs and metric labels.
    tenant: String,

    /// URL to the tenant's key-set endpoint.
    jwks_uri: Option<String>,

    /// Statically configured key for tokens without a key ID.
    static_key: Option<Arc<SigningKey>>,

    /// HTTP client for fetching key sets.
    http_client: reqwest::Client,

    /// Resolved keys by key ID.
    cache: Mutex<LruCache<String, CachedKey>>,

    /// How long a cached key is served before it is refetched.
    cache_ttl: Duration,

    /// Outstanding fetches by key ID.
    in_flight: Mutex<HashMap<String, SharedFetch>>,

    /// Per-tenant fetch budget.
    rate_limiter: FetchRateLimiter,
}

/// Lock a std mutex, recovering the data if a panicking thread poisoned it.
///
/// Every critical section here is a plain map operation that leaves the data
/// consistent, so a poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyResolver {
    /// Create a resolver for a tenant.
    ///
    /// The static key, if any, is parsed here so a misconfigured key fails
    /// startup instead of every request.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidStaticKey` if the static key is not a
    /// supported PEM public key.
    pub fn new(trust: &TrustConfig, settings: &JwksSettings) -> Result<Self, ConfigError> {
        let static_key = trust
            .static_key()
            .map(|pem| {
                SigningKey::from_pem(pem).map(Arc::new).map_err(|e| {
                    tracing::error!(
                        target: "authorizer.jwks",
                        tenant = %trust.name(),
                        error = %e,
                        "Failed to parse static public key"
                    );
                    ConfigError::InvalidStaticKey(trust.name().to_string())
                })
            })
            .transpose()?;

        let http_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(settings.fetch_timeout))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        let capacity = NonZeroUsize::new(settings.cache_max_entries).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            inner: Arc::new(ResolverInner {
                tenant: trust.name().to_string(),
                jwks_uri: trust.jwks_uri().map(ToString::to_string),
                static_key,
                http_client,
                cache: Mutex::new(LruCache::new(capacity)),
                cache_ttl: settings.cache_ttl,
                in_flight: Mutex::new(HashMap::new()),
                rate_limiter: FetchRateLimiter::new(settings.requests_per_minute),
            }),
        })
    }

    /// Tenant this resolver serves.
    pub fn tenant(&self) -> &str {
        &self.inner.tenant
    }

    /// Resolve the key for a token.
    ///
    /// With a key ID the key comes from the cache or the key-set endpoint;
    /// without one the tenant's static key is used.
    ///
    /// # Errors
    ///
    /// Returns a `KeyResolutionError` when no usable key can be obtained.
    #[instrument(skip_all, fields(tenant = %self.inner.tenant, kid = ?kid))]
    pub async fn resolve(&self, kid: Option<&str>) -> ResolveResult {
        match kid {
            Some(kid) => self.resolve_remote(kid).await,
            None => self.resolve_static(),
        }
    }

    /// Number of keys currently cached, fresh or stale.
    pub fn cached_len(&self) -> usize {
        lock(&self.inner.cache).len()
    }

    fn resolve_static(&self) -> ResolveResult {
        match &self.inner.static_key {
            Some(key) => {
                tracing::debug!(target: "authorizer.jwks", tenant = %self.inner.tenant, "Using static public key");
                Ok(Arc::clone(key))
            }
            None => {
                tracing::debug!(target: "authorizer.jwks", tenant = %self.inner.tenant, "Token has no kid and no static key is configured");
                Err(KeyResolutionError::NoStaticKey)
            }
        }
    }

    async fn resolve_remote(&self, kid: &str) -> ResolveResult {
        if self.inner.jwks_uri.is_none() {
            tracing::debug!(target: "authorizer.jwks", tenant = %self.inner.tenant, "Token has kid but no key set URI is configured");
            return Err(KeyResolutionError::NoKeySetUri);
        }

        if let Some(key) = self.inner.cached(kid) {
            tracing::debug!(target: "authorizer.jwks", kid = %kid, "Signing key cache hit");
            metrics::record_key_cache(&self.inner.tenant, "hit");
            return Ok(key);
        }
        metrics::record_key_cache(&self.inner.tenant, "miss");

        let pending = {
            let mut in_flight = lock(&self.inner.in_flight);

            // A fetch may have completed between the cache check and taking
            // the lock. Fetches store into the cache before leaving in_flight.
            if let Some(key) = self.inner.cached(kid) {
                return Ok(key);
            }

            match in_flight.get(kid) {
                Some(pending) => {
                    tracing::debug!(target: "authorizer.jwks", kid = %kid, "Joining in-flight key set fetch");
                    pending.clone()
                }
                None => {
                    let pending = self.spawn_fetch(kid);
                    in_flight.insert(kid.to_string(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Start a fetch for `kid` on its own task.
    ///
    /// Must be called with the in_flight lock held; the task removes its own
    /// entry when done, which orders after the caller's insert.
    fn spawn_fetch(&self, kid: &str) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let kid = kid.to_string();

        let handle = tokio::spawn(async move {
            let outcome = inner.fetch_and_store(&kid).await;
            lock(&inner.in_flight).remove(&kid);
            outcome
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Key set fetch task failed");
                Err(KeyResolutionError::FetchAborted)
            })
        }
        .boxed()
        .shared()
    }
}

impl ResolverInner {
    /// Fresh cached key for `kid`, if any.
    fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        let mut cache = lock(&self.cache);
        cache
            .get(kid)
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| Arc::clone(&entry.key))
    }

    fn store(&self, kid: &str, key: Arc<SigningKey>) {
        let mut cache = lock(&self.cache);
        if let Some((evicted, _)) = cache.push(
            kid.to_string(),
            CachedKey {
                key,
                fetched_at: Instant::now(),
            },
        ) {
            if evicted != kid {
                tracing::debug!(target: "authorizer.jwks", kid = %evicted, "Evicted signing key from cache");
            }
        }
    }

    #[instrument(skip(self), fields(tenant = %self.tenant))]
    async fn fetch_and_store(&self, kid: &str) -> ResolveResult {
        let uri = self
            .jwks_uri
            .as_deref()
            .ok_or(KeyResolutionError::NoKeySetUri)?;

        let jwks = self.fetch_key_set(uri).await?;

        let jwk = jwks.find(kid).ok_or_else(|| {
            tracing::warn!(target: "authorizer.jwks", tenant = %self.tenant, kid = %kid, "Key not found in key set");
            KeyResolutionError::UnknownKeyId
        })?;

        let key = Arc::new(SigningKey::from_jwk(jwk).map_err(|e| {
            tracing::warn!(target: "authorizer.jwks", tenant = %self.tenant, kid = %kid, error = %e, "Key set entry is not usable");
            e
        })?);

        self.store(kid, Arc::clone(&key));
        Ok(key)
    }

    /// Fetch the key set, retrying once on transient failure.
    async fn fetch_key_set(&self, uri: &str) -> Result<JwksResponse, KeyResolutionError> {
        let mut attempt = 1;
        loop {
            if !self.rate_limiter.try_acquire() {
                tracing::warn!(target: "authorizer.jwks", tenant = %self.tenant, "Key set fetch rate limit exceeded");
                metrics::record_jwks_fetch(&self.tenant, "rate_limited", Duration::ZERO);
                return Err(KeyResolutionError::RateLimited);
            }

            let started = Instant::now();
            let result = self.fetch_once(uri).await;
            let status = match &result {
                Ok(_) => "success",
                Err(e) => e.as_label(),
            };
            metrics::record_jwks_fetch(&self.tenant, status, started.elapsed());

            match result {
                Err(e) if e.is_retryable() && attempt < MAX_FETCH_ATTEMPTS => {
                    tracing::warn!(
                        target: "authorizer.jwks",
                        tenant = %self.tenant,
                        error = %e,
                        attempt = attempt,
                        "Key set fetch failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(&self, uri: &str) -> Result<JwksResponse, KeyResolutionError> {
        tracing::debug!(target: "authorizer.jwks", url = %uri, "Fetching key set");

        let response = self
            .http_client
            .get(uri)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        if !response.status().is_success() {
            tracing::error!(
                target: "authorizer.jwks",
                status = %response.status(),
                "Key set endpoint returned error"
            );
            return Err(KeyResolutionError::UpstreamStatus(response.status().as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_JWKS_BODY_BYTES as u64)
        {
            return Err(KeyResolutionError::MalformedKeySet(
                "key set document too large".to_string(),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_request_error(&e))?;

        if body.len() > MAX_JWKS_BODY_BYTES {
            return Err(KeyResolutionError::MalformedKeySet(
                "key set document too large".to_string(),
            ));
        }

        let jwks: JwksResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, "Failed to parse key set response");
            KeyResolutionError::MalformedKeySet(e.to_string())
        })?;

        tracing::info!(
            target: "authorizer.jwks",
            tenant = %self.tenant,
            key_count = jwks.keys.len(),
            "Key set fetched"
        );

        Ok(jwks)
    }
}

fn classify_request_error(err: &reqwest::Error) -> KeyResolutionError {
    if err.is_timeout() {
        tracing::error!(target: "authorizer.jwks", "Key set request timed out");
        KeyResolutionError::Timeout
    } else {
        tracing::error!(target: "authorizer.jwks", error = %err, "Failed to fetch key set");
        KeyResolutionError::Network(err.to_string())
    }
}
