//! Signing key resolution through OIDC discovery
//!
//! A [`KeyResolver`] turns an issuer and key ID into a verification key.
//! [`CachingKeyResolver`] does so by reading the issuer's discovery document,
//! then its JSON Web Key Set, and remembers each key it finds. The documents
//! themselves come from a [`JwksSource`], normally [`HttpJwksSource`].

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use aliri::{
    jwk::{KeyId, KeyIdRef},
    Jwk,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::KeyResolutionError, IdentityProviderConfig, OidcConfiguration};

mod remote;

pub use remote::HttpJwksSource;

/// Resolves the key an issuer used to sign a token
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Finds the verification key with ID `kid` published by `issuer`
    async fn resolve(
        &self,
        issuer: &IdentityProviderConfig,
        kid: &KeyIdRef,
    ) -> Result<Arc<Jwk>, KeyResolutionError>;
}

#[async_trait]
impl<T> KeyResolver for Arc<T>
where
    T: KeyResolver + ?Sized,
{
    async fn resolve(
        &self,
        issuer: &IdentityProviderConfig,
        kid: &KeyIdRef,
    ) -> Result<Arc<Jwk>, KeyResolutionError> {
        T::resolve(self, issuer, kid).await
    }
}

/// Retrieves the documents an issuer publishes about its signing keys
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Retrieves the discovery document at `url`
    async fn discovery_document(&self, url: &str) -> Result<OidcConfiguration, KeyResolutionError>;

    /// Retrieves the key set at `url`
    async fn key_set(&self, url: &str) -> Result<JwkSet, KeyResolutionError>;
}

/// A published JSON Web Key Set
///
/// Keys are held undecoded so that a key this crate cannot use does not
/// prevent finding one that it can.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkSet {
    #[serde(default)]
    keys: Vec<Value>,
}

impl JwkSet {
    /// Constructs a key set from raw JWK objects
    #[must_use]
    pub fn new(keys: Vec<Value>) -> Self {
        Self { keys }
    }

    /// The raw JWK object whose `kid` is `kid`
    #[must_use]
    pub fn find(&self, kid: &KeyIdRef) -> Option<&Value> {
        self.keys
            .iter()
            .find(|key| key.get("kid").and_then(Value::as_str) == Some(kid.as_str()))
    }

    /// The number of published keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

type CacheKey = (String, KeyId);

#[derive(Debug, Clone)]
struct CachedKey {
    key: Arc<Jwk>,
    fetched_at: Instant,
}

impl CachedKey {
    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(true, |ttl| self.fetched_at.elapsed() < ttl)
    }
}

/// A key resolver that remembers every key it resolves
///
/// Lookups never block. On a miss, the discovery document and key set are
/// fetched, with no retries, and only the requested key is cached. Concurrent
/// misses for the same key may each fetch; the first to finish is kept and
/// the others return it.
///
/// Cached keys are reused for the life of the resolver unless the issuer
/// configuration sets a [key TTL][IdentityProviderConfig::with_key_ttl].
#[derive(Debug)]
pub struct CachingKeyResolver<S = HttpJwksSource> {
    source: S,
    cache: ArcSwap<HashMap<CacheKey, CachedKey>>,
}

impl<S> CachingKeyResolver<S>
where
    S: JwksSource,
{
    /// Constructs a resolver with an empty cache
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// The number of keys currently cached
    #[must_use]
    pub fn cached_keys(&self) -> usize {
        self.cache.load().len()
    }

    /// The document source backing this resolver
    pub fn source(&self) -> &S {
        &self.source
    }

    fn cached(&self, cache_key: &CacheKey, ttl: Option<Duration>) -> Option<Arc<Jwk>> {
        self.cache
            .load()
            .get(cache_key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| Arc::clone(&entry.key))
    }

    /// Inserts `key` unless a fresh entry is already present, returning
    /// whichever entry ends up cached
    fn insert_if_absent(
        &self,
        cache_key: CacheKey,
        key: Arc<Jwk>,
        ttl: Option<Duration>,
    ) -> Arc<Jwk> {
        let entry = CachedKey {
            key,
            fetched_at: Instant::now(),
        };

        let previous = self.cache.rcu(|cache| match cache.get(&cache_key) {
            Some(existing) if existing.is_fresh(ttl) => Arc::clone(cache),
            _ => {
                let mut next = HashMap::clone(cache);
                next.insert(cache_key.clone(), entry.clone());
                Arc::new(next)
            }
        });

        match previous.get(&cache_key) {
            Some(existing) if existing.is_fresh(ttl) => {
                tracing::debug!("key was cached concurrently, using cached key");
                Arc::clone(&existing.key)
            }
            _ => entry.key,
        }
    }

    async fn fetch(
        &self,
        issuer: &IdentityProviderConfig,
        kid: &KeyIdRef,
    ) -> Result<Jwk, KeyResolutionError> {
        let discovery_url = issuer.discovery_url();
        let configuration = self.source.discovery_document(&discovery_url).await?;

        let jwks_uri = configuration
            .jwks_uri
            .ok_or(KeyResolutionError::MissingJwksUri { url: discovery_url })?;

        let key_set = self.source.key_set(&jwks_uri).await?;
        tracing::debug!(%jwks_uri, keys = key_set.len(), "retrieved key set");

        let raw = key_set
            .find(kid)
            .ok_or_else(|| KeyResolutionError::UnknownKeyId {
                kid: kid.to_owned(),
                jwks_uri: jwks_uri.clone(),
            })?;

        // `Jwk` borrows its base64url members, so it decodes from text only
        let jwk = serde_json::from_str::<Jwk>(&raw.to_string()).map_err(|source| {
            KeyResolutionError::UnusableKey {
                kid: kid.to_owned(),
                jwks_uri: jwks_uri.clone(),
                source,
            }
        })?;

        tracing::info!(%jwks_uri, "fetched signing key");
        Ok(jwk)
    }
}

impl CachingKeyResolver<HttpJwksSource> {
    /// Constructs a resolver that fetches documents over HTTP
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(HttpJwksSource::new(timeout)?))
    }
}

#[async_trait]
impl<S> KeyResolver for CachingKeyResolver<S>
where
    S: JwksSource,
{
    #[tracing::instrument(
        level = "debug",
        err,
        skip(self, issuer),
        fields(issuer = %issuer.issuer()),
    )]
    async fn resolve(
        &self,
        issuer: &IdentityProviderConfig,
        kid: &KeyIdRef,
    ) -> Result<Arc<Jwk>, KeyResolutionError> {
        let cache_key = (issuer.issuer().to_owned(), kid.to_owned());

        if let Some(key) = self.cached(&cache_key, issuer.key_ttl()) {
            tracing::debug!("signing key cache hit");
            return Ok(key);
        }

        tracing::debug!("signing key cache miss");
        let jwk = self.fetch(issuer, kid).await?;

        Ok(self.insert_if_absent(cache_key, Arc::new(jwk), issuer.key_ttl()))
    }
}
