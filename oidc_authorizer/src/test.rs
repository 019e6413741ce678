//! Shared fixtures for unit tests

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use aliri::{
    jwa,
    jwk::{KeyId, KeyIdRef},
    jwt, Jwk,
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    error::KeyResolutionError,
    jwks::{JwkSet, JwksSource, KeyResolver},
    IdentityProviderConfig, OidcConfiguration,
};

pub const ISSUER: &str = "https://idp.example.com";
pub const JWKS_URI: &str = "https://idp.example.com/keys";

/// Base64url-encoded HMAC secret
pub const SECRET: &str = "b2lkYy1hdXRob3JpemVyLXRlc3Qtc2lnbmluZy1zZWNyZXQtMDAwMQ";
/// A second, unrelated HMAC secret
pub const OTHER_SECRET: &str = "b2lkYy1hdXRob3JpemVyLW90aGVyLXNpZ25pbmctc2VjcmV0LTAwMg";

pub const NOW: u64 = 1_700_000_000;

pub fn kid(kid: &'static str) -> &'static KeyIdRef {
    KeyIdRef::from_static(kid)
}

pub fn jwk_json(kid: &str, secret: &str) -> Value {
    json!({
        "kty": "oct",
        "kid": kid,
        "use": "sig",
        "alg": "HS256",
        "k": secret,
    })
}

pub fn signing_key(kid: &str, secret: &str) -> Jwk {
    serde_json::from_str(&jwk_json(kid, secret).to_string()).expect("test key is valid")
}

pub const RSA_KID: &str = "r1";

/// Modulus of a 2048-bit RSA key with exponent `AQAB`
const RSA_MODULUS: &str = concat!(
    "Y94bFOmGkMfEei3O3xmNeKeLm81ylq7CURFwzQwc5JpXtCvnPXjYXCeGLg_sga8Rr19W0LeF10CZFwuSqowLX8ii9Cmz",
    "c5q8-1Mf82fsDWW4ZO7mNVrlFoDjnMEwixFPx4rzsxtm2q60owHUwgZBp-cbeo3020HKFOKco-bfShU71MF58YL6u92e",
    "UymLmgxl7l-iudLvJMNTX2JJqYlq2cLPaey-HxcI8EJAOszEB4musoXmGmV3OzWRd_j_RIx9ulDspcIFbC3vrJOhH5aZ",
    "g3uaMYzfpr0YrzvEOuIjNU2NA5MtWTe2UaHNuWPfjNKjgQx51vz0n-w7W38d_5_gZQ",
);

/// An RS256 token signed by the [`RSA_KID`] key, carrying
/// `claims_with_scope("openid admin")`
pub const RS256_TOKEN: &str = concat!(
    "eyJhbGciOiJSUzI1NiIsImtpZCI6InIxIn0.",
    "eyJpc3MiOiJodHRwczovL2lkcC5leGFtcGxlLmNvbSIsInN1YiI6InVzZXItMTIzIiwiYXVkIjoic2Fhcy1hcGkiLCJp",
    "YXQiOjE2OTk5OTk5NDAsImV4cCI6MTcwMDAwMzYwMCwic2NvcGUiOiJvcGVuaWQgYWRtaW4ifQ.",
    "Zewyv73xHFU56c5ylRPcwcggX5EQLRUKAjSVCMWtfqBPkxMgU5ETxTOXAozpi0oDDmeTpKOzxWIo09mbvg0sWqzzv0Yt",
    "xFuYHgURzmbpTeQK9_DVYZkNc-Pfqm6NR6l5zvS3KdHS4nbfUzzLbGAOrR9FDEH6guuLBc9igrzpr03MBP8m6Wsu16nv",
    "VbZAF_kAWZo0VLNXXM4KUcGWMvEbx5uMRCUBnH-OP0nBzEHfnTbqxUZzT4KOtbf2rEK-WwCJrIOkaQhDsEA4T9NH4tdz",
    "46lblFpvN1zm40tcOVhuADlByEJXm5XXCuh0ioo_PkxYQo1jj3zP-_oxTJl6JPcMlA",
);

/// The public half of the RSA key, as an issuer publishes it
pub fn rsa_jwk_json() -> Value {
    json!({
        "kty": "RSA",
        "kid": RSA_KID,
        "use": "sig",
        "alg": "RS256",
        "n": RSA_MODULUS,
        "e": "AQAB",
    })
}

/// A P-256 public key
pub fn ec_jwk_json(kid: &str) -> Value {
    json!({
        "kty": "EC",
        "kid": kid,
        "use": "sig",
        "alg": "ES256",
        "crv": "P-256",
        "x": "7LLrD9SVRTBu_syIboeCC1UNw3yeLxvAe9zZ_VAgrXY",
        "y": "KEsqWyaIRDVBKm6CGuwOYhUy5uK5mcOoCRtMaLCEu8M",
    })
}

/// Signs `claims` with an HS256 key, returning the compact JWT
pub fn mint(kid: &'static str, secret: &str, claims: &Value) -> String {
    let headers = jwt::BasicHeaders::with_key_id(jwa::Algorithm::HS256, KeyId::from_static(kid));
    let token = jwt::Jwt::try_from_parts_with_signature(&headers, claims, &signing_key(kid, secret))
        .expect("test token can be signed");
    token.as_str().to_owned()
}

/// Claims valid at [`NOW`] for a caller with the given scope
pub fn claims_with_scope(scope: &str) -> Value {
    json!({
        "iss": ISSUER,
        "sub": "user-123",
        "aud": "saas-api",
        "iat": NOW - 60,
        "exp": NOW + 3600,
        "scope": scope,
    })
}

/// A document source serving fixed documents and counting requests
#[derive(Debug)]
pub struct FakeJwksSource {
    configuration: OidcConfiguration,
    key_set: JwkSet,
    pub discoveries: AtomicUsize,
    pub key_sets: AtomicUsize,
}

impl FakeJwksSource {
    pub fn new(configuration: OidcConfiguration, key_set: JwkSet) -> Self {
        Self {
            configuration,
            key_set,
            discoveries: AtomicUsize::new(0),
            key_sets: AtomicUsize::new(0),
        }
    }

    pub fn with_keys(keys: Vec<Value>) -> Self {
        Self::new(
            OidcConfiguration {
                issuer: Some(ISSUER.to_owned()),
                jwks_uri: Some(JWKS_URI.to_owned()),
            },
            JwkSet::new(keys),
        )
    }
}

#[async_trait]
impl JwksSource for FakeJwksSource {
    async fn discovery_document(&self, _url: &str) -> Result<OidcConfiguration, KeyResolutionError> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(self.configuration.clone())
    }

    async fn key_set(&self, _url: &str) -> Result<JwkSet, KeyResolutionError> {
        self.key_sets.fetch_add(1, Ordering::SeqCst);
        Ok(self.key_set.clone())
    }
}

/// A key resolver over a fixed set of keys
#[derive(Debug, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<KeyId, Arc<Jwk>>,
}

impl StaticKeyResolver {
    pub fn with_key(mut self, kid: &'static str, secret: &str) -> Self {
        self.keys
            .insert(KeyId::from_static(kid), Arc::new(signing_key(kid, secret)));
        self
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(
        &self,
        _issuer: &IdentityProviderConfig,
        kid: &KeyIdRef,
    ) -> Result<Arc<Jwk>, KeyResolutionError> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyResolutionError::UnknownKeyId {
                kid: kid.to_owned(),
                jwks_uri: JWKS_URI.to_owned(),
            })
    }
}
