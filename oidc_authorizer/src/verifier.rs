use aliri::{
    error::ClaimsRejected,
    jwt::{self, CoreClaims, CoreHeaders},
    JwtRef,
};
use aliri_clock::{Clock, System, UnixTime};
use aliri_traits::Policy;
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    error::{MalformedToken, SignatureVerificationError, TokenRejected},
    ClaimPolicy, Claims, IdentityProviderConfig, InsufficientPermissions, KeyResolver, Resource,
};

/// The prefix an `Authorization` header value must carry
pub const BEARER_PREFIX: &str = "Bearer ";

/// Verifies a bearer token presented for a resource
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies `raw_token`, the full `Authorization` header value, and
    /// returns the token's claims
    ///
    /// # Errors
    ///
    /// Returns an error describing why the token was rejected.
    async fn verify(&self, raw_token: &str, resource: &Resource) -> Result<Claims, TokenRejected>;
}

/// Verifies OIDC-issued JWTs against the issuer's published signing keys
///
/// A token is accepted when:
///
/// * it is presented as a bearer token;
/// * its header names a key the issuer publishes;
/// * its signature is valid for that key with an approved algorithm;
/// * it has not expired, and its `nbf` and `iat` are not in the future,
///   all within the issuer's clock skew;
/// * it names a subject; and
/// * its claims satisfy the claim policy.
#[derive(Debug)]
pub struct OidcVerifier<K, P = ClaimPolicy, C = System> {
    issuer: IdentityProviderConfig,
    resolver: K,
    policy: P,
    clock: C,
    validator: jwt::CoreValidator,
}

impl<K, P> OidcVerifier<K, P> {
    /// Constructs a verifier for tokens from `issuer`
    pub fn new(issuer: IdentityProviderConfig, resolver: K, policy: P) -> Self {
        let validator = jwt::CoreValidator::default()
            .ignore_expiration()
            .extend_approved_algorithms(issuer.approved_algorithms().iter().copied());

        Self {
            issuer,
            resolver,
            policy,
            clock: System,
            validator,
        }
    }
}

impl<K, P, C> OidcVerifier<K, P, C> {
    /// Replaces the clock used to check token lifetimes
    pub fn with_clock<C2>(self, clock: C2) -> OidcVerifier<K, P, C2> {
        OidcVerifier {
            issuer: self.issuer,
            resolver: self.resolver,
            policy: self.policy,
            clock,
            validator: self.validator,
        }
    }

    /// The issuer whose tokens are accepted
    pub fn issuer(&self) -> &IdentityProviderConfig {
        &self.issuer
    }

    /// The claim policy applied to verified tokens
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The key resolver
    pub fn resolver(&self) -> &K {
        &self.resolver
    }
}

#[async_trait]
impl<K, P, C> TokenVerifier for OidcVerifier<K, P, C>
where
    K: KeyResolver,
    P: Policy<Request = Claims, Denial = InsufficientPermissions> + Send + Sync,
    C: Clock + Send + Sync,
{
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(
            http_method = resource.http_method(),
            resource_path = resource.resource_path(),
        ),
    )]
    async fn verify(&self, raw_token: &str, resource: &Resource) -> Result<Claims, TokenRejected> {
        let token = raw_token
            .strip_prefix(BEARER_PREFIX)
            .ok_or(MalformedToken::MissingBearerPrefix)?;
        let token = JwtRef::from_str(token.trim());

        let decomposed: jwt::Decomposed = token.decompose().map_err(MalformedToken::Jwt)?;
        let kid = decomposed
            .kid()
            .map(ToOwned::to_owned)
            .ok_or(MalformedToken::MissingKeyId)?;

        let key = self.resolver.resolve(&self.issuer, &kid).await?;

        let lifetime = LifetimeValidator {
            clock: &self.clock,
            skew_millis: self.issuer.clock_skew().as_millis(),
        };
        let validated: jwt::Validated<Claims> = decomposed
            .verify_with_custom(&*key, &self.validator, lifetime)
            .map_err(SignatureVerificationError::from)?;
        let (_, claims) = validated.extract();

        self.policy.evaluate(&claims)?;

        tracing::debug!(%kid, "token verified");
        Ok(claims)
    }
}

/// The token's `iat` is later than the current time
#[derive(Clone, Copy, Debug, Error)]
#[error("token issued in the future")]
struct IssuedInFuture;

/// Checks `exp`, `nbf`, and `iat` at millisecond resolution, and requires `sub`
struct LifetimeValidator<'a, C> {
    clock: &'a C,
    skew_millis: u128,
}

fn millis(time: UnixTime) -> u128 {
    u128::from(time.0) * 1000
}

impl<H, C> jwt::ClaimsValidator<Claims, H> for LifetimeValidator<'_, C>
where
    C: Clock,
{
    fn validate(&self, _header: &H, claims: &Claims) -> Result<(), ClaimsRejected> {
        let now = millis(self.clock.now());

        let exp = claims
            .exp()
            .ok_or(ClaimsRejected::MissingRequiredClaim("exp"))?;
        if millis(exp) + self.skew_millis <= now {
            return Err(ClaimsRejected::TokenExpired);
        }

        if let Some(nbf) = claims.nbf() {
            if millis(nbf) > now + self.skew_millis {
                return Err(ClaimsRejected::TokenNotYetValid);
            }
        }

        if let Some(iat) = claims.issued_at() {
            if millis(iat) > now + self.skew_millis {
                return Err(ClaimsRejected::Custom(Box::new(IssuedInFuture)));
            }
        }

        if claims.sub().is_none() {
            return Err(ClaimsRejected::MissingRequiredClaim("sub"));
        }

        Ok(())
    }
}
