use std::time::Duration;

use aliri::jwa;

use crate::{error::SetupError, ClaimPolicy, IdentityProvider};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Clock skew tolerated when no other value is configured
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_millis(5000);

/// HTTP request timeout used when no other value is configured
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Signing algorithms accepted when no other set is configured
pub const DEFAULT_ALGORITHMS: &[jwa::Algorithm] = &[
    jwa::Algorithm::RS256,
    jwa::Algorithm::RS384,
    jwa::Algorithm::RS512,
    jwa::Algorithm::PS256,
    jwa::Algorithm::PS384,
    jwa::Algorithm::PS512,
];

/// The trust settings for a single token issuer
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct IdentityProviderConfig {
    issuer: String,
    clock_skew: Duration,
    approved_algorithms: Vec<jwa::Algorithm>,
    key_ttl: Option<Duration>,
}

impl IdentityProviderConfig {
    /// Trust tokens signed by keys published by `issuer`
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            approved_algorithms: DEFAULT_ALGORITHMS.to_vec(),
            key_ttl: None,
        }
    }

    /// Sets the slack allowed around the `exp`, `nbf`, and `iat` claims
    pub fn with_clock_skew(self, clock_skew: Duration) -> Self {
        Self { clock_skew, ..self }
    }

    /// Replaces the set of acceptable signing algorithms
    ///
    /// An empty set keeps [`DEFAULT_ALGORITHMS`], since token validation
    /// treats an empty set as accepting any algorithm.
    pub fn with_approved_algorithms<I>(self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = jwa::Algorithm>,
    {
        let mut approved_algorithms: Vec<_> = algorithms.into_iter().collect();
        if approved_algorithms.is_empty() {
            approved_algorithms = DEFAULT_ALGORITHMS.to_vec();
        }

        Self {
            approved_algorithms,
            ..self
        }
    }

    /// Bounds how long a resolved signing key may be reused
    pub fn with_key_ttl(self, key_ttl: Option<Duration>) -> Self {
        Self { key_ttl, ..self }
    }

    /// The issuer URL
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The slack allowed around the `exp`, `nbf`, and `iat` claims
    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// The acceptable signing algorithms
    #[must_use]
    pub fn approved_algorithms(&self) -> &[jwa::Algorithm] {
        &self.approved_algorithms
    }

    /// How long a resolved signing key may be reused, if bounded
    #[must_use]
    pub fn key_ttl(&self) -> Option<Duration> {
        self.key_ttl
    }

    /// The OpenID Connect discovery document URL for this issuer
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.issuer.trim_end_matches('/'), DISCOVERY_PATH)
    }

    /// The provider family, determined from the issuer URL
    #[must_use]
    pub fn provider(&self) -> IdentityProvider {
        IdentityProvider::from_issuer(&self.issuer)
    }
}

/// Everything needed to assemble an [`Authorizer`][crate::Authorizer]
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct AuthorizerConfig {
    identity_provider: IdentityProviderConfig,
    claim_requirements: Option<String>,
    http_timeout: Duration,
}

impl AuthorizerConfig {
    /// Authorize tokens from `issuer` with default settings
    pub fn new(issuer: impl Into<String>) -> Self {
        Self::from_identity_provider(IdentityProviderConfig::new(issuer))
    }

    /// Authorize tokens from the given issuer configuration
    pub fn from_identity_provider(identity_provider: IdentityProviderConfig) -> Self {
        Self {
            identity_provider,
            claim_requirements: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Sets the claim requirement string, `claim=value1 value2,claim2=value3`
    pub fn with_claim_requirements(self, requirements: impl Into<String>) -> Self {
        Self {
            claim_requirements: Some(requirements.into()),
            ..self
        }
    }

    /// Sets the timeout for discovery and key set requests
    pub fn with_http_timeout(self, http_timeout: Duration) -> Self {
        Self {
            http_timeout,
            ..self
        }
    }

    /// Modifies the issuer configuration
    pub fn map_identity_provider<F>(self, f: F) -> Self
    where
        F: FnOnce(IdentityProviderConfig) -> IdentityProviderConfig,
    {
        Self {
            identity_provider: f(self.identity_provider),
            ..self
        }
    }

    /// The issuer configuration
    pub fn identity_provider(&self) -> &IdentityProviderConfig {
        &self.identity_provider
    }

    /// The raw claim requirement string, if any
    #[must_use]
    pub fn claim_requirements(&self) -> Option<&str> {
        self.claim_requirements.as_deref()
    }

    /// The timeout for discovery and key set requests
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// The effective claim policy: the provider's built-in requirements
    /// extended with the configured ones
    ///
    /// # Errors
    ///
    /// Returns an error if the claim requirement string is malformed.
    pub fn claim_policy(&self) -> Result<ClaimPolicy, SetupError> {
        let configured = match &self.claim_requirements {
            Some(reqs) => reqs.parse()?,
            None => ClaimPolicy::allow_any(),
        };

        Ok(self.identity_provider.provider().claim_policy(configured))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    #[test]
    fn discovery_url_appends_well_known_path() {
        let config = IdentityProviderConfig::new("https://idp.example.com/realms/saas");
        assert_eq!(
            config.discovery_url(),
            "https://idp.example.com/realms/saas/.well-known/openid-configuration"
        );

        let config = IdentityProviderConfig::new("https://idp.example.com/");
        assert_eq!(
            config.discovery_url(),
            "https://idp.example.com/.well-known/openid-configuration"
        );
    }

    #[test]
    fn defaults() {
        let config = AuthorizerConfig::new("https://idp.example.com");

        assert_eq!(config.identity_provider().clock_skew(), Duration::from_secs(5));
        assert_eq!(config.identity_provider().key_ttl(), None);
        assert_eq!(
            config.identity_provider().approved_algorithms(),
            DEFAULT_ALGORITHMS
        );
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.claim_requirements(), None);
    }

    #[test]
    fn empty_algorithm_set_keeps_defaults() {
        let config = IdentityProviderConfig::new("https://idp.example.com")
            .with_approved_algorithms([jwa::Algorithm::HS256])
            .with_approved_algorithms(std::iter::empty());

        assert_eq!(config.approved_algorithms(), DEFAULT_ALGORITHMS);
    }

    #[test]
    fn claim_policy_combines_provider_and_configuration() -> Result<()> {
        let config = AuthorizerConfig::new("https://dev-1.okta.com/oauth2/default")
            .with_claim_requirements("groups=admins");

        let expected = ClaimPolicy::allow_any()
            .require("scp", ["saas-boost-api:admin"])
            .require("groups", ["admins"]);

        assert_eq!(config.claim_policy()?, expected);
        Ok(())
    }

    #[test]
    fn malformed_requirements_fail_setup() {
        let config =
            AuthorizerConfig::new("https://idp.example.com").with_claim_requirements("scope");

        assert!(matches!(
            config.claim_policy(),
            Err(SetupError::ClaimRequirements(_))
        ));
    }
}
