use std::fmt;

use crate::ClaimPolicy;

const COGNITO_FRAGMENTS: &[&str] = &["cognito-idp."];
const OKTA_FRAGMENTS: &[&str] = &[".okta.com", ".oktapreview.com", ".okta-emea.com"];

/// The family of identity provider that issues tokens
///
/// Each family carries its own built-in claim requirements.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum IdentityProvider {
    /// A generic OIDC provider, constrained only by configured requirements
    Default,

    /// Amazon Cognito user pools
    ///
    /// Requires `token_use` to be `access` or `id`.
    Cognito,

    /// Okta authorization servers
    ///
    /// Requires `scp` to include `saas-boost-api:admin`.
    Okta,
}

impl IdentityProvider {
    /// Selects the provider family by inspecting the issuer's host name
    #[must_use]
    pub fn from_issuer(issuer: &str) -> Self {
        let issuer = issuer.to_ascii_lowercase();
        let matches = |fragments: &[&str]| fragments.iter().any(|f| issuer.contains(f));

        if matches(COGNITO_FRAGMENTS) {
            Self::Cognito
        } else if matches(OKTA_FRAGMENTS) {
            Self::Okta
        } else {
            Self::Default
        }
    }

    /// The requirements every token from this provider must satisfy
    pub fn builtin_policy(self) -> ClaimPolicy {
        match self {
            Self::Default => ClaimPolicy::allow_any(),
            Self::Cognito => ClaimPolicy::allow_any().require("token_use", ["access", "id"]),
            Self::Okta => ClaimPolicy::allow_any().require("scp", ["saas-boost-api:admin"]),
        }
    }

    /// The built-in requirements extended with `configured`
    pub fn claim_policy(self, configured: ClaimPolicy) -> ClaimPolicy {
        self.builtin_policy().and(configured)
    }

    /// A short name for the provider family
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Cognito => "cognito",
            Self::Okta => "okta",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
