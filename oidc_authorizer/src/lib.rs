//! Bearer-token authorization for `execute-api` style gateways
//!
//! This crate verifies an OIDC-issued JSON Web Token presented on an
//! inbound API call, enforces identity-provider-specific requirements on
//! the token's claims, and produces an access policy describing which API
//! operations the caller may invoke.
//!
//! The pieces, from the leaves up:
//!
//! * [`MethodArn`] and [`Resource`] describe the call being authorized.
//! * A [`KeyResolver`] finds the issuer's signing key through OIDC discovery
//!   and the published JSON Web Key Set, caching what it finds.
//! * An [`OidcVerifier`] checks the token signature and timing claims, then
//!   applies the provider's [`ClaimPolicy`].
//! * A [`PolicyDocument`] scopes the resulting Allow or Deny to the API stage.
//! * The [`Authorizer`] wires it all together and never fails open.
//!
//! # Example
//!
//! ```no_run
//! use oidc_authorizer::{Authorizer, AuthorizerConfig, TokenAuthorizerEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorizerConfig::new("https://idp.example.com/realms/api")
//!     .with_claim_requirements("scope=api:admin");
//! let authorizer = Authorizer::from_config(&config)?;
//!
//! let event: TokenAuthorizerEvent = serde_json::from_str(r#"{
//!     "type": "TOKEN",
//!     "authorizationToken": "Bearer eyJ...",
//!     "methodArn": "arn:aws:execute-api:us-east-1:111111111111:api/v1/GET/settings"
//! }"#)?;
//!
//! let response = authorizer.authorize(&event).await?;
//! println!("{}", serde_json::to_string(&response)?);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authorizer;
mod claims;
mod config;
pub mod document;
pub mod error;
pub mod jwks;
mod oidc;
mod policy;
mod provider;
mod resource;
mod verifier;

#[cfg(test)]
pub(crate) mod test;

pub use authorizer::{Authorizer, AuthorizerResponse, ANONYMOUS_PRINCIPAL, CONTEXT_CLAIMS};
pub use claims::Claims;
pub use config::{AuthorizerConfig, IdentityProviderConfig};
pub use document::{Effect, HttpMethod, PolicyDocument, Statement};
pub use jwks::{CachingKeyResolver, HttpJwksSource, JwkSet, JwksSource, KeyResolver};
pub use oidc::OidcConfiguration;
pub use policy::{ClaimPolicy, ClaimRequirementParseError, InsufficientPermissions};
pub use provider::IdentityProvider;
pub use resource::{MethodArn, Resource, TokenAuthorizerEvent};
pub use verifier::{OidcVerifier, TokenVerifier, BEARER_PREFIX};
