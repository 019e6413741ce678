//! Error types
//!
//! Only [`MalformedRequest`] is ever returned to the gateway as a failure.
//! Every [`TokenRejected`] variant is folded into a Deny decision by the
//! [`Authorizer`][crate::Authorizer]; the variants exist for diagnostics.

use std::error::Error as StdError;

use aliri::{error::JwtVerifyError, jwk::KeyId};
use thiserror::Error;

pub use crate::policy::{ClaimRequirementParseError, InsufficientPermissions};

/// The inbound request cannot be turned into a resource to authorize
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedRequest {
    /// The event is not a `TOKEN` authorizer event
    #[error("unsupported authorizer event type '{0}'")]
    UnsupportedEventType(String),

    /// The method ARN does not have the six `:` separated segments
    #[error("method ARN must have 6 ':' separated segments, found {found}")]
    ArnSegments {
        /// Number of segments present
        found: usize,
    },

    /// The API resource does not name the API, stage, and method
    #[error("method ARN resource must have at least 3 '/' separated parts, found {found}")]
    ResourceParts {
        /// Number of parts present
        found: usize,
    },
}

/// The presented token could not be parsed
#[derive(Debug, Error)]
pub enum MalformedToken {
    /// The authorization header does not carry a bearer token
    #[error("authorization token is not a bearer token")]
    MissingBearerPrefix,

    /// The JWT cannot be split into a decodable header, payload, and signature
    #[error("malformed JWT")]
    Jwt(#[source] JwtVerifyError),

    /// The JWT header does not identify its signing key
    #[error("JWT header does not name a signing key")]
    MissingKeyId,
}

/// The token signature or its validity window was rejected
#[derive(Debug, Error)]
#[error("token rejected during signature or claims validation")]
pub struct SignatureVerificationError {
    #[from]
    source: JwtVerifyError,
}

impl SignatureVerificationError {
    /// The underlying verification failure
    pub fn cause(&self) -> &JwtVerifyError {
        &self.source
    }
}

/// The signing key for a token could not be obtained from the issuer
#[derive(Debug, Error)]
pub enum KeyResolutionError {
    /// A discovery or key set document could not be fetched or decoded
    #[error("unable to retrieve {document} from {url}")]
    Unavailable {
        /// Which document was being retrieved
        document: &'static str,
        /// Where it was being retrieved from
        url: String,
        /// The underlying failure
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    /// The discovery document does not advertise a key set
    #[error("discovery document at {url} does not advertise a jwks_uri")]
    MissingJwksUri {
        /// The discovery document URL
        url: String,
    },

    /// No published key carries the requested key ID
    #[error("no key with id '{kid}' published at {jwks_uri}")]
    UnknownKeyId {
        /// The requested key ID
        kid: KeyId,
        /// The key set URL that was searched
        jwks_uri: String,
    },

    /// The published key could not be decoded into a usable verification key
    #[error("key '{kid}' published at {jwks_uri} is not a usable signing key")]
    UnusableKey {
        /// The requested key ID
        kid: KeyId,
        /// The key set URL that published the key
        jwks_uri: String,
        /// The decoding failure
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn unavailable(
    document: &'static str,
    url: impl Into<String>,
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> KeyResolutionError {
    KeyResolutionError::Unavailable {
        document,
        url: url.into(),
        source: source.into(),
    }
}

/// A token was refused
///
/// All variants lead to the same Deny decision.
#[derive(Debug, Error)]
pub enum TokenRejected {
    /// The token could not be parsed
    #[error(transparent)]
    MalformedToken(#[from] MalformedToken),

    /// The signature, expiry, or validity window was rejected
    #[error(transparent)]
    SignatureVerification(#[from] SignatureVerificationError),

    /// The signing key could not be obtained
    #[error(transparent)]
    KeyResolution(#[from] KeyResolutionError),

    /// The claims do not satisfy the provider's claim policy
    #[error(transparent)]
    InsufficientPermissions(#[from] InsufficientPermissions),
}

impl TokenRejected {
    /// A short, stable label for the rejection kind, suitable for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed_token",
            Self::SignatureVerification(_) => "signature_verification",
            Self::KeyResolution(_) => "key_resolution",
            Self::InsufficientPermissions(_) => "insufficient_permissions",
        }
    }

    /// Whether the token could not be parsed
    #[must_use]
    pub fn is_malformed_token(&self) -> bool {
        matches!(self, Self::MalformedToken(_))
    }

    /// Whether the signature or validity window was rejected
    #[must_use]
    pub fn is_signature_verification(&self) -> bool {
        matches!(self, Self::SignatureVerification(_))
    }

    /// Whether the signing key could not be obtained
    #[must_use]
    pub fn is_key_resolution(&self) -> bool {
        matches!(self, Self::KeyResolution(_))
    }

    /// Whether the claim policy denied the token
    #[must_use]
    pub fn is_insufficient_permissions(&self) -> bool {
        matches!(self, Self::InsufficientPermissions(_))
    }
}

/// The authorizer could not be assembled from its configuration
#[derive(Debug, Error)]
pub enum SetupError {
    /// The HTTP client used for discovery could not be built
    #[error("unable to build HTTP client")]
    HttpClient(#[from] reqwest::Error),

    /// The claim requirement string could not be parsed
    #[error("invalid claim requirements")]
    ClaimRequirements(#[from] ClaimRequirementParseError),
}
