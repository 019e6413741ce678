use std::{collections::BTreeMap, error::Error as StdError};

use serde::Serialize;

use crate::{
    document::Effect,
    error::{MalformedRequest, SetupError},
    AuthorizerConfig, CachingKeyResolver, Claims, MethodArn, OidcVerifier, PolicyDocument,
    TokenAuthorizerEvent, TokenVerifier,
};

/// The principal reported when a token is refused
pub const ANONYMOUS_PRINCIPAL: &str = "user";

/// The claims copied into the response context, when present
///
/// `scp` is reported under `scope`, replacing any `scope` claim.
pub const CONTEXT_CLAIMS: &[&str] = &[
    "issuer", "id", "sub", "email", "name", "scope", "scp", "groups",
];

/// The decision returned to the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    /// The caller's subject, or [`ANONYMOUS_PRINCIPAL`] on Deny
    pub principal_id: String,

    /// The access policy for the API stage
    pub policy_document: PolicyDocument,

    /// Caller identity attributes, omitted when none were found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl AuthorizerResponse {
    /// The effect of the first statement in the policy
    #[must_use]
    pub fn effect(&self) -> Option<Effect> {
        self.policy_document.statements().next().map(|s| s.effect())
    }

    /// Whether the policy grants access
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect() == Some(Effect::Allow)
    }

    fn allow(principal_id: &str, arn: &MethodArn, claims: &Claims) -> Self {
        let context = context(claims);
        Self {
            principal_id: principal_id.to_owned(),
            policy_document: PolicyDocument::allow_all(
                arn.region(),
                arn.account_id(),
                arn.api_id(),
                arn.stage(),
            ),
            context: (!context.is_empty()).then_some(context),
        }
    }

    fn deny(arn: &MethodArn) -> Self {
        Self {
            principal_id: ANONYMOUS_PRINCIPAL.to_owned(),
            policy_document: PolicyDocument::deny_all(
                arn.region(),
                arn.account_id(),
                arn.api_id(),
                arn.stage(),
            ),
            context: None,
        }
    }
}

fn context(claims: &Claims) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    for &claim in CONTEXT_CLAIMS {
        if let Some(value) = claims.render(claim) {
            let key = if claim == "scp" { "scope" } else { claim };
            context.insert(key.to_owned(), value);
        }
    }
    context
}

/// Turns authorizer events into Allow or Deny decisions
///
/// Every token failure becomes a Deny; only a request that does not
/// describe a resource is reported as an error.
#[derive(Debug)]
pub struct Authorizer<V = OidcVerifier<CachingKeyResolver>> {
    verifier: V,
}

impl Authorizer {
    /// Assembles an authorizer that discovers keys over HTTP
    ///
    /// # Errors
    ///
    /// Returns an error if the claim requirements are malformed or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &AuthorizerConfig) -> Result<Self, SetupError> {
        let issuer = config.identity_provider().clone();
        let policy = config.claim_policy()?;
        let resolver = CachingKeyResolver::http(config.http_timeout())?;

        tracing::info!(
            issuer = %issuer.issuer(),
            provider = %issuer.provider(),
            claim_policy = %policy,
            "configured authorizer"
        );

        Ok(Self::new(OidcVerifier::new(issuer, resolver, policy)))
    }
}

impl<V> Authorizer<V>
where
    V: TokenVerifier,
{
    /// Constructs an authorizer around a token verifier
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// The token verifier
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Decides whether the caller in `event` may invoke the API
    ///
    /// # Errors
    ///
    /// Returns an error if the event does not name a method ARN that can be
    /// parsed. Token problems are never errors; they produce a Deny.
    #[tracing::instrument(
        skip_all,
        fields(
            method_arn = %event.method_arn,
            principal_id = tracing::field::Empty,
            effect = tracing::field::Empty,
        ),
    )]
    pub async fn authorize(
        &self,
        event: &TokenAuthorizerEvent,
    ) -> Result<AuthorizerResponse, MalformedRequest> {
        let arn = event.method_arn()?;

        let response = match self
            .verifier
            .verify(&event.authorization_token, arn.resource())
            .await
        {
            Ok(claims) => match claims.subject() {
                Some(subject) => AuthorizerResponse::allow(subject, &arn, &claims),
                None => {
                    tracing::warn!(reason = "missing_subject", "token rejected");
                    AuthorizerResponse::deny(&arn)
                }
            },
            Err(rejected) => {
                tracing::warn!(
                    reason = rejected.kind(),
                    error = (&rejected as &dyn StdError),
                    "token rejected"
                );
                AuthorizerResponse::deny(&arn)
            }
        };

        let span = tracing::Span::current();
        span.record("principal_id", response.principal_id.as_str());
        span.record("effect", tracing::field::debug(response.effect()));
        tracing::info!("authorization decided");

        Ok(response)
    }
}
