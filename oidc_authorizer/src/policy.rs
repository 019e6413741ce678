use std::{
    collections::{btree_map, BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde_json::Value;
use thiserror::Error;

use crate::Claims;

/// Indicates that a token's claims do not satisfy a [`ClaimPolicy`]
#[derive(Clone, Debug, Hash, Eq, PartialEq, Error)]
pub enum InsufficientPermissions {
    /// A required claim is absent from the token
    #[error("required claim '{claim}' is missing")]
    MissingClaim {
        /// The required claim
        claim: String,
    },

    /// A required claim holds none of the acceptable values
    #[error("claim '{claim}' holds none of the acceptable values")]
    UnacceptedValue {
        /// The required claim
        claim: String,
    },
}

/// A claim requirement string could not be parsed
#[derive(Clone, Debug, Hash, Eq, PartialEq, Error)]
pub enum ClaimRequirementParseError {
    /// A requirement is not of the form `claim=values`
    #[error("claim requirement '{0}' must be of the form 'claim=value1 value2'")]
    MissingSeparator(String),

    /// A requirement does not name a claim
    #[error("claim requirement '{0}' does not name a claim")]
    EmptyClaimName(String),

    /// A requirement does not list any acceptable values
    #[error("claim requirement for '{0}' does not list any acceptable values")]
    NoAcceptableValues(String),
}

/// An access policy over the claims of a verified token
///
/// Each entry names a claim that must be present along with the set of
/// values that are acceptable for it. A claim is satisfied when any one
/// acceptable value is held:
///
/// * for an array claim, as an element of the array;
/// * for a string claim, as one of its whitespace-delimited tokens.
///
/// Every entry must be satisfied. A policy with no entries allows all
/// requests.
///
/// # Examples
///
/// ```
/// use aliri_traits::Policy;
/// use oidc_authorizer::{Claims, ClaimPolicy};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy: ClaimPolicy = "scope=admin".parse()?;
///
/// let claims: Claims = serde_json::from_str(r#"{"scope": "openid profile admin"}"#)?;
/// assert!(policy.evaluate(&claims).is_ok());
///
/// let claims: Claims = serde_json::from_str(r#"{"scope": "openid profile administrator"}"#)?;
/// assert!(policy.evaluate(&claims).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ClaimPolicy {
    requirements: BTreeMap<String, BTreeSet<String>>,
}

impl ClaimPolicy {
    /// Constructs a policy with no requirements, which allows all requests
    #[inline]
    pub const fn allow_any() -> Self {
        Self {
            requirements: BTreeMap::new(),
        }
    }

    /// Requires that `claim` holds one of `values`
    ///
    /// Values added for a claim that is already required widen the set of
    /// acceptable values for that claim.
    pub fn require<I, V>(mut self, claim: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.requirements
            .entry(claim.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds every requirement of `other` to this policy
    pub fn and(self, other: ClaimPolicy) -> Self {
        other
            .requirements
            .into_iter()
            .fold(self, |policy, (claim, values)| policy.require(claim, values))
    }

    /// Whether the policy has no requirements
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Iterates over each required claim and its acceptable values
    pub fn iter(&self) -> btree_map::Iter<'_, String, BTreeSet<String>> {
        self.requirements.iter()
    }
}

impl FromStr for ClaimPolicy {
    type Err = ClaimRequirementParseError;

    /// Parses `claim=value1 value2,claim2=value3`
    ///
    /// An empty or blank string is the empty policy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|req| !req.is_empty())
            .try_fold(Self::allow_any(), |policy, req| {
                let (claim, values) = req
                    .split_once('=')
                    .ok_or_else(|| ClaimRequirementParseError::MissingSeparator(req.to_owned()))?;

                let claim = claim.trim();
                if claim.is_empty() {
                    return Err(ClaimRequirementParseError::EmptyClaimName(req.to_owned()));
                }

                let mut values = values.split_whitespace().peekable();
                if values.peek().is_none() {
                    return Err(ClaimRequirementParseError::NoAcceptableValues(
                        claim.to_owned(),
                    ));
                }

                Ok(policy.require(claim, values))
            })
    }
}

impl fmt::Display for ClaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (claim, values) in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            first = false;

            write!(f, "{}=", claim)?;
            let mut values = values.iter();
            if let Some(value) = values.next() {
                f.write_str(value)?;
            }
            for value in values {
                write!(f, " {}", value)?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ClaimPolicy {
    type Item = (&'a String, &'a BTreeSet<String>);
    type IntoIter = btree_map::Iter<'a, String, BTreeSet<String>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl aliri_traits::Policy for ClaimPolicy {
    type Request = Claims;
    type Denial = InsufficientPermissions;

    fn evaluate(&self, claims: &Self::Request) -> Result<(), Self::Denial> {
        for (claim, accepted) in self {
            let held = match claims.get(claim) {
                None | Some(Value::Null) => {
                    return Err(InsufficientPermissions::MissingClaim {
                        claim: claim.clone(),
                    })
                }
                Some(held) => held,
            };

            if !holds_any(held, accepted) {
                return Err(InsufficientPermissions::UnacceptedValue {
                    claim: claim.clone(),
                });
            }
        }

        Ok(())
    }
}

fn holds_any(held: &Value, accepted: &BTreeSet<String>) -> bool {
    match held {
        Value::Array(items) => items.iter().any(|item| match item {
            Value::String(s) => accepted.contains(s),
            Value::Number(_) | Value::Bool(_) => accepted.contains(&item.to_string()),
            _ => false,
        }),
        Value::String(s) => s.split_whitespace().any(|token| accepted.contains(token)),
        Value::Number(_) | Value::Bool(_) => accepted.contains(&held.to_string()),
        Value::Null | Value::Object(_) => false,
    }
}
