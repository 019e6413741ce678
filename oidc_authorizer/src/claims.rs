use aliri::jwt::{self, Audience, Audiences, Issuer, IssuerRef, Subject, SubjectRef};
use aliri_clock::UnixTime;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A registered claim held a value of the wrong shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("claim '{claim}' has an invalid value")]
pub struct InvalidClaim {
    claim: &'static str,
}

/// The claim set of a verified token
///
/// Registered claims are decoded eagerly so they can be validated; every
/// claim remains available by name through [`Claims::get()`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Claims {
    iss: Option<Issuer>,
    sub: Option<Subject>,
    aud: Audiences,
    exp: Option<UnixTime>,
    nbf: Option<UnixTime>,
    iat: Option<UnixTime>,
    raw: Map<String, Value>,
}

impl Claims {
    /// The `sub` claim
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_ref().map(|s| s.as_str())
    }

    /// The `iat` claim
    pub fn issued_at(&self) -> Option<UnixTime> {
        self.iat
    }

    /// Looks up any claim by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    /// Renders a claim as a flat string
    ///
    /// Arrays are joined with `,`; numbers and booleans use their JSON text.
    /// `null` renders as nothing.
    pub fn render(&self, name: &str) -> Option<String> {
        match self.raw.get(name)? {
            Value::Null => None,
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(render_scalar)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => Some(render_scalar(other)),
        }
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TryFrom<Map<String, Value>> for Claims {
    type Error = InvalidClaim;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        Ok(Self {
            iss: string_claim(&raw, "iss")?.map(Issuer::new),
            sub: string_claim(&raw, "sub")?.map(Subject::new),
            aud: audience_claim(&raw)?,
            exp: numeric_date(&raw, "exp")?,
            nbf: numeric_date(&raw, "nbf")?,
            iat: numeric_date(&raw, "iat")?,
            raw,
        })
    }
}

fn string_claim(
    raw: &Map<String, Value>,
    claim: &'static str,
) -> Result<Option<String>, InvalidClaim> {
    match raw.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(InvalidClaim { claim }),
    }
}

fn audience_claim(raw: &Map<String, Value>) -> Result<Audiences, InvalidClaim> {
    const CLAIM: &str = "aud";

    match raw.get(CLAIM) {
        None | Some(Value::Null) => Ok(Audiences::empty()),
        Some(Value::String(s)) => Ok(Audiences::single(Audience::new(s.clone()))),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(Audience::new(s.clone())),
                _ => Err(InvalidClaim { claim: CLAIM }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Audiences::from),
        Some(_) => Err(InvalidClaim { claim: CLAIM }),
    }
}

/// Seconds since the epoch; fractional seconds are truncated
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn numeric_date(
    raw: &Map<String, Value>,
    claim: &'static str,
) -> Result<Option<UnixTime>, InvalidClaim> {
    match raw.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_u64() {
                Ok(Some(UnixTime(secs)))
            } else {
                match n.as_f64() {
                    Some(secs) if secs.is_finite() && secs >= 0.0 => {
                        Ok(Some(UnixTime(secs as u64)))
                    }
                    _ => Err(InvalidClaim { claim }),
                }
            }
        }
        Some(_) => Err(InvalidClaim { claim }),
    }
}

impl jwt::CoreClaims for Claims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }
}
