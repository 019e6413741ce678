use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MalformedRequest;

const TOKEN_EVENT_TYPE: &str = "TOKEN";

/// A `TOKEN` authorizer event as delivered by the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthorizerEvent {
    /// The event type, expected to be `TOKEN`
    #[serde(rename = "type")]
    pub event_type: String,

    /// The raw `Authorization` header value
    #[serde(default)]
    pub authorization_token: String,

    /// The ARN of the method being invoked
    pub method_arn: String,
}

impl TokenAuthorizerEvent {
    /// Constructs a `TOKEN` event
    pub fn new(authorization_token: impl Into<String>, method_arn: impl Into<String>) -> Self {
        Self {
            event_type: TOKEN_EVENT_TYPE.to_owned(),
            authorization_token: authorization_token.into(),
            method_arn: method_arn.into(),
        }
    }

    /// Parses the method ARN, checking that this is a `TOKEN` event
    ///
    /// # Errors
    ///
    /// Returns an error for any other event type, or if the ARN is malformed.
    pub fn method_arn(&self) -> Result<MethodArn, MalformedRequest> {
        if self.event_type != TOKEN_EVENT_TYPE {
            return Err(MalformedRequest::UnsupportedEventType(
                self.event_type.clone(),
            ));
        }

        self.method_arn.parse()
    }
}

/// The method and path being authorized
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Resource {
    http_method: String,
    resource_path: String,
}

impl Resource {
    /// Constructs a resource from its HTTP method and path
    pub fn new(http_method: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            resource_path: resource_path.into(),
        }
    }

    /// The HTTP method, as it appears in the method ARN
    pub fn http_method(&self) -> &str {
        &self.http_method
    }

    /// The resource path, without a leading `/`
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }
}

/// An `execute-api` method ARN
///
/// `arn:{partition}:execute-api:{region}:{account}:{api}/{stage}/{method}/{path...}`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodArn {
    partition: String,
    region: String,
    account_id: String,
    api_id: String,
    stage: String,
    resource: Resource,
}

impl MethodArn {
    /// The partition named in the ARN
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// The region hosting the API
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The account owning the API
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The API identifier
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// The deployment stage
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The method and path being invoked
    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl FromStr for MethodArn {
    type Err = MalformedRequest;

    fn from_str(arn: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = arn.split(':').collect();
        let [_, partition, _, region, account_id, api_resource] = segments[..] else {
            return Err(MalformedRequest::ArnSegments {
                found: segments.len(),
            });
        };

        let mut parts = api_resource.splitn(4, '/');
        let (api_id, stage, method) = match (parts.next(), parts.next(), parts.next()) {
            (Some(api_id), Some(stage), Some(method)) => (api_id, stage, method),
            _ => {
                return Err(MalformedRequest::ResourceParts {
                    found: api_resource.split('/').count(),
                })
            }
        };

        // The remainder keeps any trailing `/`, e.g. `settings/`
        let resource_path = parts.next().unwrap_or_default();

        Ok(Self {
            partition: partition.to_owned(),
            region: region.to_owned(),
            account_id: account_id.to_owned(),
            api_id: api_id.to_owned(),
            stage: stage.to_owned(),
            resource: Resource::new(method, resource_path),
        })
    }
}
