//! Access policy documents returned to the gateway

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::MethodArn;

/// The policy language version written into every document
pub const POLICY_VERSION: &str = "2012-10-17";

/// The action every statement grants or denies
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

const DEFAULT_PARTITION: &str = "aws";
const CHINA_PARTITION: &str = "aws-cn";
const CHINA_REGION_PREFIX: &str = "cn-";

/// The partition hosting `region`
#[must_use]
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with(CHINA_REGION_PREFIX) {
        CHINA_PARTITION
    } else {
        DEFAULT_PARTITION
    }
}

/// Whether a statement grants or refuses access
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grants access
    Allow,
    /// Refuses access
    Deny,
}

/// An HTTP method a statement applies to
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// Every method, written as `*`
    All,
}

impl HttpMethod {
    /// The method as written in a resource ARN
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::All => "*",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string does not name a supported HTTP method
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unsupported HTTP method '{0}'")]
pub struct UnknownHttpMethod(String);

impl FromStr for HttpMethod {
    type Err = UnknownHttpMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "*" | "ALL" => Self::All,
            _ => return Err(UnknownHttpMethod(s.to_owned())),
        };
        Ok(method)
    }
}

/// A single policy statement
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    effect: Effect,
    action: String,
    resource: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    condition: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Statement {
    /// An `execute-api:Invoke` statement with no resources
    #[must_use]
    pub fn invoke(effect: Effect) -> Self {
        Self {
            effect,
            action: INVOKE_ACTION.to_owned(),
            resource: Vec::new(),
            condition: BTreeMap::new(),
        }
    }

    /// Whether the statement grants or refuses access
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// The action the statement covers
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The resource ARNs the statement covers
    #[must_use]
    pub fn resources(&self) -> &[String] {
        &self.resource
    }

    /// The conditions, keyed by operator and then by condition key
    #[must_use]
    pub fn conditions(&self) -> &BTreeMap<String, BTreeMap<String, Value>> {
        &self.condition
    }

    /// Adds a resource ARN
    pub fn add_resource(&mut self, arn: impl Into<String>) {
        self.resource.push(arn.into());
    }

    /// Sets the condition for `operator`, replacing any existing one
    pub fn add_condition(
        &mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let mut condition = BTreeMap::new();
        condition.insert(key.into(), value.into());
        self.condition.insert(operator.into(), condition);
    }

    /// Whether the statement covers no resources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource.is_empty()
    }
}

/// An access policy scoped to one API stage
///
/// The document keeps one Allow and one Deny statement to which individual
/// method grants are added, plus any free-form statements. Statements without
/// resources are left out when the document is serialized.
///
/// ```
/// use oidc_authorizer::{Effect, PolicyDocument};
///
/// let policy = PolicyDocument::deny_all("cn-north-1", "111111111111", "testapi", "v1");
///
/// let statement = policy.statements().next().unwrap();
/// assert_eq!(statement.effect(), Effect::Deny);
/// assert_eq!(
///     statement.resources(),
///     ["arn:aws-cn:execute-api:cn-north-1:111111111111:testapi/v1/*/*"]
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDocument {
    version: String,
    partition: &'static str,
    region: String,
    account_id: String,
    api_id: String,
    stage: String,
    allow: Statement,
    deny: Statement,
    additional: Vec<Statement>,
}

impl PolicyDocument {
    /// An empty policy for the given API stage
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        account_id: impl Into<String>,
        api_id: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            version: POLICY_VERSION.to_owned(),
            partition: partition_for_region(&region),
            region,
            account_id: account_id.into(),
            api_id: api_id.into(),
            stage: stage.into(),
            allow: Statement::invoke(Effect::Allow),
            deny: Statement::invoke(Effect::Deny),
            additional: Vec::new(),
        }
    }

    /// An empty policy for the API stage named in a method ARN
    #[must_use]
    pub fn for_method_arn(arn: &MethodArn) -> Self {
        Self::new(arn.region(), arn.account_id(), arn.api_id(), arn.stage())
    }

    /// A policy allowing one method on one resource path
    #[must_use]
    pub fn allow_one(
        region: impl Into<String>,
        account_id: impl Into<String>,
        api_id: impl Into<String>,
        stage: impl Into<String>,
        method: HttpMethod,
        resource_path: &str,
    ) -> Self {
        let mut policy = Self::new(region, account_id, api_id, stage);
        policy.allow_method(method, resource_path);
        policy
    }

    /// A policy denying one method on one resource path
    #[must_use]
    pub fn deny_one(
        region: impl Into<String>,
        account_id: impl Into<String>,
        api_id: impl Into<String>,
        stage: impl Into<String>,
        method: HttpMethod,
        resource_path: &str,
    ) -> Self {
        let mut policy = Self::new(region, account_id, api_id, stage);
        policy.deny_method(method, resource_path);
        policy
    }

    /// A policy allowing every method on every resource of the stage
    #[must_use]
    pub fn allow_all(
        region: impl Into<String>,
        account_id: impl Into<String>,
        api_id: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        Self::allow_one(region, account_id, api_id, stage, HttpMethod::All, "*")
    }

    /// A policy denying every method on every resource of the stage
    #[must_use]
    pub fn deny_all(
        region: impl Into<String>,
        account_id: impl Into<String>,
        api_id: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        Self::deny_one(region, account_id, api_id, stage, HttpMethod::All, "*")
    }

    /// Allows `method` on `resource_path`
    pub fn allow_method(&mut self, method: HttpMethod, resource_path: &str) {
        let arn = self.resource_arn(method, resource_path);
        self.allow.add_resource(arn);
    }

    /// Denies `method` on `resource_path`
    pub fn deny_method(&mut self, method: HttpMethod, resource_path: &str) {
        let arn = self.resource_arn(method, resource_path);
        self.deny.add_resource(arn);
    }

    /// Adds a free-form statement
    pub fn add_statement(&mut self, statement: Statement) {
        self.additional.push(statement);
    }

    /// The ARN covering `method` on `resource_path` in this stage
    ///
    /// A leading `/` is dropped from the path, so `/` itself names the root
    /// resource.
    #[must_use]
    pub fn resource_arn(&self, method: HttpMethod, resource_path: &str) -> String {
        let resource_path = resource_path.strip_prefix('/').unwrap_or(resource_path);

        format!(
            "arn:{}:execute-api:{}:{}:{}/{}/{}/{}",
            self.partition,
            self.region,
            self.account_id,
            self.api_id,
            self.stage,
            method,
            resource_path,
        )
    }

    /// The partition derived from the region
    #[must_use]
    pub fn partition(&self) -> &str {
        self.partition
    }

    /// The policy language version
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The statements that cover at least one resource
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        [&self.allow, &self.deny]
            .into_iter()
            .chain(&self.additional)
            .filter(|statement| !statement.is_empty())
    }
}

impl Serialize for PolicyDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct PolicyDocumentDto<'a> {
            version: &'a str,
            statement: Vec<&'a Statement>,
        }

        PolicyDocumentDto {
            version: &self.version,
            statement: self.statements().collect(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;

    use super::*;

    fn policy(region: &str) -> PolicyDocument {
        PolicyDocument::new(region, "111111111111", "testapi", "v1")
    }

    #[test]
    fn partition_follows_region() {
        assert_eq!(policy("cn-north-1").partition(), "aws-cn");
        assert_eq!(policy("cn-northwest-1").partition(), "aws-cn");
        assert_eq!(policy("us-east-1").partition(), "aws");
    }

    #[test]
    fn root_path_collapses_to_empty() {
        let policy = policy("us-east-1");

        assert_eq!(
            policy.resource_arn(HttpMethod::Get, "/"),
            "arn:aws:execute-api:us-east-1:111111111111:testapi/v1/GET/"
        );
        assert_eq!(
            policy.resource_arn(HttpMethod::Get, ""),
            "arn:aws:execute-api:us-east-1:111111111111:testapi/v1/GET/"
        );
    }

    #[test]
    fn leading_slash_is_stripped_and_trailing_slash_kept() {
        let policy = policy("us-east-1");

        assert_eq!(
            policy.resource_arn(HttpMethod::Post, "/settings/"),
            "arn:aws:execute-api:us-east-1:111111111111:testapi/v1/POST/settings/"
        );
        assert_eq!(
            policy.resource_arn(HttpMethod::Post, "settings/"),
            "arn:aws:execute-api:us-east-1:111111111111:testapi/v1/POST/settings/"
        );
    }

    #[test]
    fn deny_at_root_resource_in_china() {
        let policy = PolicyDocument::deny_one(
            "cn-north-1",
            "111111111111",
            "testapi",
            "v1",
            HttpMethod::All,
            "/",
        );

        let statements: Vec<_> = policy.statements().collect();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].effect(), Effect::Deny);
        assert_eq!(
            statements[0].resources(),
            ["arn:aws-cn:execute-api:cn-north-1:111111111111:testapi/v1/*/"]
        );
    }

    #[test]
    fn allow_all_serializes_single_statement() -> Result<()> {
        let policy = PolicyDocument::allow_all("us-east-1", "111111111111", "testapi", "v1");

        assert_eq!(
            serde_json::to_value(&policy)?,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": "execute-api:Invoke",
                    "Resource": ["arn:aws:execute-api:us-east-1:111111111111:testapi/v1/*/*"],
                }],
            })
        );
        Ok(())
    }

    #[test]
    fn method_grants_accumulate() -> Result<()> {
        let mut policy = policy("eu-west-1");
        policy.allow_method(HttpMethod::Get, "/settings");
        policy.allow_method(HttpMethod::Put, "/settings");
        policy.deny_method(HttpMethod::Delete, "/settings");

        let value = serde_json::to_value(&policy)?;
        let statements = value["Statement"].as_array().cloned().unwrap_or_default();

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0]["Effect"], "Allow");
        assert_eq!(statements[0]["Resource"].as_array().map(Vec::len), Some(2));
        assert_eq!(statements[1]["Effect"], "Deny");
        Ok(())
    }

    #[test]
    fn empty_document_has_no_statements() -> Result<()> {
        let value = serde_json::to_value(policy("us-east-1"))?;

        assert_eq!(value, json!({ "Version": "2012-10-17", "Statement": [] }));
        Ok(())
    }

    #[test]
    fn conditions_are_serialized() -> Result<()> {
        let mut statement = Statement::invoke(Effect::Allow);
        statement.add_resource("arn:aws:execute-api:us-east-1:111111111111:testapi/v1/GET/");
        statement.add_condition("IpAddress", "aws:SourceIp", "203.0.113.0/24");

        let mut policy = policy("us-east-1");
        policy.add_statement(statement);

        let value = serde_json::to_value(&policy)?;
        assert_eq!(
            value["Statement"][0]["Condition"],
            json!({ "IpAddress": { "aws:SourceIp": "203.0.113.0/24" } })
        );
        Ok(())
    }

    #[test]
    fn http_methods_parse_and_display() -> Result<()> {
        assert_eq!("get".parse::<HttpMethod>()?, HttpMethod::Get);
        assert_eq!("OPTIONS".parse::<HttpMethod>()?, HttpMethod::Options);
        assert_eq!("*".parse::<HttpMethod>()?, HttpMethod::All);
        assert_eq!("ALL".parse::<HttpMethod>()?, HttpMethod::All);
        assert_eq!(HttpMethod::All.to_string(), "*");
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert!("TRACE".parse::<HttpMethod>().is_err());
        Ok(())
    }
}
