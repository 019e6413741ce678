use serde::{Deserialize, Serialize};

/// The subset of an OpenID Connect discovery document used to locate
/// signing keys
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct OidcConfiguration {
    /// The issuer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Where the issuer publishes its JSON Web Key Set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    #[test]
    fn ignores_unrelated_metadata() -> Result<()> {
        let config: OidcConfiguration = serde_json::from_str(
            r#"{
                "issuer": "https://idp.example.com",
                "authorization_endpoint": "https://idp.example.com/authorize",
                "jwks_uri": "https://idp.example.com/keys",
                "scopes_supported": ["openid"]
            }"#,
        )?;

        assert_eq!(config.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(config.jwks_uri.as_deref(), Some("https://idp.example.com/keys"));
        Ok(())
    }

    #[test]
    fn jwks_uri_may_be_absent() -> Result<()> {
        let config: OidcConfiguration =
            serde_json::from_str(r#"{ "issuer": "https://idp.example.com" }"#)?;

        assert_eq!(config.jwks_uri, None);
        Ok(())
    }
}
