use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::{JwkSet, JwksSource};
use crate::{
    error::{self, KeyResolutionError},
    OidcConfiguration,
};

const DISCOVERY_DOCUMENT: &str = "discovery document";
const KEY_SET: &str = "JSON Web Key Set";

/// Retrieves discovery documents and key sets over HTTP
#[derive(Debug, Clone)]
pub struct HttpJwksSource {
    client: Client,
}

impl HttpJwksSource {
    /// Constructs a source whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("oidc_authorizer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Constructs a source using an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        document: &'static str,
        url: &str,
    ) -> Result<T, KeyResolutionError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| error::unavailable(document, url, e))?;

        tracing::debug!(
            response.status = response.status().as_u16(),
            url,
            "received {} response",
            document
        );

        let response = response
            .error_for_status()
            .map_err(|e| error::unavailable(document, url, e))?;

        response
            .json::<T>()
            .await
            .map_err(|e| error::unavailable(document, url, e))
    }
}

#[async_trait]
impl JwksSource for HttpJwksSource {
    async fn discovery_document(&self, url: &str) -> Result<OidcConfiguration, KeyResolutionError> {
        self.get_json(DISCOVERY_DOCUMENT, url).await
    }

    async fn key_set(&self, url: &str) -> Result<JwkSet, KeyResolutionError> {
        self.get_json(KEY_SET, url).await
    }
}
