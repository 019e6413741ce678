use std::{error::Error as StdError, path::PathBuf, time::Duration};

use aliri::jwa;
use clap::Parser;
use oidc_authorizer::{
    error::MalformedRequest, Authorizer, AuthorizerConfig, IdentityProviderConfig,
    TokenAuthorizerEvent, TokenVerifier,
};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// The issuer URL of the trusted identity provider
    #[arg(long, env = "OIDC_ISSUER")]
    issuer: String,

    /// Extra claim requirements, `claim=value1 value2,claim2=value3`
    #[arg(long, env = "OIDC_SCOPE_OR_GROUPS")]
    claim_requirements: Option<String>,

    /// Slack allowed around token timestamps, in milliseconds
    #[arg(long, env = "CLOCK_SKEW_MILLIS", default_value_t = 5000)]
    clock_skew_millis: u64,

    /// Acceptable signing algorithms; defaults to the RSA family
    #[arg(long, env = "OIDC_ALGORITHMS", value_delimiter = ',')]
    algorithms: Vec<jwa::Algorithm>,

    /// How long a fetched signing key may be reused, in seconds
    #[arg(long, env = "JWKS_CACHE_TTL_SECS")]
    jwks_cache_ttl_secs: Option<u64>,

    /// Timeout for discovery and key set requests, in seconds
    #[arg(long, env = "OIDC_HTTP_TIMEOUT_SECS", default_value_t = 10)]
    http_timeout_secs: u64,

    /// Authorize the single event in this file instead of reading stdin
    #[arg(long, value_name = "FILE")]
    event: Option<PathBuf>,
}

impl Opts {
    fn config(&self) -> AuthorizerConfig {
        let mut identity_provider = IdentityProviderConfig::new(self.issuer.clone())
            .with_clock_skew(Duration::from_millis(self.clock_skew_millis))
            .with_key_ttl(self.jwks_cache_ttl_secs.map(Duration::from_secs));

        if !self.algorithms.is_empty() {
            identity_provider =
                identity_provider.with_approved_algorithms(self.algorithms.iter().copied());
        }

        let config = AuthorizerConfig::from_identity_provider(identity_provider)
            .with_http_timeout(Duration::from_secs(self.http_timeout_secs));

        match &self.claim_requirements {
            Some(reqs) => config.with_claim_requirements(reqs.as_str()),
            None => config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("event is not a valid authorizer request")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedRequest),
}

async fn handle<V>(authorizer: &Authorizer<V>, event: &[u8]) -> Result<String, RequestError>
where
    V: TokenVerifier,
{
    let event: TokenAuthorizerEvent = serde_json::from_slice(event)?;
    let response = authorizer.authorize(&event).await?;
    Ok(serde_json::to_string(&response)?)
}

async fn write_line<W>(output: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

/// Answers one event per input line until the input is exhausted
async fn serve<V, R, W>(authorizer: &Authorizer<V>, input: R, mut output: W) -> io::Result<()>
where
    V: TokenVerifier,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle(authorizer, line.as_bytes()).await {
            Ok(response) => write_line(&mut output, &response).await?,
            Err(error) => tracing::error!(
                error = (&error as &dyn StdError),
                "unable to authorize request"
            ),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let authorizer = Authorizer::from_config(&opts.config())?;

    match &opts.event {
        Some(path) => {
            let event = tokio::fs::read(path).await?;
            let response = handle(&authorizer, &event).await?;
            write_line(&mut io::stdout(), &response).await?;
        }
        None => serve(&authorizer, BufReader::new(io::stdin()), io::stdout()).await?,
    }

    Ok(())
}
