use std::{fmt, fs, path::Path, process::Command};

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::{
    error::ClientError,
    graphql::{Operation, Response, decode_envelope, request_body},
    types::Identity,
};

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const CLIENT_USER_AGENT: &str = concat!("mass-merge/", env!("CARGO_PKG_VERSION"));

/// Bearer token handed to a client at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Resolves the bearer token: the token file when it exists, then
/// `GITHUB_TOKEN`, `GH_TOKEN` and finally `gh auth token`.
pub fn resolve_credentials(token_file: &Path) -> Result<Credentials> {
    if token_file.exists() {
        let token = fs::read_to_string(token_file)
            .with_context(|| format!("Failed to read token file '{}'", token_file.display()))?;
        let token = token.trim();
        if token.is_empty() {
            anyhow::bail!("Token file '{}' is empty", token_file.display());
        }
        debug!(path = %token_file.display(), "using token file");
        return Ok(Credentials::new(token));
    }

    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        return Ok(Credentials::new(token));
    }

    if let Ok(token) = std::env::var("GH_TOKEN") {
        return Ok(Credentials::new(token));
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("No token file or environment token, and the gh CLI could not be run")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(Credentials::new(token))
}

/// The remote API as seen by the rest of the crate.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Sends one GraphQL operation. API errors come back inside the
    /// response; only transport and decoding failures are `Err`.
    async fn execute<O>(&self, operation: &O) -> Result<Response<O::Data>, ClientError>
    where
        O: Operation;

    async fn current_user(&self) -> Result<Identity, ClientError>;
}

/// Authenticated GitHub client: GraphQL over `reqwest`, REST over `octocrab`.
pub struct GitHub {
    http: reqwest::Client,
    endpoint: Url,
    credentials: Credentials,
    octocrab: Octocrab,
}

impl GitHub {
    pub fn new(
        credentials: Credentials,
        endpoint: Url,
        api_base: &Url,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .build()?;

        let octocrab = Octocrab::builder()
            .base_uri(api_base.as_str().trim_end_matches('/'))
            .and_then(|builder| {
                builder
                    .personal_token(credentials.token().to_string())
                    .build()
            })
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            credentials,
            octocrab,
        })
    }
}

impl fmt::Debug for GitHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHub")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Forge for GitHub {
    async fn execute<O>(&self, operation: &O) -> Result<Response<O::Data>, ClientError>
    where
        O: Operation,
    {
        let body = request_body(operation);
        debug!(operation = O::NAME, endpoint = %self.endpoint, "sending GraphQL request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.credentials.token())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(operation = O::NAME, %status, bytes = text.len(), "GraphQL response received");

        decode_envelope(&text)
    }

    async fn current_user(&self) -> Result<Identity, ClientError> {
        let identity: Identity = self.octocrab.get("/user", None::<&()>).await?;
        debug!(login = %identity.login, "resolved current user");
        Ok(identity)
    }
}
