//! How HTTP providers reach their upstream APIs.
//!
//! Providers build a target URL and hand it to a [`Transport`]. The direct
//! transport fetches it; the relay transport asks a relay service to fetch
//! it on our behalf. Provider code is identical either way.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::ProviderError;

/// `User-Agent` sent on every upstream request.
pub const USER_AGENT: &str = "NadiDoshaCalculator/1.0";

/// Default request timeout for the underlying client.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches JSON from a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// GET `url` and parse the body as JSON.
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, ProviderError>;
}

fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(CLIENT_TIMEOUT)
        .gzip(true)
        .build()
        .map_err(|e| ProviderError::Transport(e.to_string()))
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(CLIENT_TIMEOUT)
    } else if e.is_decode() {
        ProviderError::Malformed(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

async fn fetch_json(client: &reqwest::Client, url: Url) -> Result<serde_json::Value, ProviderError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(map_reqwest_error)?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }
    if !status.is_success() {
        return Err(ProviderError::Http { status: status.as_u16() });
    }

    response.json().await.map_err(map_reqwest_error)
}

/// Plain GET against the upstream API.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    client: reqwest::Client,
}

impl DirectTransport {
    /// Create a direct transport.
    pub fn new() -> Result<Self, ProviderError> {
        Ok(Self { client: build_client()? })
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn name(&self) -> &str {
        "direct"
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, ProviderError> {
        debug!(url = %url, "GET");
        fetch_json(&self.client, url.clone()).await
    }
}

/// GET via a relay: `<relay>?url=<encoded target>`.
///
/// The relay returns the upstream body and status unmodified.
#[derive(Debug, Clone)]
pub struct RelayTransport {
    client: reqwest::Client,
    relay: Url,
}

impl RelayTransport {
    /// Create a relay transport for a relay endpoint URL.
    pub fn new(relay_url: &str) -> Result<Self, ProviderError> {
        let relay = Url::parse(relay_url)
            .map_err(|e| ProviderError::Transport(format!("invalid relay URL '{relay_url}': {e}")))?;
        Ok(Self {
            client: build_client()?,
            relay,
        })
    }

    /// The relay URL that would be requested for `target`.
    pub fn relay_url_for(&self, target: &Url) -> Url {
        let mut url = self.relay.clone();
        url.query_pairs_mut().clear().append_pair("url", target.as_str());
        url
    }
}

#[async_trait]
impl Transport for RelayTransport {
    fn name(&self) -> &str {
        "relay"
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, ProviderError> {
        let relayed = self.relay_url_for(url);
        debug!(target = %url, relay = %self.relay, "GET via relay");
        fetch_json(&self.client, relayed).await
    }
}
