// # HTTP IP Source
//
// This crate provides HTTP "what is my IP" lookups for DDNSU.
//
// ## Purpose
//
// Each endpoint is one independent vote. The core resolver queries all of
// them concurrently and keeps the address most of them agree on, so a
// single misbehaving service cannot redirect records.
//
// ## Response formats
//
// - JSON object with an `ip` string (`{"ip": "192.0.2.1", ...}`)
// - Plain-text address (`192.0.2.1\n`)
//
// Anything else is a failed lookup.

use ddnsu_core::traits::IpSource;
use ddnsu_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Per-request timeout for lookup endpoints
const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// JSON property holding the address
const IP_PROPERTY: &str = "ip";

/// Endpoints queried on every pass, in tie-breaking order
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://api.ipify.org/?format=json",
    "https://api.my-ip.io/v2/ip.json",
    "https://api.myip.com",
    "https://api.seeip.org/jsonip",
    "https://ipwho.is",
];

/// A single HTTP lookup endpoint
pub struct HttpIpSource {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: Endpoint URL (e.g., "https://api.ipify.org/?format=json")
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, default_client())
    }

    /// Create a source sharing an existing HTTP client
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_ip(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("{} returned {}", self.url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        let ip = parse_address(&body)?;
        tracing::debug!("{} reported {}", self.url, ip);
        Ok(ip)
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn lookup(&self) -> Result<IpAddr> {
        self.fetch_ip().await
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// Extract an address from a JSON `{"ip": ...}` or plain-text body
pub fn parse_address(body: &str) -> Result<IpAddr> {
    let body = body.trim();

    let candidate = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map
            .get(IP_PROPERTY)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::invalid_input(format!("No '{}' property in response", IP_PROPERTY)))?,
        _ => body.to_string(),
    };

    candidate
        .trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("Invalid IP address: {}", candidate)))
}

/// Build one source per default endpoint, followed by `additional`
///
/// The order of the returned sources is the tie-breaking order.
pub fn sources_from(additional: &[String]) -> Vec<Box<dyn IpSource>> {
    let client = default_client();

    DEFAULT_ENDPOINTS
        .iter()
        .map(|url| url.to_string())
        .chain(additional.iter().cloned())
        .map(|url| Box::new(HttpIpSource::with_client(url, client.clone())) as Box<dyn IpSource>)
        .collect()
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}
