// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare DNS provider for DDNSU.
//
// ## Behaviour
//
// - One zone lookup per operation; zone ids are not cached across calls
// - Record listings drain every page (`page` / `per_page`)
// - Full record names are reported back relative to the domain (apex => `@`)
// - Apex names in desired records (`""`, `"*"`) are written as `@`
// - Every request fails fast; retrying is the scheduler's job
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Verify Token: GET `/user/tokens/verify`
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?page=...&per_page=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddnsu_core::config::ProviderConfig;
use ddnsu_core::record::{DesiredRecord, RemoteRecord};
use ddnsu_core::traits::{DnsProvider, DnsProviderFactory};
use ddnsu_core::{Error, ProviderRegistry, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const PER_PAGE: u32 = 100;

/// Label Cloudflare uses for the zone apex
const APEX: &str = "@";

const PROVIDER: &str = "cloudflare";

/// Response envelope shared by every v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    content: String,
    ttl: Option<u32>,
    comment: Option<String>,
}

impl<T> Envelope<T> {
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "no error details".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Cloudflare DNS provider
///
/// Stateless apart from its HTTP client. The Debug implementation does
/// NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the token is empty
    /// - `Err(Error::Http)`: If the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", context, envelope.error_summary()),
            ));
        }
        Ok(envelope)
    }

    /// Get the zone ID for a domain
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn zone_id(&self, domain: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", domain);

        let request = self
            .client
            .get(self.url("/zones"))
            .query(&[("name", domain)]);
        let envelope: Envelope<Vec<Zone>> = self.send(request, "Zone lookup").await?;

        let zone = envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", domain)))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    fn record_body(record: &DesiredRecord, address: IpAddr) -> serde_json::Value {
        serde_json::json!({
            "type": record.record_type.as_str(),
            "name": apex_name(record),
            "content": address.to_string(),
            "ttl": record.ttl,
            "comment": record.tag().as_str(),
            "proxied": false,
        })
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn verify_credentials(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/user/tokens/verify"))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(false);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text, "Token verification"));
        }

        let envelope: Envelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
        Ok(envelope.success)
    }

    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>> {
        let zone_id = self.zone_id(domain).await?;
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));

        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let request = self.client.get(&url).query(&[
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
            ]);
            let envelope: Envelope<Vec<DnsRecord>> = self.send(request, "Record listing").await?;

            let batch = envelope.result.unwrap_or_default();
            let batch_len = batch.len();
            records.extend(batch.into_iter().map(|r| RemoteRecord {
                name: relative_name(&r.name, domain),
                id: r.id,
                record_type: r.record_type,
                value: r.content,
                ttl: r.ttl,
                comment: r.comment,
            }));

            let total_pages = envelope
                .result_info
                .and_then(|info| info.total_pages)
                .unwrap_or(1);
            if page >= total_pages || batch_len == 0 {
                break;
            }
            page += 1;
        }

        tracing::debug!(
            "[cloudflare] {}: {} record(s) over {} page(s)",
            domain,
            records.len(),
            page
        );
        Ok(records)
    }

    async fn create_record(
        &self,
        domain: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<String> {
        let zone_id = self.zone_id(domain).await?;
        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(&Self::record_body(record, address));

        let envelope: Envelope<DnsRecord> = self.send(request, "Record creation").await?;
        envelope
            .result
            .map(|r| r.id)
            .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: no created record"))
    }

    async fn update_record(
        &self,
        domain: &str,
        record_id: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<()> {
        let zone_id = self.zone_id(domain).await?;
        let request = self
            .client
            .patch(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)))
            .json(&Self::record_body(record, address));

        let _: Envelope<serde_json::Value> = self.send(request, "Record update").await?;
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<()> {
        let zone_id = self.zone_id(domain).await?;
        let request = self
            .client
            .delete(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)));

        let _: Envelope<serde_json::Value> = self.send(request, "Record deletion").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Name to send for a desired record
pub fn apex_name(record: &DesiredRecord) -> String {
    if record.is_apex() {
        APEX.to_string()
    } else {
        record.name.clone()
    }
}

/// Turn a fully-qualified Cloudflare name into a label relative to `domain`
pub fn relative_name(full: &str, domain: &str) -> String {
    let lower_full = full.to_ascii_lowercase();
    let lower_domain = domain.to_ascii_lowercase();
    if lower_full == lower_domain {
        return APEX.to_string();
    }

    match lower_full
        .strip_suffix(lower_domain.as_str())
        .and_then(|prefix| prefix.strip_suffix('.'))
    {
        Some(label) if !label.is_empty() => full[..label.len()].to_string(),
        _ => full.to_string(),
    }
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: Invalid API token or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: resource not found ({})", context, status)),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(CloudflareProvider::new(config.api_token.clone())?))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddnsu_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddnsu_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
