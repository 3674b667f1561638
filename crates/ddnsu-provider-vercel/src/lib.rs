// # Vercel DNS Provider
//
// This crate provides the Vercel DNS provider for DDNSU.
//
// ## Behaviour
//
// - Record listings follow `pagination.next` (as `until=`) until it is null
// - Vercel names are already relative; the apex is the empty label
// - Apex names in desired records (`""`, `"*"`) are written as `""`
// - Every request fails fast; retrying is the scheduler's job
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - List Domains: GET `/v5/domains` (used as the credential check)
// - List DNS Records: GET `/v4/domains/:domain/records?limit=...&until=...`
// - Create DNS Record: POST `/v2/domains/:domain/records`
// - Update DNS Record: PATCH `/v1/domains/records/:record_id`
// - Delete DNS Record: DELETE `/v2/domains/:domain/records/:record_id`

use async_trait::async_trait;
use ddnsu_core::config::{DEFAULT_DNS_RETURN_INSTANCE_LIMIT, ProviderConfig};
use ddnsu_core::record::{DesiredRecord, RemoteRecord};
use ddnsu_core::traits::{DnsProvider, DnsProviderFactory};
use ddnsu_core::{Error, ProviderRegistry, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Vercel API base URL
const VERCEL_API_BASE: &str = "https://api.vercel.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "vercel";

#[derive(Debug, Deserialize)]
struct RecordListing {
    #[serde(default)]
    records: Vec<VercelRecord>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VercelRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    value: String,
    ttl: Option<u32>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    uid: String,
}

/// Vercel DNS provider
///
/// The Debug implementation does NOT expose the API token.
pub struct VercelProvider {
    /// Vercel API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Records requested per listing page
    page_size: u32,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for VercelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VercelProvider")
            .field("api_token", &"<REDACTED>")
            .field("page_size", &self.page_size)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl VercelProvider {
    /// Create a new Vercel provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Vercel access token
    /// - `page_size`: Records per listing page (`dnsReturnInstanceLimit`)
    pub fn new(api_token: impl Into<String>, page_size: u32) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Vercel API token cannot be empty"));
        }
        if page_size == 0 {
            return Err(Error::config("dnsReturnInstanceLimit must be > 0"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            page_size,
            base_url: VERCEL_API_BASE.to_string(),
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

    /// Send an authenticated request, failing on non-2xx
    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
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
        Ok(response)
    }

    fn record_body(record: &DesiredRecord, address: IpAddr) -> serde_json::Value {
        serde_json::json!({
            "name": apex_name(record),
            "type": record.record_type.as_str(),
            "ttl": record.ttl,
            "value": address.to_string(),
            "comment": record.tag().as_str(),
        })
    }
}

#[async_trait]
impl DnsProvider for VercelProvider {
    async fn verify_credentials(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/v5/domains"))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("[vercel] token check returned {}", status);
        }
        Ok(status.is_success())
    }

    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>> {
        let url = self.url(&format!("/v4/domains/{}/records", domain));
        let mut records = Vec::new();
        let mut until: Option<i64> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("limit", self.page_size.to_string())]);
            if let Some(next) = until {
                request = request.query(&[("until", next.to_string())]);
            }

            let listing: RecordListing = self
                .send(request, "Record listing")
                .await?
                .json()
                .await
                .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
            pages += 1;

            let batch_len = listing.records.len();
            records.extend(listing.records.into_iter().map(|r| RemoteRecord {
                id: r.id,
                name: r.name,
                record_type: r.record_type,
                value: r.value,
                ttl: r.ttl,
                comment: r.comment,
            }));

            match listing.pagination.and_then(|p| p.next) {
                Some(next) if batch_len > 0 && Some(next) != until => until = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            "[vercel] {}: {} record(s) over {} page(s)",
            domain,
            records.len(),
            pages
        );
        Ok(records)
    }

    async fn create_record(
        &self,
        domain: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<String> {
        let request = self
            .client
            .post(self.url(&format!("/v2/domains/{}/records", domain)))
            .json(&Self::record_body(record, address));

        let created: CreatedRecord = self
            .send(request, "Record creation")
            .await?
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
        Ok(created.uid)
    }

    async fn update_record(
        &self,
        _domain: &str,
        record_id: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<()> {
        let request = self
            .client
            .patch(self.url(&format!("/v1/domains/records/{}", record_id)))
            .json(&Self::record_body(record, address));

        self.send(request, "Record update").await?;
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/v2/domains/{}/records/{}", domain, record_id)));

        self.send(request, "Record deletion").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Name to send for a desired record
pub fn apex_name(record: &DesiredRecord) -> String {
    if record.is_apex() {
        String::new()
    } else {
        record.name.clone()
    }
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected: Invalid token or missing scope. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: resource not found ({})", context, status)),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Vercel server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

/// Factory for creating Vercel providers
pub struct VercelFactory;

impl DnsProviderFactory for VercelFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let page_size = config.page_size.unwrap_or(DEFAULT_DNS_RETURN_INSTANCE_LIMIT);
        Ok(Box::new(VercelProvider::new(config.api_token.clone(), page_size)?))
    }
}

/// Register the Vercel provider with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(VercelFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddnsu_core::config::Target;
    use ddnsu_core::record::RecordType;
    use httpmock::Method::PATCH;
    use httpmock::prelude::*;
    use serde_json::json;

    fn provider(server: &MockServer, page_size: u32) -> VercelProvider {
        VercelProvider::new("test_token", page_size)
            .unwrap()
            .with_base_url(server.base_url())
    }

    fn record_json(id: &str, name: &str, comment: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "slug": format!("{name}.example.com."),
            "name": name,
            "type": "A",
            "value": "198.51.100.4",
            "creator": "system",
            "created": 1_700_000_000_000i64,
            "updated": 1_700_000_000_000i64,
            "ttl": 60,
            "comment": comment
        })
    }

    #[test]
    fn test_factory_uses_page_size() {
        let config = ProviderConfig {
            target: Target::Vercel,
            api_token: "test_token".to_string(),
            page_size: Some(50),
        };
        assert!(VercelFactory.create(&config).is_ok());

        let zero = ProviderConfig {
            page_size: Some(0),
            ..config
        };
        assert!(matches!(VercelFactory.create(&zero).err(), Some(Error::Config(_))));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = VercelProvider::new("secret_token_12345", 20).unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("VercelProvider"));
    }

    #[test]
    fn test_apex_names() {
        for name in ["", "*"] {
            let record = DesiredRecord::new(RecordType::A, name, 60, "home");
            assert_eq!(apex_name(&record), "");
        }
        let record = DesiredRecord::new(RecordType::Aaaa, "v6", 60, "v6");
        assert_eq!(apex_name(&record), "v6");
    }

    #[test]
    fn test_register() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_provider("vercel"));
        assert!(!registry.has_provider("cloudflare"));
    }

    #[tokio::test]
    async fn verify_maps_status() {
        let server = MockServer::start();
        let mut ok = server.mock(|when, then| {
            when.method(GET)
                .path("/v5/domains")
                .header("authorization", "Bearer test_token");
            then.status(200).json_body(json!({ "domains": [], "pagination": null }));
        });
        assert!(provider(&server, 20).verify_credentials().await.unwrap());
        ok.delete();

        let mut forbidden = server.mock(|when, then| {
            when.method(GET).path("/v5/domains");
            then.status(403).json_body(json!({
                "error": { "code": "forbidden", "message": "Not authorized" }
            }));
        });
        assert!(!provider(&server, 20).verify_credentials().await.unwrap());
        forbidden.delete();

        server.mock(|when, then| {
            when.method(GET).path("/v5/domains");
            then.status(401).json_body(json!({
                "error": { "code": "unauthorized", "message": "Invalid token" }
            }));
        });
        assert!(!provider(&server, 20).verify_credentials().await.unwrap());
    }

    #[tokio::test]
    async fn listing_follows_pagination() {
        let server = MockServer::start();
        // More specific mock first: the earliest registered match wins.
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/domains/example.com/records")
                .query_param("until", "1699999999000");
            then.status(200).json_body(json!({
                "records": [record_json("rec_3", "www", Some("DDNSU_www"))],
                "pagination": { "count": 1, "next": null, "prev": 1_700_000_000_000i64 }
            }));
        });

        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/domains/example.com/records")
                .query_param("limit", "2");
            then.status(200).json_body(json!({
                "records": [
                    record_json("rec_1", "", Some("DDNSU_apex")),
                    record_json("rec_2", "mail", None)
                ],
                "pagination": { "count": 2, "next": 1_699_999_999_000i64, "prev": null }
            }));
        });
        let records = provider(&server, 2).list_records("example.com").await.unwrap();

        first.assert();
        second.assert();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rec_1", "rec_2", "rec_3"]);
        assert_eq!(records[0].name, "");
        assert!(records[0].is_tagged());
        assert!(!records[1].is_tagged());
    }

    #[tokio::test]
    async fn create_sends_empty_apex_and_returns_uid() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/v2/domains/example.com/records")
                .json_body(json!({
                    "name": "",
                    "type": "A",
                    "ttl": 60,
                    "value": "192.0.2.1",
                    "comment": "DDNSU_home"
                }));
            then.status(200).json_body(json!({ "uid": "rec_new", "updated": 1 }));
        });

        let record = DesiredRecord::new(RecordType::A, "*", 60, "home");
        let id = provider(&server, 20)
            .create_record("example.com", &record, "192.0.2.1".parse().unwrap())
            .await
            .unwrap();

        create.assert();
        assert_eq!(id, "rec_new");
    }

    #[tokio::test]
    async fn update_and_delete_paths() {
        let server = MockServer::start();
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/v1/domains/records/rec_7")
                .json_body_partial(r#"{"name":"vpn","value":"192.0.2.1","comment":"DDNSU_vpn"}"#);
            then.status(200).json_body(json!({ "id": "rec_7" }));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/v2/domains/example.com/records/rec_7");
            then.status(200).json_body(json!({}));
        });

        let provider = provider(&server, 20);
        let record = DesiredRecord::new(RecordType::A, "vpn", 60, "vpn");
        provider
            .update_record("example.com", "rec_7", &record, "192.0.2.1".parse().unwrap())
            .await
            .unwrap();
        provider.delete_record("example.com", "rec_7").await.unwrap();

        patch.assert();
        delete.assert();
    }

    #[tokio::test]
    async fn server_errors_surface() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v4/domains/example.com/records");
            then.status(502).body("bad gateway");
        });

        let err = provider(&server, 20).list_records("example.com").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
