//! Configuration types for DDNSU
//!
//! The on-disk document is TOML with camelCase keys. This module only
//! models and validates it; reading and writing the file belongs to a
//! [`crate::traits::ConfigStore`].

use crate::error::{Error, Result};
use crate::record::DesiredRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Default page size for providers that limit record listings
pub const DEFAULT_DNS_RETURN_INSTANCE_LIMIT: u32 = 20;

/// Main DDNSU configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdnsuConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Interval between passes, in milliseconds
    pub update_frequency: u64,

    /// Extra "what is my IP" endpoints, queried after the defaults
    #[serde(default)]
    pub additional_ip_providers: Vec<String>,

    /// Selected provider ("cloudflare" or "vercel")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Fingerprint of the configuration as of the last committed pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past: Option<String>,

    /// Cloudflare settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare: Option<CloudflareSection>,

    /// Vercel settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vercel: Option<VercelSection>,

    /// Desired records, applied to every domain target
    #[serde(rename = "record", default)]
    pub records: Vec<DesiredRecord>,
}

impl DdnsuConfig {
    /// Create a configuration for the given target with no records
    pub fn new(target: Target, update_frequency: u64) -> Self {
        Self {
            version: default_version(),
            update_frequency,
            additional_ip_providers: Vec::new(),
            target: Some(target.as_str().to_string()),
            past: None,
            cloudflare: None,
            vercel: None,
            records: Vec::new(),
        }
    }

    /// Parse a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid configuration: {e}")))
    }

    /// Serialize the configuration document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize configuration: {e}")))
    }

    /// Add a desired record
    pub fn with_record(mut self, record: DesiredRecord) -> Self {
        self.records.push(record);
        self
    }

    /// The selected provider
    pub fn target(&self) -> Result<Target> {
        let raw = self
            .target
            .as_deref()
            .ok_or_else(|| Error::config("No target property in configuration"))?;
        raw.parse()
    }

    /// Domain targets of the selected provider
    pub fn domain_targets(&self) -> Result<&[String]> {
        let target = self.target()?;
        if !self.has_section(target) {
            return Err(Error::config(format!(
                "Missing [{}] section for the selected target",
                self.target.as_deref().unwrap_or_default()
            )));
        }
        Ok(self.domains_for(target))
    }

    /// Domain targets listed under `target`'s section, selected or not
    ///
    /// Empty when the section is missing.
    pub fn domains_for(&self, target: Target) -> &[String] {
        match target {
            Target::Cloudflare => self.cloudflare.as_ref().map(|s| s.domain_target.as_slice()),
            Target::Vercel => self.vercel.as_ref().map(|s| s.domain_target.as_slice()),
        }
        .unwrap_or_default()
    }

    /// Configured providers other than the selected one that list domains
    ///
    /// These are purged alongside the selected provider so a target switch
    /// does not leave tagged records behind.
    pub fn inactive_targets(&self) -> Vec<Target> {
        let active = self.target().ok();
        [Target::Cloudflare, Target::Vercel]
            .into_iter()
            .filter(|t| Some(*t) != active && !self.domains_for(*t).is_empty())
            .collect()
    }

    fn has_section(&self, target: Target) -> bool {
        match target {
            Target::Cloudflare => self.cloudflare.is_some(),
            Target::Vercel => self.vercel.is_some(),
        }
    }

    /// Copy of the configuration without its own history field
    pub fn without_past(&self) -> Self {
        Self {
            past: None,
            ..self.clone()
        }
    }

    /// Validate the configuration
    ///
    /// Runs before any network activity. Integrity violations such as
    /// duplicate comments are fatal here so the matcher never sees an
    /// ambiguous tag.
    pub fn validate(&self) -> Result<()> {
        if self.update_frequency == 0 {
            return Err(Error::config("updateFrequency must be > 0"));
        }

        let domains = self.domain_targets()?;
        if domains.is_empty() {
            return Err(Error::config("domainTarget must list at least one domain"));
        }
        if let Some(empty) = domains.iter().find(|d| d.trim().is_empty()) {
            return Err(Error::config(format!("Invalid domain target: '{empty}'")));
        }

        if self.records.is_empty() {
            return Err(Error::config("No records configured"));
        }

        let mut seen = HashSet::new();
        for (index, record) in self.records.iter().enumerate() {
            if record.comment.is_empty() {
                return Err(Error::config(format!("record[{index}]: comment cannot be empty")));
            }
            if record.ttl == 0 {
                return Err(Error::config(format!(
                    "record[{index}] ({}): ttl must be > 0",
                    record.comment
                )));
            }
            if !seen.insert(record.comment.as_str()) {
                return Err(Error::config(format!(
                    "record[{index}]: duplicate comment \"{}\" (comments must be unique)",
                    record.comment
                )));
            }
        }

        if let Some(vercel) = &self.vercel
            && vercel.dns_return_instance_limit == 0
        {
            return Err(Error::config("vercel.dnsReturnInstanceLimit must be > 0"));
        }

        Ok(())
    }

    /// Resolve provider settings, reading the token from the process environment
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        self.provider_config_with(|key| std::env::var(key).ok())
    }

    /// Resolve provider settings with an explicit environment lookup
    ///
    /// The environment takes precedence over the token in the file.
    pub fn provider_config_with<F>(&self, env: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.provider_config_for_with(self.target()?, env)
    }

    /// Resolve settings for `target`, whether or not it is selected
    pub fn provider_config_for(&self, target: Target) -> Result<ProviderConfig> {
        self.provider_config_for_with(target, |key| std::env::var(key).ok())
    }

    /// Resolve settings for `target` with an explicit environment lookup
    pub fn provider_config_for_with<F>(&self, target: Target, env: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_token = match target {
            Target::Cloudflare => self.cloudflare.as_ref().and_then(|s| s.auth_token.clone()),
            Target::Vercel => self.vercel.as_ref().and_then(|s| s.auth_token.clone()),
        };

        let api_token = env(target.token_env_var())
            .filter(|t| !t.is_empty())
            .or(file_token.filter(|t| !t.is_empty()))
            .ok_or_else(|| {
                Error::auth(format!(
                    "{} auth token is not configured in {} or the configuration file",
                    target,
                    target.token_env_var()
                ))
            })?;

        let page_size = match target {
            Target::Vercel => self.vercel.as_ref().map(|s| s.dns_return_instance_limit),
            Target::Cloudflare => None,
        };

        Ok(ProviderConfig {
            target,
            api_token,
            page_size,
        })
    }
}

fn default_version() -> String {
    "1".to_string()
}

/// Supported DNS providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Cloudflare,
    Vercel,
}

impl Target {
    /// Lowercase name, as written in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Cloudflare => "cloudflare",
            Target::Vercel => "vercel",
        }
    }

    /// Environment variable holding this provider's token
    pub fn token_env_var(&self) -> &'static str {
        match self {
            Target::Cloudflare => "CLOUDFLARE_AUTH_TOKEN",
            Target::Vercel => "VERCEL_AUTH_TOKEN",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloudflare" => Ok(Target::Cloudflare),
            "vercel" => Ok(Target::Vercel),
            other => Err(Error::config(format!(
                "Unsupported target '{other}'. Supported targets: cloudflare, vercel"
            ))),
        }
    }
}

/// `[cloudflare]` section
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareSection {
    /// API token (the environment variable wins when both are set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Zones to keep in sync
    #[serde(default)]
    pub domain_target: Vec<String>,
}

impl fmt::Debug for CloudflareSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareSection")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<REDACTED>"))
            .field("domain_target", &self.domain_target)
            .finish()
    }
}

/// `[vercel]` section
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VercelSection {
    /// API token (the environment variable wins when both are set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Page size used when listing records
    #[serde(default = "default_dns_return_instance_limit")]
    pub dns_return_instance_limit: u32,

    /// Domains to keep in sync
    #[serde(default)]
    pub domain_target: Vec<String>,
}

impl Default for VercelSection {
    fn default() -> Self {
        Self {
            auth_token: None,
            dns_return_instance_limit: DEFAULT_DNS_RETURN_INSTANCE_LIMIT,
            domain_target: Vec::new(),
        }
    }
}

impl fmt::Debug for VercelSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VercelSection")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<REDACTED>"))
            .field("dns_return_instance_limit", &self.dns_return_instance_limit)
            .field("domain_target", &self.domain_target)
            .finish()
    }
}

fn default_dns_return_instance_limit() -> u32 {
    DEFAULT_DNS_RETURN_INSTANCE_LIMIT
}

/// Everything a provider factory needs to build a client
#[derive(Clone)]
pub struct ProviderConfig {
    /// Which provider to build
    pub target: Target,
    /// Resolved API token
    pub api_token: String,
    /// Page size for record listings, when the provider takes one
    pub page_size: Option<u32>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("target", &self.target)
            .field("api_token", &"<REDACTED>")
            .field("page_size", &self.page_size)
            .finish()
    }
}
