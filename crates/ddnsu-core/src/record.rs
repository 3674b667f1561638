//! Record model shared by the matcher, the reconciler and every provider
//!
//! - [`DesiredRecord`]: a declarative entry from configuration
//! - [`RemoteRecord`]: a provider record normalized to a common shape
//! - [`OwnershipTag`]: the comment marker that ties the two together

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal prefix of every comment written by DDNSU.
///
/// Must stay bit-for-bit stable: records created by earlier runs are
/// recognised by it.
pub const TAG_PREFIX: &str = "DDNSU_";

/// DNS record type supported in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Alias,
    Caa,
    Cname,
    Https,
    Mx,
    Srv,
    Txt,
    Ns,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Https => "HTTPS",
            RecordType::Mx => "MX",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record the operator wants to exist on every domain target.
///
/// `comment` is the identity key. It must be unique among all desired
/// records; [`crate::config::DdnsuConfig::validate`] enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredRecord {
    /// Record type
    pub record_type: RecordType,

    /// Identity key, stored remotely as `DDNSU_<comment>`
    pub comment: String,

    /// Time-to-live in seconds
    pub ttl: u32,

    /// Subdomain label; empty or `*` means the provider's apex convention
    pub name: String,
}

impl DesiredRecord {
    /// Create a new desired record
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        ttl: u32,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            record_type,
            comment: comment.into(),
            ttl,
            name: name.into(),
        }
    }

    /// The ownership tag this record is stored under
    pub fn tag(&self) -> OwnershipTag {
        OwnershipTag::for_comment(&self.comment)
    }

    /// Whether the name must be translated to the provider's apex label
    pub fn is_apex(&self) -> bool {
        is_apex_name(&self.name)
    }
}

/// A record as reported by a provider.
///
/// Fetched fresh on every pass and never cached across passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned identifier (opaque)
    pub id: String,
    /// Relative record name
    pub name: String,
    /// Record type as reported by the provider
    pub record_type: String,
    /// Record content
    pub value: String,
    /// Time-to-live, when the provider reports one
    pub ttl: Option<u32>,
    /// Free-text comment; `None` for records without one
    pub comment: Option<String>,
}

impl RemoteRecord {
    /// Whether the record carries the DDNSU tag prefix
    pub fn is_tagged(&self) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|c| c.starts_with(TAG_PREFIX))
    }

    /// Whether the record is owned by the given tag
    pub fn is_owned_by(&self, tag: &OwnershipTag) -> bool {
        self.comment.as_deref() == Some(tag.as_str())
    }
}

/// Comment marker identifying a remote record as managed for one desired record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnershipTag(String);

impl OwnershipTag {
    /// Build the tag for a desired record comment
    pub fn for_comment(comment: &str) -> Self {
        Self(format!("{TAG_PREFIX}{comment}"))
    }

    /// The full comment string sent to providers
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnershipTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Empty and wildcard names both mean "the apex of the domain"
pub fn is_apex_name(name: &str) -> bool {
    name.is_empty() || name == "*"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(comment: Option<&str>) -> RemoteRecord {
        RemoteRecord {
            id: "r1".to_string(),
            name: "@".to_string(),
            record_type: "A".to_string(),
            value: "1.2.3.4".to_string(),
            ttl: Some(60),
            comment: comment.map(str::to_string),
        }
    }

    #[test]
    fn tag_is_prefix_plus_comment() {
        let record = DesiredRecord::new(RecordType::A, "www", 60, "home");
        assert_eq!(record.tag().as_str(), "DDNSU_home");
    }

    #[test]
    fn tag_matching_is_exact_and_case_sensitive() {
        let tag = OwnershipTag::for_comment("home");
        assert!(remote(Some("DDNSU_home")).is_owned_by(&tag));
        assert!(!remote(Some("DDNSU_Home")).is_owned_by(&tag));
        assert!(!remote(Some("DDNSU_home ")).is_owned_by(&tag));
        assert!(!remote(None).is_owned_by(&tag));
    }

    #[test]
    fn tagged_requires_prefix() {
        assert!(remote(Some("DDNSU_x")).is_tagged());
        assert!(!remote(Some("ddnsu_x")).is_tagged());
        assert!(!remote(Some("other")).is_tagged());
        assert!(!remote(None).is_tagged());
    }

    #[test]
    fn apex_names() {
        assert!(is_apex_name(""));
        assert!(is_apex_name("*"));
        assert!(!is_apex_name("www"));
        assert!(!is_apex_name("*.dev"));
    }

    #[test]
    fn record_type_uses_uppercase_wire_names() {
        let json = serde_json::to_string(&RecordType::Aaaa).unwrap();
        assert_eq!(json, "\"AAAA\"");
        let parsed: RecordType = serde_json::from_str("\"CNAME\"").unwrap();
        assert_eq!(parsed, RecordType::Cname);
        assert_eq!(RecordType::Https.to_string(), "HTTPS");
    }
}
