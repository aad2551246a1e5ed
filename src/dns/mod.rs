// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Raw DNS entries and name helpers shared by every DNS provider.
//!
//! A [`RawDnsEntry`] is one value of a record set, named by its fully qualified
//! name (`www.example.com`, never `www` or `@`). Providers translate to and from
//! their own relative naming at the edge.
//!
//! Submodules:
//! - [`reconciler`] - computes the desired entries of a zone from layered configuration
//! - [`apply`] - writes one record set (delete then recreate)
//! - [`lookup`] - live DNS queries through a recursive resolver

pub mod apply;
pub mod lookup;
pub mod reconciler;

use crate::constants::ZONE_APEX;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// DNS record types handled by the reconciler.
///
/// Variants are declared in alphabetical order of their wire names so the
/// derived ordering matches a string sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DnsRecordType {
    A,
    AAAA,
    CAA,
    CNAME,
    MX,
    NS,
    SRV,
    TXT,
}

impl DnsRecordType {
    /// Wire name of the record type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CAA => "CAA",
            Self::CNAME => "CNAME",
            Self::MX => "MX",
            Self::NS => "NS",
            Self::SRV => "SRV",
            Self::TXT => "TXT",
        }
    }

    /// Returns true if the record data is a host name (and may carry a trailing dot).
    #[must_use]
    pub fn has_host_target(self) -> bool {
        matches!(self, Self::CNAME | Self::MX | Self::NS | Self::SRV)
    }
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DnsRecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::AAAA),
            "CAA" => Ok(Self::CAA),
            "CNAME" => Ok(Self::CNAME),
            "MX" => Ok(Self::MX),
            "NS" => Ok(Self::NS),
            "SRV" => Ok(Self::SRV),
            "TXT" => Ok(Self::TXT),
            other => Err(format!("Unsupported DNS record type: {other}")),
        }
    }
}

/// One value of a DNS record set.
///
/// Equality, hashing and ordering cover `(name, type, details, ttl, priority,
/// weight, port)` with missing numeric fields treated as zero. `provider_id`
/// is carried along for providers that address single records but never takes
/// part in comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDnsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: DnsRecordType,
    pub details: String,
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl RawDnsEntry {
    /// Create an entry without priority, weight or port.
    pub fn new(
        name: impl Into<String>,
        record_type: DnsRecordType,
        details: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            details: details.into(),
            ttl,
            priority: None,
            weight: None,
            port: None,
            provider_id: None,
        }
    }

    /// Key of the record set this entry belongs to (`name|type`).
    #[must_use]
    pub fn name_type_key(&self) -> String {
        name_type_key(&self.name, self.record_type)
    }

    fn sort_key(&self) -> (&str, DnsRecordType, &str, u32, u16, u16, u16) {
        (
            &self.name,
            self.record_type,
            &self.details,
            self.ttl,
            self.priority.unwrap_or(0),
            self.weight.unwrap_or(0),
            self.port.unwrap_or(0),
        )
    }
}

impl PartialEq for RawDnsEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for RawDnsEntry {}

impl Hash for RawDnsEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for RawDnsEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawDnsEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for RawDnsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} (ttl {}", self.name, self.record_type, self.details, self.ttl)?;
        if let Some(priority) = self.priority {
            write!(f, ", priority {priority}")?;
        }
        if let Some(weight) = self.weight {
            write!(f, ", weight {weight}")?;
        }
        if let Some(port) = self.port {
            write!(f, ", port {port}")?;
        }
        f.write_str(")")
    }
}

/// Key of a record set (`name|type`), the name compared case-insensitively.
#[must_use]
pub fn name_type_key(name: &str, record_type: DnsRecordType) -> String {
    format!("{}|{record_type}", name.to_ascii_lowercase())
}

/// Returns true if `name` is `domain` itself or a dot-separated subdomain of it.
///
/// # Example
///
/// ```rust
/// use infractl::dns::dns_is_sub_domain;
///
/// assert!(dns_is_sub_domain("example.com", "example.com"));
/// assert!(dns_is_sub_domain("example.com", "www.example.com"));
/// assert!(!dns_is_sub_domain("example.com", "notexample.com"));
/// ```
#[must_use]
pub fn dns_is_sub_domain(domain: &str, name: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    name == domain || name.ends_with(&format!(".{domain}"))
}

/// Name of `name` relative to the zone `domain` (`@` for the apex).
///
/// Returns `None` when `name` is outside the zone.
#[must_use]
pub fn relative_name(domain: &str, name: &str) -> Option<String> {
    if !dns_is_sub_domain(domain, name) {
        return None;
    }
    let domain = domain.trim_end_matches('.');
    let name = name.trim_end_matches('.');
    if name.eq_ignore_ascii_case(domain) {
        Some(ZONE_APEX.to_string())
    } else {
        Some(name[..name.len() - domain.len() - 1].to_string())
    }
}

/// Fully qualified name of a zone-relative name (`@` and empty map to the apex).
#[must_use]
pub fn absolute_name(domain: &str, relative: &str) -> String {
    let domain = domain.trim_end_matches('.');
    if relative.is_empty() || relative == ZONE_APEX {
        domain.to_string()
    } else {
        format!("{}.{domain}", relative.trim_end_matches('.'))
    }
}
