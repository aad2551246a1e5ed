// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DigitalOcean DNS client.
//!
//! DigitalOcean addresses single records by numeric id, so the client offers
//! both the record level ([`DnsRecordProvider`]) and the record-set level
//! ([`DnsZoneProvider`], implemented as list + delete/add by id).
//!
//! Record names are relative on the wire (`@`, `www`); host targets (CNAME,
//! MX, NS, SRV) are sent fully qualified with a trailing dot.

use super::http::JsonApi;
use super::{DnsRecordProvider, DnsZoneProvider};
use crate::constants::{DIGITALOCEAN_API_URL, DIGITALOCEAN_PAGE_SIZE, ZONE_APEX};
use crate::dns::{absolute_name, relative_name, DnsRecordType, RawDnsEntry};
use crate::errors::{DnsError, ProviderError, ProviderResult};
use crate::resources::{CloudProvider, DnsZone, Lookup};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct DomainEnvelope {
    domain: ApiDomain,
}

#[derive(Debug, Deserialize)]
struct ApiDomain {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    domain_records: Vec<ApiRecord>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    domain_record: ApiRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiRecord {
    #[serde(default, skip_serializing)]
    id: u64,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    data: String,
    ttl: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flags: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// Client of the DigitalOcean `/v2/domains` API.
#[derive(Clone)]
pub struct DigitalOceanClient {
    api: JsonApi,
    token: String,
    base_url: String,
}

impl DigitalOceanClient {
    pub fn new(api: JsonApi, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
            base_url: DIGITALOCEAN_API_URL.to_string(),
        }
    }

    /// Point the client at another endpoint (tests, proxies).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn domain_url(&self, domain: &str) -> String {
        format!("{}/v2/domains/{domain}", self.base_url)
    }

    async fn list_api_records(&self, zone: &DnsZone) -> ProviderResult<Vec<ApiRecord>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/records?page={page}&per_page={DIGITALOCEAN_PAGE_SIZE}",
                self.domain_url(&zone.name)
            );
            let body: RecordPage = self
                .api
                .json(Method::GET, &url, Some(&self.token), None)
                .await?;
            let has_next = body
                .links
                .and_then(|l| l.pages)
                .and_then(|p| p.next)
                .is_some();
            let empty = body.domain_records.is_empty();
            records.extend(body.domain_records);
            if !has_next || empty {
                break;
            }
            page += 1;
        }
        debug!(domain = %zone.name, records = records.len(), "Listed DigitalOcean records");
        Ok(records)
    }

    async fn post_record(&self, zone: &DnsZone, record: &ApiRecord) -> ProviderResult<ApiRecord> {
        let url = format!("{}/records", self.domain_url(&zone.name));
        let body = serde_json::to_value(record).map_err(|e| ProviderError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let created: RecordEnvelope = self
            .api
            .json(Method::POST, &url, Some(&self.token), Some(&body))
            .await?;
        Ok(created.domain_record)
    }
}

/// Convert a listed record to an entry; provider-managed records map to `None`.
fn to_entry(zone: &str, record: &ApiRecord) -> Option<RawDnsEntry> {
    let record_type: DnsRecordType = record.record_type.parse().ok()?;
    let name = absolute_name(zone, &record.name);
    if record_type == DnsRecordType::NS && record.name == ZONE_APEX {
        return None;
    }

    let details = if record_type == DnsRecordType::CAA {
        format!(
            "{} {} \"{}\"",
            record.flags.unwrap_or(0),
            record.tag.as_deref().unwrap_or("issue"),
            record.data
        )
    } else if record_type.has_host_target() {
        if record.data == ZONE_APEX {
            zone.to_string()
        } else {
            record.data.trim_end_matches('.').to_string()
        }
    } else {
        record.data.clone()
    };

    Some(RawDnsEntry {
        name,
        record_type,
        details,
        ttl: record.ttl,
        priority: record.priority,
        weight: record.weight,
        port: record.port,
        provider_id: Some(record.id.to_string()),
    })
}

/// Convert an entry to the request body of a record creation.
fn to_api_record(zone: &str, entry: &RawDnsEntry) -> ProviderResult<ApiRecord> {
    let invalid = |reason: &str| {
        ProviderError::Rejected(
            DnsError::InvalidRecordData {
                name: entry.name.clone(),
                record_type: entry.record_type.to_string(),
                reason: reason.to_string(),
            }
            .to_string(),
        )
    };

    let name = relative_name(zone, &entry.name).ok_or_else(|| invalid("name is outside the zone"))?;
    let mut record = ApiRecord {
        id: 0,
        record_type: entry.record_type.to_string(),
        name,
        data: entry.details.clone(),
        ttl: entry.ttl,
        priority: entry.priority,
        port: entry.port,
        weight: entry.weight,
        flags: None,
        tag: None,
    };

    if entry.record_type == DnsRecordType::CAA {
        let mut parts = entry.details.splitn(3, ' ');
        let flags = parts
            .next()
            .and_then(|f| f.parse::<u8>().ok())
            .ok_or_else(|| invalid("CAA flags must be a number"))?;
        let tag = parts.next().ok_or_else(|| invalid("CAA tag missing"))?;
        let value = parts.next().ok_or_else(|| invalid("CAA value missing"))?;
        record.flags = Some(flags);
        record.tag = Some(tag.to_string());
        record.data = value.trim_matches('"').to_string();
    } else if entry.record_type.has_host_target() {
        record.data = format!("{}.", entry.details.trim_end_matches('.'));
    }
    Ok(record)
}

#[async_trait]
impl DnsZoneProvider for DigitalOceanClient {
    async fn find_dns_zone(
        &self,
        _resource_group: Option<&str>,
        name: &str,
    ) -> ProviderResult<Lookup<DnsZone>> {
        let found: Lookup<DomainEnvelope> = self
            .api
            .get_optional(&self.domain_url(name), Some(&self.token))
            .await?;
        Ok(found.map(|envelope| {
            let mut zone = DnsZone::new(envelope.domain.name.clone());
            zone.id = Some(envelope.domain.name);
            zone.provider = Some(CloudProvider::DigitalOcean);
            zone
        }))
    }

    async fn create_dns_zone(&self, desired: &DnsZone) -> ProviderResult<DnsZone> {
        let url = format!("{}/v2/domains", self.base_url);
        let body = json!({ "name": desired.name });
        let created: DomainEnvelope = self
            .api
            .json(Method::POST, &url, Some(&self.token), Some(&body))
            .await?;
        info!(domain = %created.domain.name, "Created DigitalOcean domain");
        let mut zone = DnsZone::new(created.domain.name.clone());
        zone.id = Some(created.domain.name);
        zone.provider = Some(CloudProvider::DigitalOcean);
        Ok(zone)
    }

    async fn list_entries(&self, zone: &DnsZone) -> ProviderResult<Vec<RawDnsEntry>> {
        let records = self.list_api_records(zone).await?;
        Ok(records
            .iter()
            .filter_map(|r| to_entry(&zone.name, r))
            .collect())
    }

    async fn delete_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
    ) -> ProviderResult<()> {
        let name = absolute_name(&zone.name, relative_name);
        let doomed: Vec<String> = self
            .list_entries(zone)
            .await?
            .into_iter()
            .filter(|e| e.record_type == record_type && e.name.eq_ignore_ascii_case(&name))
            .filter_map(|e| e.provider_id)
            .collect();
        for id in doomed {
            self.delete_record(zone, &id).await?;
        }
        Ok(())
    }

    async fn create_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
        ttl: u32,
        entries: &[RawDnsEntry],
    ) -> ProviderResult<()> {
        let name = absolute_name(&zone.name, relative_name);
        for entry in entries {
            let mut entry = entry.clone();
            entry.name.clone_from(&name);
            entry.record_type = record_type;
            entry.ttl = ttl;
            self.add_record(zone, &entry).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DnsRecordProvider for DigitalOceanClient {
    async fn add_record(&self, zone: &DnsZone, entry: &RawDnsEntry) -> ProviderResult<RawDnsEntry> {
        let record = to_api_record(&zone.name, entry)?;
        let created = self.post_record(zone, &record).await?;
        debug!(domain = %zone.name, entry = %entry, id = created.id, "Added DigitalOcean record");
        let mut added = entry.clone();
        added.provider_id = Some(created.id.to_string());
        Ok(added)
    }

    async fn delete_record(&self, zone: &DnsZone, record_id: &str) -> ProviderResult<()> {
        let url = format!("{}/records/{record_id}", self.domain_url(&zone.name));
        self.api
            .send(Method::DELETE, &url, Some(&self.token), None)
            .await?;
        debug!(domain = %zone.name, id = %record_id, "Deleted DigitalOcean record");
        Ok(())
    }
}

#[cfg(test)]
#[path = "digitalocean_tests.rs"]
mod digitalocean_tests;
