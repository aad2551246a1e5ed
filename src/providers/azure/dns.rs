// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS zones and record sets.
//!
//! Azure addresses record sets by `{TYPE}/{relative name}`; every value of a
//! set lives in one typed array (`ARecords`, `TXTRecords`, ...). Listing
//! flattens each set into one [`RawDnsEntry`] per value.

use super::resources::{required_group, ArmResource};
use super::{id_resource_group, resource_path, AzureClient};
use crate::constants::{API_VERSION_DNS, ZONE_APEX};
use crate::dns::{absolute_name, DnsRecordType, RawDnsEntry};
use crate::errors::{DnsError, ProviderError, ProviderResult};
use crate::providers::DnsZoneProvider;
use crate::resources::{CloudProvider, DnsZone, Lookup};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Longest string Azure accepts inside one TXT value.
const TXT_CHUNK_LEN: usize = 255;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecordSetProperties {
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    #[serde(rename = "ARecords", default, skip_serializing_if = "Vec::is_empty")]
    pub a_records: Vec<ARecord>,
    #[serde(rename = "AAAARecords", default, skip_serializing_if = "Vec::is_empty")]
    pub aaaa_records: Vec<AaaaRecord>,
    #[serde(rename = "CNAMERecord", default, skip_serializing_if = "Option::is_none")]
    pub cname_record: Option<CnameRecord>,
    #[serde(rename = "MXRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub mx_records: Vec<MxRecord>,
    #[serde(rename = "NSRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub ns_records: Vec<NsRecord>,
    #[serde(rename = "TXTRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub txt_records: Vec<TxtRecord>,
    #[serde(rename = "SRVRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub srv_records: Vec<SrvRecord>,
    #[serde(rename = "caaRecords", default, skip_serializing_if = "Vec::is_empty")]
    pub caa_records: Vec<CaaRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ARecord {
    pub ipv4_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AaaaRecord {
    pub ipv6_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CnameRecord {
    pub cname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NsRecord {
    pub nsdname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TxtRecord {
    pub value: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CaaRecord {
    pub flags: u8,
    pub tag: String,
    pub value: String,
}

fn zone_path(resource_group: &str, zone: &str) -> String {
    resource_path(resource_group, "Microsoft.Network/dnsZones", zone)
}

fn zone_group(zone: &DnsZone) -> ProviderResult<&str> {
    required_group("DnsZone", &zone.name, zone.resource_group.as_deref())
}

/// Record type of a record set from its ARM type (`Microsoft.Network/dnszones/A`).
fn record_type_of(arm_type: &str) -> Option<DnsRecordType> {
    arm_type.rsplit('/').next()?.parse().ok()
}

fn host(value: &str) -> String {
    value.trim_end_matches('.').to_string()
}

/// Flatten one record set into entries.
pub(crate) fn record_set_entries(
    zone: &str,
    relative: &str,
    record_type: DnsRecordType,
    properties: &RecordSetProperties,
) -> Vec<RawDnsEntry> {
    let name = absolute_name(zone, relative);
    let ttl = properties.ttl;
    let entry = |details: String| RawDnsEntry::new(name.clone(), record_type, details, ttl);

    match record_type {
        DnsRecordType::A => properties
            .a_records
            .iter()
            .map(|r| entry(r.ipv4_address.clone()))
            .collect(),
        DnsRecordType::AAAA => properties
            .aaaa_records
            .iter()
            .map(|r| entry(r.ipv6_address.clone()))
            .collect(),
        DnsRecordType::CNAME => properties
            .cname_record
            .iter()
            .map(|r| entry(host(&r.cname)))
            .collect(),
        DnsRecordType::MX => properties
            .mx_records
            .iter()
            .map(|r| {
                let mut e = entry(host(&r.exchange));
                e.priority = Some(r.preference);
                e
            })
            .collect(),
        DnsRecordType::NS => properties
            .ns_records
            .iter()
            .map(|r| entry(host(&r.nsdname)))
            .collect(),
        DnsRecordType::TXT => properties
            .txt_records
            .iter()
            .map(|r| entry(r.value.concat()))
            .collect(),
        DnsRecordType::SRV => properties
            .srv_records
            .iter()
            .map(|r| {
                let mut e = entry(host(&r.target));
                e.priority = Some(r.priority);
                e.weight = Some(r.weight);
                e.port = Some(r.port);
                e
            })
            .collect(),
        DnsRecordType::CAA => properties
            .caa_records
            .iter()
            .map(|r| entry(format!("{} {} \"{}\"", r.flags, r.tag, r.value)))
            .collect(),
    }
}

/// Build the properties of a record set holding `entries`.
pub(crate) fn record_set_properties(
    record_type: DnsRecordType,
    ttl: u32,
    entries: &[RawDnsEntry],
) -> Result<RecordSetProperties, DnsError> {
    let mut properties = RecordSetProperties {
        ttl,
        ..RecordSetProperties::default()
    };
    for entry in entries {
        let details = entry.details.clone();
        match record_type {
            DnsRecordType::A => properties.a_records.push(ARecord {
                ipv4_address: details,
            }),
            DnsRecordType::AAAA => properties.aaaa_records.push(AaaaRecord {
                ipv6_address: details,
            }),
            DnsRecordType::CNAME => properties.cname_record = Some(CnameRecord { cname: details }),
            DnsRecordType::MX => properties.mx_records.push(MxRecord {
                preference: entry.priority.unwrap_or(0),
                exchange: details,
            }),
            DnsRecordType::NS => properties.ns_records.push(NsRecord { nsdname: details }),
            DnsRecordType::TXT => properties.txt_records.push(TxtRecord {
                value: split_txt(&details),
            }),
            DnsRecordType::SRV => properties.srv_records.push(SrvRecord {
                priority: entry.priority.unwrap_or(0),
                weight: entry.weight.unwrap_or(0),
                port: entry.port.unwrap_or(0),
                target: details,
            }),
            DnsRecordType::CAA => properties.caa_records.push(parse_caa(entry)?),
        }
    }
    Ok(properties)
}

/// Split a TXT value into strings Azure accepts.
pub(crate) fn split_txt(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec![String::new()];
    }
    value
        .chars()
        .collect::<Vec<_>>()
        .chunks(TXT_CHUNK_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn parse_caa(entry: &RawDnsEntry) -> Result<CaaRecord, DnsError> {
    let invalid = |reason: &str| DnsError::InvalidRecordData {
        name: entry.name.clone(),
        record_type: entry.record_type.to_string(),
        reason: reason.to_string(),
    };
    let mut parts = entry.details.splitn(3, ' ');
    let flags = parts
        .next()
        .and_then(|f| f.parse::<u8>().ok())
        .ok_or_else(|| invalid("CAA flags must be a number"))?;
    let tag = parts.next().ok_or_else(|| invalid("CAA tag missing"))?;
    let value = parts.next().ok_or_else(|| invalid("CAA value missing"))?;
    Ok(CaaRecord {
        flags,
        tag: tag.to_string(),
        value: value.trim_matches('"').to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RecordSet {
    name: String,
    #[serde(rename = "type")]
    arm_type: String,
    #[serde(default)]
    properties: RecordSetProperties,
}

fn to_zone(resource: ArmResource<Value>) -> DnsZone {
    let mut zone = DnsZone::new(resource.name.clone());
    zone.resource_group = id_resource_group(&resource.id).map(str::to_string);
    zone.id = Some(resource.id);
    zone.provider = Some(CloudProvider::Azure);
    zone
}

#[async_trait]
impl DnsZoneProvider for AzureClient {
    async fn find_dns_zone(
        &self,
        resource_group: Option<&str>,
        name: &str,
    ) -> ProviderResult<Lookup<DnsZone>> {
        let resource_group = required_group("DnsZone", name, resource_group)?;
        let found: Lookup<ArmResource<Value>> = self
            .session()
            .arm_get(&zone_path(resource_group, name), API_VERSION_DNS)
            .await?;
        Ok(found.map(|resource| {
            let mut zone = to_zone(resource);
            zone.resource_group = Some(resource_group.to_string());
            zone
        }))
    }

    async fn create_dns_zone(&self, desired: &DnsZone) -> ProviderResult<DnsZone> {
        let resource_group = zone_group(desired)?;
        let body = json!({ "location": "global", "properties": { "zoneType": "Public" } });
        let created: ArmResource<Value> = self
            .session()
            .arm_send(
                Method::PUT,
                &zone_path(resource_group, &desired.name),
                API_VERSION_DNS,
                Some(&body),
            )
            .await?;
        info!(zone = %desired.name, resource_group = %resource_group, "Created Azure DNS zone");
        let mut zone = to_zone(created);
        zone.resource_group = Some(resource_group.to_string());
        zone.config = desired.config.clone();
        Ok(zone)
    }

    async fn list_entries(&self, zone: &DnsZone) -> ProviderResult<Vec<RawDnsEntry>> {
        let resource_group = zone_group(zone)?;
        let sets: Vec<RecordSet> = self
            .session()
            .arm_list(
                &format!("{}/recordsets", zone_path(resource_group, &zone.name)),
                API_VERSION_DNS,
            )
            .await?;

        let mut entries = Vec::new();
        for set in sets {
            // SOA and unsupported types are not managed
            let Some(record_type) = record_type_of(&set.arm_type) else {
                continue;
            };
            if record_type == DnsRecordType::NS && set.name == ZONE_APEX {
                continue;
            }
            entries.extend(record_set_entries(
                &zone.name,
                &set.name,
                record_type,
                &set.properties,
            ));
        }
        debug!(zone = %zone.name, count = entries.len(), "Listed Azure DNS entries");
        Ok(entries)
    }

    async fn delete_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
    ) -> ProviderResult<()> {
        let resource_group = zone_group(zone)?;
        let path = format!(
            "{}/{record_type}/{relative_name}",
            zone_path(resource_group, &zone.name)
        );
        self.session().arm_delete(&path, API_VERSION_DNS).await
    }

    async fn create_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
        ttl: u32,
        entries: &[RawDnsEntry],
    ) -> ProviderResult<()> {
        let resource_group = zone_group(zone)?;
        let properties = record_set_properties(record_type, ttl, entries)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;
        let body = json!({ "properties": properties });
        let path = format!(
            "{}/{record_type}/{relative_name}",
            zone_path(resource_group, &zone.name)
        );
        let _: Value = self
            .session()
            .arm_send(Method::PUT, &path, API_VERSION_DNS, Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
