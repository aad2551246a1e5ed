// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Keeps one A record pointed at the public IP of the current host.

use crate::dns::apply::set_entry;
use crate::dns::{DnsRecordType, RawDnsEntry};
use crate::errors::ManageError;
use crate::providers::{DnsZoneProvider, PublicIpSource};
use crate::resources::{DnsZone, ManagedResource};
use tracing::{debug, info};

/// Point `hostname` at the public IP reported by `ip_source`.
///
/// The record set is only rewritten when it does not already hold exactly
/// that address with that TTL.
///
/// # Arguments
///
/// * `provider` - DNS provider hosting the zone
/// * `zone_name` - Domain of the zone (e.g. `example.com`)
/// * `resource_group` - Resource group of the zone, for Azure
/// * `hostname` - Fully qualified name to update (e.g. `home.example.com`)
/// * `ttl` - TTL of the record, in seconds
/// * `ip_source` - Public IP discovery
///
/// # Returns
///
/// True when the record set was written.
///
/// # Errors
///
/// Returns [`ManageError::MissingReference`] when the zone does not exist and
/// [`ManageError::Provider`] when discovery or a DNS call fails.
pub async fn sync_public_ip(
    provider: &dyn DnsZoneProvider,
    zone_name: &str,
    resource_group: Option<&str>,
    hostname: &str,
    ttl: u32,
    ip_source: &dyn PublicIpSource,
) -> Result<bool, ManageError> {
    let zone: DnsZone = provider
        .find_dns_zone(resource_group, zone_name)
        .await?
        .into_option()
        .ok_or_else(|| ManageError::MissingReference {
            resource_type: DnsZone::RESOURCE_TYPE.to_string(),
            name: zone_name.to_string(),
            reference: format!("zone {zone_name}"),
        })?;

    let ip = ip_source.get_public_ip().await?;
    let desired = RawDnsEntry::new(hostname, DnsRecordType::A, ip.as_str(), ttl);

    let current: Vec<RawDnsEntry> = provider
        .list_entries(&zone)
        .await?
        .into_iter()
        .filter(|e| e.record_type == DnsRecordType::A && e.name.eq_ignore_ascii_case(hostname))
        .collect();
    if let [only] = current.as_slice() {
        if only.details == desired.details && only.ttl == desired.ttl {
            debug!(hostname = %hostname, ip = %ip, "Public IP already published");
            return Ok(false);
        }
    }

    let written = set_entry(provider, &zone, hostname, DnsRecordType::A, &[desired]).await?;
    if written {
        info!(hostname = %hostname, ip = %ip, "Published public IP");
    }
    Ok(written)
}

#[cfg(test)]
#[path = "dns_sync_tests.rs"]
mod dns_sync_tests;
