// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Writes one record set of a zone.
//!
//! There is no partial-update API for record sets, so a set is always deleted
//! and recreated from the full list of values.

use super::{relative_name, DnsRecordType, RawDnsEntry};
use crate::errors::{ApplyError, DnsError};
use crate::providers::DnsZoneProvider;
use crate::resources::DnsZone;
use tracing::{debug, warn};

/// Check that `entries` can form the record set `name` / `record_type`.
///
/// # Errors
///
/// - [`DnsError::MixedEntries`] when an entry has another name or type
/// - [`DnsError::MultipleCname`] when a CNAME set has more than one value
pub fn validate_record_set(
    name: &str,
    record_type: DnsRecordType,
    entries: &[RawDnsEntry],
) -> Result<(), DnsError> {
    if let Some(stray) = entries
        .iter()
        .find(|e| e.name != name || e.record_type != record_type)
    {
        return Err(DnsError::MixedEntries {
            name: name.to_string(),
            record_type: record_type.to_string(),
            found_name: stray.name.clone(),
            found_type: stray.record_type.to_string(),
        });
    }
    if record_type == DnsRecordType::CNAME && entries.len() > 1 {
        return Err(DnsError::MultipleCname {
            name: name.to_string(),
            count: entries.len(),
        });
    }
    Ok(())
}

/// Replace the record set `name` / `record_type` of `zone` with `entries`.
///
/// An empty `entries` only deletes the set. Names outside the zone are
/// skipped with a warning. Returns true when the zone was written.
///
/// # Errors
///
/// Returns [`ApplyError::Dns`] when [`validate_record_set`] fails (nothing is
/// written) and [`ApplyError::Provider`] when a provider call fails.
pub async fn set_entry(
    provider: &dyn DnsZoneProvider,
    zone: &DnsZone,
    name: &str,
    record_type: DnsRecordType,
    entries: &[RawDnsEntry],
) -> Result<bool, ApplyError> {
    validate_record_set(name, record_type, entries)?;

    let Some(subdomain) = relative_name(&zone.name, name) else {
        warn!(
            zone = %zone.name,
            name = %name,
            record_type = %record_type,
            "Name is outside the zone, skipping"
        );
        return Ok(false);
    };

    provider
        .delete_record_set(zone, &subdomain, record_type)
        .await?;

    if let Some(ttl) = entries.iter().map(|e| e.ttl).min() {
        provider
            .create_record_set(zone, &subdomain, record_type, ttl, entries)
            .await?;
    }

    debug!(
        zone = %zone.name,
        name = %name,
        record_type = %record_type,
        values = entries.len(),
        "Record set written"
    );
    Ok(true)
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
