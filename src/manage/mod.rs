// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Declarative reconciliation of a [`ManageConfiguration`](crate::config::ManageConfiguration).
//!
//! Submodules:
//! - [`azure`] - resource groups, key vaults, plans, MariaDB, DNS zones, storage, web apps
//! - [`digitalocean`] - DigitalOcean domains, applied record by record
//! - [`orchestrator`] - whole-pass retry until convergence or stall
//! - [`export`] - live state rendered back into a configuration document
//! - [`dns_sync`] - keep one A record pointed at the host's public IP
//!
//! This module holds the DNS plumbing shared by the Azure and DigitalOcean
//! services: resolving the live dependencies of computed entries, and writing
//! the record sets whose content changed.

pub mod azure;
pub mod digitalocean;
pub mod dns_sync;
pub mod export;
pub mod orchestrator;

use crate::context::{ManageContext, ModificationAction};
use crate::dns::apply::set_entry;
use crate::dns::lookup::DnsLookup;
use crate::dns::reconciler::{custom_domain_uses_a_record, DnsConfig, ResolvedDependencies};
use crate::dns::{DnsRecordType, RawDnsEntry};
use crate::errors::ManageError;
use crate::providers::{DnsZoneProvider, WebAppProvider};
use crate::resources::{DnsZone, ManagedResource};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Look up every web app and hostname the computed entries of `config` need.
///
/// Web apps without a resource group, or looked up while no web app provider
/// is available, are recorded as missing. Hostnames that fail to resolve are
/// recorded without addresses; the reconciler defers both.
///
/// # Errors
///
/// Returns [`ManageError::Provider`] when a web app lookup fails for any
/// reason other than "not found".
pub async fn resolve_dns_dependencies(
    domain_name: &str,
    config: &DnsConfig,
    web_apps: Option<&dyn WebAppProvider>,
    lookup: &dyn DnsLookup,
) -> Result<ResolvedDependencies, ManageError> {
    let mut dependencies = ResolvedDependencies::new();
    let mut hostnames: BTreeMap<(Option<String>, String), String> = BTreeMap::new();

    for (resource_group, name) in config.referenced_web_apps() {
        let found = match (resource_group.as_deref(), web_apps) {
            (Some(rg), Some(provider)) => provider.find_web_app(rg, &name).await?.into_option(),
            _ => None,
        };
        if let Some(hostname) = found.as_ref().and_then(|w| w.default_hostname.clone()) {
            hostnames.insert((resource_group.clone(), name.clone()), hostname);
        }
        dependencies.insert_web_app(resource_group.as_deref(), &name, found);
    }

    let mut resolved: BTreeSet<String> = BTreeSet::new();
    for layer in &config.configs {
        for custom in &layer.azure_custom_domain_dns_entries {
            if !custom_domain_uses_a_record(domain_name, custom) {
                continue;
            }
            let Some(hostname) =
                hostnames.get(&(custom.resource_group.clone(), custom.web_app.clone()))
            else {
                continue;
            };
            if !resolved.insert(hostname.clone()) {
                continue;
            }
            let addresses = match lookup.lookup_a(hostname).await {
                Ok(addresses) => addresses,
                Err(e) => {
                    warn!(hostname = %hostname, error = %e, "Hostname does not resolve yet");
                    Vec::new()
                }
            };
            dependencies.insert_addresses(hostname, addresses);
        }
    }
    Ok(dependencies)
}

type RecordSets = BTreeMap<(String, DnsRecordType), BTreeSet<RawDnsEntry>>;

fn record_sets(entries: &[RawDnsEntry]) -> RecordSets {
    let mut sets: RecordSets = BTreeMap::new();
    for entry in entries {
        let mut entry = entry.clone();
        entry.provider_id = None;
        sets.entry((entry.name.to_ascii_lowercase(), entry.record_type))
            .or_default()
            .insert(entry);
    }
    sets
}

fn describe(entries: &BTreeSet<RawDnsEntry>) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrite every record set of `zone` whose desired content differs from the
/// current one, recording one modification per record set.
///
/// # Errors
///
/// Returns [`ManageError::Dns`] when a desired record set is invalid (e.g. two
/// CNAME values) and [`ManageError::Provider`] when a write fails.
pub async fn apply_record_sets(
    ctx: &mut ManageContext,
    provider: &dyn DnsZoneProvider,
    zone: &DnsZone,
    current: &[RawDnsEntry],
    desired: &[RawDnsEntry],
) -> Result<(), ManageError> {
    let current_sets = record_sets(current);
    let desired_sets = record_sets(desired);
    let keys: BTreeSet<&(String, DnsRecordType)> =
        current_sets.keys().chain(desired_sets.keys()).collect();
    let empty = BTreeSet::new();

    for key in keys {
        let current_set = current_sets.get(key).unwrap_or(&empty);
        let desired_set = desired_sets.get(key).unwrap_or(&empty);
        if current_set == desired_set {
            continue;
        }
        let (name, record_type) = key;
        let desired_entries: Vec<RawDnsEntry> = desired_set.iter().cloned().collect();
        // Desired entries carry the configured spelling of the name
        let set_name = desired_entries
            .first()
            .or_else(|| current_set.iter().next())
            .map_or_else(|| name.clone(), |e| e.name.clone());
        let desired_entries: Vec<RawDnsEntry> = desired_entries
            .into_iter()
            .map(|mut e| {
                e.name.clone_from(&set_name);
                e
            })
            .collect();

        if !set_entry(provider, zone, &set_name, *record_type, &desired_entries).await? {
            continue;
        }

        let (action, details) = if current_set.is_empty() {
            (ModificationAction::Add, describe(desired_set))
        } else if desired_set.is_empty() {
            (ModificationAction::Remove, describe(current_set))
        } else {
            (
                ModificationAction::Update,
                format!("{} -> {}", describe(current_set), describe(desired_set)),
            )
        };
        ctx.modified(DnsZone::RESOURCE_TYPE, &zone.name, action, details);
    }
    debug!(zone = %zone.name, "Record sets applied");
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
