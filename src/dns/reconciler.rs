// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired DNS entries of a zone.
//!
//! Cloud DNS APIs work on whole record sets (all values of one name and type),
//! so the reconciler produces one consistent target set per `name|type` key and
//! the apply step can replace each set wholesale.
//!
//! # Algorithm
//!
//! 1. Seed a working map `name|type -> entries` from the current entries
//!    (all of them, only `startWithDomains`, or none when `startEmpty`).
//! 2. Apply each layer of [`DnsConfig::configs`] in order: raw entries,
//!    clear directives and computed entries, honouring the layer's
//!    [`ConflictResolution`].
//! 3. Normalize the TTL of every record set to the minimum TTL of its entries.
//! 4. Flatten, keep only names inside the zone, sort and deduplicate.
//!
//! Computed entries depend on live state (a web app's verification id or
//! hostname). That state is gathered beforehand into [`ResolvedDependencies`];
//! anything missing is deferred to the next pass through the
//! [`ManageContext`] instead of failing.

use super::{dns_is_sub_domain, name_type_key, DnsRecordType, RawDnsEntry};
use crate::constants::{AZURE_UID_LABEL, DEFAULT_DNS_TTL_SECS, DEFAULT_GENERATED_TTL_SECS};
use crate::context::{DeferralKind, ManageContext};
use crate::resources::WebApp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// How a layer merges into the entries accumulated so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    /// Replace every record set the layer touches
    #[default]
    Overwrite,
    /// Add values next to the existing ones
    Append,
}

/// Removes a whole record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearDnsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: DnsRecordType,
}

/// TXT `asuid.<name>` holding a web app's custom domain verification id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureUidDnsEntry {
    /// Hostname being verified (e.g. `www.example.com`)
    pub name: String,
    pub web_app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// Points a hostname at a web app, as a CNAME or as A records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCustomDomainDnsEntry {
    pub name: String,
    pub web_app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Publish A records resolved from the web app hostname instead of a CNAME.
    /// Always the case at the zone apex.
    #[serde(default)]
    pub use_a_record: bool,
}

/// One layer of desired DNS state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntryConfig {
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_dns_entries: Vec<RawDnsEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear_dns_entries: Vec<ClearDnsEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azure_uid_dns_entries: Vec<AzureUidDnsEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azure_custom_domain_dns_entries: Vec<AzureCustomDomainDnsEntry>,
}

/// Desired DNS state of a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    #[serde(default)]
    pub start_empty: bool,
    /// With `startEmpty`, names whose current entries are still kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with_domains: Option<BTreeSet<String>>,
    #[serde(default)]
    pub configs: Vec<DnsEntryConfig>,
}

impl DnsConfig {
    /// Web apps referenced by computed entries, as `(resource group, name)` pairs.
    #[must_use]
    pub fn referenced_web_apps(&self) -> Vec<(Option<String>, String)> {
        let mut refs: Vec<(Option<String>, String)> = Vec::new();
        for layer in &self.configs {
            let uid = layer
                .azure_uid_dns_entries
                .iter()
                .map(|e| (e.resource_group.clone(), e.web_app.clone()));
            let custom = layer
                .azure_custom_domain_dns_entries
                .iter()
                .map(|e| (e.resource_group.clone(), e.web_app.clone()));
            for r in uid.chain(custom) {
                if !refs.contains(&r) {
                    refs.push(r);
                }
            }
        }
        refs
    }

    /// Fill the resource group of computed entries that omit it.
    pub fn apply_default_resource_group(&mut self, resource_group: Option<&str>) {
        let Some(default) = resource_group else {
            return;
        };
        for layer in &mut self.configs {
            for entry in &mut layer.azure_uid_dns_entries {
                entry.resource_group.get_or_insert_with(|| default.to_string());
            }
            for entry in &mut layer.azure_custom_domain_dns_entries {
                entry.resource_group.get_or_insert_with(|| default.to_string());
            }
        }
    }
}

/// Identity of a web app in [`ResolvedDependencies`] and in deferrals.
#[must_use]
pub fn web_app_identity(resource_group: Option<&str>, name: &str) -> String {
    format!("{}/{name}", resource_group.unwrap_or(""))
}

/// Live state needed by computed entries, gathered before reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    web_apps: HashMap<String, Option<WebApp>>,
    addresses: HashMap<String, Vec<String>>,
}

impl ResolvedDependencies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the lookup result of a web app (`None` when it does not exist).
    pub fn insert_web_app(&mut self, resource_group: Option<&str>, name: &str, web_app: Option<WebApp>) {
        self.web_apps
            .insert(web_app_identity(resource_group, name), web_app);
    }

    /// Record the IPv4 addresses a hostname currently resolves to.
    pub fn insert_addresses(&mut self, hostname: &str, addresses: Vec<String>) {
        self.addresses.insert(hostname.to_ascii_lowercase(), addresses);
    }

    fn web_app(&self, resource_group: Option<&str>, name: &str) -> Option<&WebApp> {
        self.web_apps
            .get(&web_app_identity(resource_group, name))
            .and_then(Option::as_ref)
    }

    fn addresses(&self, hostname: &str) -> &[String] {
        self.addresses
            .get(&hostname.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }
}

type WorkingSet = BTreeMap<String, BTreeSet<RawDnsEntry>>;

/// Compute the sorted, distinct entries `domain_name` should contain.
///
/// Entries outside `domain_name` are dropped. Computed entries whose
/// dependencies are missing are skipped and reported through
/// [`ManageContext::needs_next_stage`].
pub fn compute_desired_entries(
    domain_name: &str,
    current_entries: &[RawDnsEntry],
    desired: &DnsConfig,
    dependencies: &ResolvedDependencies,
    ctx: &mut ManageContext,
) -> Vec<RawDnsEntry> {
    let mut working: WorkingSet = BTreeMap::new();

    // Seed
    for entry in current_entries {
        let keep = if desired.start_empty {
            desired.start_with_domains.as_ref().is_some_and(|domains| {
                domains
                    .iter()
                    .any(|domain| domain.eq_ignore_ascii_case(&entry.name))
            })
        } else {
            true
        };
        if keep {
            add_entry(&mut working, entry.clone());
        }
    }

    for layer in &desired.configs {
        // Raw entries
        merge_entries(&mut working, layer.conflict_resolution, layer.raw_dns_entries.clone());

        // Clear
        for clear in &layer.clear_dns_entries {
            working.remove(&name_type_key(&clear.name, clear.record_type));
        }

        // Computed
        for uid in &layer.azure_uid_dns_entries {
            if let Some(entry) = azure_uid_entry(uid, dependencies, ctx) {
                merge_entries(&mut working, layer.conflict_resolution, vec![entry]);
            }
        }
        for custom in &layer.azure_custom_domain_dns_entries {
            let entries = custom_domain_entries(domain_name, custom, dependencies, ctx);
            if !entries.is_empty() {
                merge_entries(&mut working, layer.conflict_resolution, entries);
            }
        }
    }

    normalize_ttl(&mut working);

    let mut result: Vec<RawDnsEntry> = working
        .into_values()
        .flatten()
        .filter(|entry| dns_is_sub_domain(domain_name, &entry.name))
        .collect();
    result.sort();
    result.dedup();
    debug!(
        domain = domain_name,
        entries = result.len(),
        "Computed desired DNS entries"
    );
    result
}

// Appended entries take the spelling already used by their record set.
fn add_entry(working: &mut WorkingSet, mut entry: RawDnsEntry) {
    let set = working.entry(entry.name_type_key()).or_default();
    if let Some(existing) = set.iter().next() {
        entry.name.clone_from(&existing.name);
    }
    set.insert(entry);
}

fn merge_entries(
    working: &mut WorkingSet,
    resolution: ConflictResolution,
    entries: Vec<RawDnsEntry>,
) {
    if resolution == ConflictResolution::Overwrite {
        for entry in &entries {
            working.remove(&entry.name_type_key());
        }
    }
    for entry in entries {
        add_entry(working, entry);
    }
}

/// Every entry of a record set gets the smallest TTL of the set, capped at two days.
fn normalize_ttl(working: &mut WorkingSet) {
    for entries in working.values_mut() {
        let ttl = entries
            .iter()
            .map(|e| e.ttl)
            .fold(DEFAULT_DNS_TTL_SECS, u32::min);
        let normalized: BTreeSet<RawDnsEntry> = std::mem::take(entries)
            .into_iter()
            .map(|mut e| {
                e.ttl = ttl;
                e
            })
            .collect();
        *entries = normalized;
    }
}

fn resolve_web_app<'a>(
    resource_group: Option<&str>,
    name: &str,
    dependencies: &'a ResolvedDependencies,
    ctx: &mut ManageContext,
) -> Option<&'a WebApp> {
    let web_app = dependencies.web_app(resource_group, name);
    if web_app.is_none() {
        ctx.needs_next_stage(
            DeferralKind::WebAppNotFound,
            web_app_identity(resource_group, name),
        );
    }
    web_app
}

fn azure_uid_entry(
    uid: &AzureUidDnsEntry,
    dependencies: &ResolvedDependencies,
    ctx: &mut ManageContext,
) -> Option<RawDnsEntry> {
    let web_app = resolve_web_app(uid.resource_group.as_deref(), &uid.web_app, dependencies, ctx)?;
    let Some(verification_id) = web_app.verification_id.as_deref() else {
        ctx.needs_next_stage(
            DeferralKind::WebAppVerificationId,
            web_app_identity(uid.resource_group.as_deref(), &uid.web_app),
        );
        return None;
    };
    Some(RawDnsEntry::new(
        format!("{AZURE_UID_LABEL}.{}", uid.name),
        DnsRecordType::TXT,
        verification_id,
        uid.ttl.unwrap_or(DEFAULT_GENERATED_TTL_SECS),
    ))
}

fn custom_domain_entries(
    domain_name: &str,
    custom: &AzureCustomDomainDnsEntry,
    dependencies: &ResolvedDependencies,
    ctx: &mut ManageContext,
) -> Vec<RawDnsEntry> {
    let Some(web_app) = resolve_web_app(
        custom.resource_group.as_deref(),
        &custom.web_app,
        dependencies,
        ctx,
    ) else {
        return Vec::new();
    };
    let Some(hostname) = web_app.default_hostname.as_deref() else {
        ctx.needs_next_stage(
            DeferralKind::WebAppDefaultHostname,
            web_app_identity(custom.resource_group.as_deref(), &custom.web_app),
        );
        return Vec::new();
    };
    let ttl = custom.ttl.unwrap_or(DEFAULT_GENERATED_TTL_SECS);

    if custom_domain_uses_a_record(domain_name, custom) {
        let addresses = dependencies.addresses(hostname);
        if addresses.is_empty() {
            ctx.needs_next_stage(DeferralKind::HostnameResolution, hostname);
            return Vec::new();
        }
        addresses
            .iter()
            .map(|ip| RawDnsEntry::new(custom.name.clone(), DnsRecordType::A, ip.clone(), ttl))
            .collect()
    } else {
        vec![RawDnsEntry::new(
            custom.name.clone(),
            DnsRecordType::CNAME,
            hostname,
            ttl,
        )]
    }
}

/// The zone apex cannot hold a CNAME, so it always gets A records.
#[must_use]
pub fn custom_domain_uses_a_record(domain_name: &str, custom: &AzureCustomDomainDnsEntry) -> bool {
    custom.use_a_record || custom.name.eq_ignore_ascii_case(domain_name)
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
