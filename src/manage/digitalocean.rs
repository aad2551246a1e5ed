// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of DigitalOcean domains.
//!
//! DigitalOcean addresses single records by id, so the desired entries are
//! applied record by record: current records that are no longer desired are
//! deleted by id and missing ones are added. Record sets are still validated
//! as a whole before anything is written.

use super::resolve_dns_dependencies;
use crate::config::DigitalOceanConfiguration;
use crate::context::{ManageContext, ModificationAction};
use crate::dns::apply::validate_record_set;
use crate::dns::lookup::DnsLookup;
use crate::dns::reconciler::compute_desired_entries;
use crate::dns::{DnsRecordType, RawDnsEntry};
use crate::errors::ManageError;
use crate::providers::{DnsRecordProvider, WebAppProvider};
use crate::resources::{deferred_updates, DnsZone, Lookup, ManagedResource};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies the DigitalOcean part of a configuration.
#[derive(Clone)]
pub struct DigitalOceanManageService {
    dns: Arc<dyn DnsRecordProvider>,
    web_apps: Option<Arc<dyn WebAppProvider>>,
    lookup: Arc<dyn DnsLookup>,
}

impl DigitalOceanManageService {
    /// `web_apps` resolves Azure web apps referenced by computed entries;
    /// without it those entries are deferred.
    pub fn new(
        dns: Arc<dyn DnsRecordProvider>,
        web_apps: Option<Arc<dyn WebAppProvider>>,
        lookup: Arc<dyn DnsLookup>,
    ) -> Self {
        Self {
            dns,
            web_apps,
            lookup,
        }
    }

    /// Run one pass over every domain of `config`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid record set or provider failure.
    pub async fn manage(
        &self,
        ctx: &mut ManageContext,
        config: &DigitalOceanConfiguration,
    ) -> Result<(), ManageError> {
        for domain in &config.domains {
            self.manage_domain(ctx, domain).await?;
        }
        Ok(())
    }

    pub async fn manage_domain(
        &self,
        ctx: &mut ManageContext,
        desired: &DnsZone,
    ) -> Result<(), ManageError> {
        let zone = match self.dns.find_dns_zone(None, &desired.name).await? {
            Lookup::NotFound => {
                let created = self.dns.create_dns_zone(desired).await?;
                ctx.modified(DnsZone::RESOURCE_TYPE, &desired.name, ModificationAction::Add, "");
                created
            }
            Lookup::Found(current) => {
                let mut unscoped = desired.clone();
                unscoped.resource_group = None;
                deferred_updates(
                    DnsZone::RESOURCE_TYPE,
                    &desired.name,
                    unscoped.differences(&current),
                )?;
                current
            }
        };

        let dependencies = resolve_dns_dependencies(
            &desired.name,
            &desired.config,
            self.web_apps.as_deref(),
            self.lookup.as_ref(),
        )
        .await?;
        let current = self.dns.list_entries(&zone).await?;
        let entries =
            compute_desired_entries(&desired.name, &current, &desired.config, &dependencies, ctx);
        self.apply_records(ctx, &zone, &current, &entries).await
    }

    /// Delete current records that are not desired and add desired records
    /// that are missing, one modification per record.
    async fn apply_records(
        &self,
        ctx: &mut ManageContext,
        zone: &DnsZone,
        current: &[RawDnsEntry],
        desired: &[RawDnsEntry],
    ) -> Result<(), ManageError> {
        let mut sets: BTreeMap<(String, DnsRecordType), Vec<RawDnsEntry>> = BTreeMap::new();
        for entry in desired {
            sets.entry((entry.name.clone(), entry.record_type))
                .or_default()
                .push(entry.clone());
        }
        for ((name, record_type), entries) in &sets {
            validate_record_set(name, *record_type, entries)?;
        }

        let wanted: BTreeSet<&RawDnsEntry> = desired.iter().collect();
        let mut kept: BTreeSet<&RawDnsEntry> = BTreeSet::new();

        for entry in current {
            // Duplicates of a kept record are removed as well
            if wanted.contains(entry) && kept.insert(entry) {
                continue;
            }
            let Some(record_id) = entry.provider_id.as_deref() else {
                warn!(zone = %zone.name, entry = %entry, "Record without id, cannot delete");
                continue;
            };
            self.dns.delete_record(zone, record_id).await?;
            ctx.modified(
                DnsZone::RESOURCE_TYPE,
                &zone.name,
                ModificationAction::Remove,
                entry.to_string(),
            );
        }

        for entry in desired {
            if kept.contains(entry) {
                continue;
            }
            let mut entry = entry.clone();
            entry.provider_id = None;
            self.dns.add_record(zone, &entry).await?;
            ctx.modified(
                DnsZone::RESOURCE_TYPE,
                &zone.name,
                ModificationAction::Add,
                entry.to_string(),
            );
        }
        debug!(zone = %zone.name, "Records applied");
        Ok(())
    }
}

#[cfg(test)]
#[path = "digitalocean_tests.rs"]
mod digitalocean_tests;
