// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Renders live state back into a configuration document.
//!
//! Only resources named in the input document are read. Provider ids and
//! tags are stripped so the output can be fed back to `manage`. DNS zones are
//! exported as `startEmpty` with a single `OVERWRITE` layer holding every
//! live entry.

use super::azure::with_defaults;
use crate::config::{AzureConfiguration, DigitalOceanConfiguration, ManageConfiguration};
use crate::dns::reconciler::{ConflictResolution, DnsConfig, DnsEntryConfig};
use crate::errors::ManageError;
use crate::providers::{AzureProviders, DnsZoneProvider};
use crate::resources::{
    ApplicationServicePlan, DnsZone, KeyVault, Lookup, ManagedResource, Mariadb, StorageAccount,
    WebApp,
};
use tracing::{info, warn};

fn live<R: ManagedResource>(lookup: Lookup<R>, name: &str) -> Option<R> {
    match lookup {
        Lookup::Found(mut resource) => {
            resource.strip_provider_fields();
            Some(resource)
        }
        Lookup::NotFound => {
            warn!(resource_type = R::RESOURCE_TYPE, name = %name, "Not found, skipped from export");
            None
        }
    }
}

/// Read `desired` from `provider` as a zone holding exactly its live entries.
///
/// # Errors
///
/// Returns [`ManageError::Provider`] when the zone or its entries cannot be read.
pub async fn export_dns_zone(
    provider: &dyn DnsZoneProvider,
    desired: &DnsZone,
) -> Result<Option<DnsZone>, ManageError> {
    let lookup = provider
        .find_dns_zone(desired.resource_group.as_deref(), &desired.name)
        .await?;
    let Some(mut zone) = live(lookup, &desired.name) else {
        return Ok(None);
    };
    let raw_dns_entries = provider
        .list_entries(&zone)
        .await?
        .into_iter()
        .map(|mut entry| {
            entry.provider_id = None;
            entry
        })
        .collect();
    zone.config = DnsConfig {
        start_empty: true,
        start_with_domains: None,
        configs: vec![DnsEntryConfig {
            conflict_resolution: ConflictResolution::Overwrite,
            raw_dns_entries,
            ..DnsEntryConfig::default()
        }],
    };
    Ok(Some(zone))
}

/// Export the Azure resources named in `config`.
///
/// # Errors
///
/// Returns [`ManageError::MissingDefault`] when a resource group cannot be
/// inherited and [`ManageError::Provider`] when a read fails.
pub async fn export_azure(
    providers: &AzureProviders,
    config: &AzureConfiguration,
) -> Result<AzureConfiguration, ManageError> {
    let config = with_defaults(config);
    let mut exported = AzureConfiguration::default();

    let group_of = |resource_type: &str, name: &str, group: Option<&String>| {
        group.cloned().ok_or_else(|| ManageError::MissingDefault {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            field: "resourceGroup".to_string(),
        })
    };

    for desired in &config.resource_groups {
        let lookup = providers.resource_groups.find_resource_group(&desired.name).await?;
        exported.resource_groups.extend(live(lookup, &desired.name));
    }
    for desired in &config.key_vaults {
        let group = group_of(
            KeyVault::RESOURCE_TYPE,
            &desired.name,
            desired.resource_group.as_ref(),
        )?;
        let lookup = providers.key_vaults.find_key_vault(&group, &desired.name).await?;
        exported.key_vaults.extend(live(lookup, &desired.name));
    }
    for desired in &config.application_service_plans {
        let group = group_of(
            ApplicationServicePlan::RESOURCE_TYPE,
            &desired.name,
            desired.resource_group.as_ref(),
        )?;
        let lookup = providers
            .app_service_plans
            .find_app_service_plan(&group, &desired.name)
            .await?;
        exported.application_service_plans.extend(live(lookup, &desired.name));
    }
    for desired in &config.mariadbs {
        let group = group_of(
            Mariadb::RESOURCE_TYPE,
            &desired.name,
            desired.resource_group.as_ref(),
        )?;
        let lookup = providers.mariadbs.find_mariadb(&group, &desired.name).await?;
        if let Some(mut server) = live(lookup, &desired.name) {
            // Not readable from the server
            server.key_vault.clone_from(&desired.key_vault);
            exported.mariadbs.push(server);
        }
    }
    for desired in &config.dns_zones {
        if let Some(zone) = export_dns_zone(providers.dns.as_ref(), desired).await? {
            exported.dns_zones.push(zone);
        }
    }
    for desired in &config.storage_accounts {
        let group = group_of(
            StorageAccount::RESOURCE_TYPE,
            &desired.name,
            desired.resource_group.as_ref(),
        )?;
        let lookup = providers
            .storage_accounts
            .find_storage_account(&group, &desired.name)
            .await?;
        exported.storage_accounts.extend(live(lookup, &desired.name));
    }
    for desired in &config.web_apps {
        let group = group_of(
            WebApp::RESOURCE_TYPE,
            &desired.name,
            desired.resource_group.as_ref(),
        )?;
        let lookup = providers.web_apps.find_web_app(&group, &desired.name).await?;
        exported.web_apps.extend(live(lookup, &desired.name));
    }
    Ok(exported)
}

/// Export every resource named in `config`.
///
/// Sections without a provider are left out of the result.
///
/// # Errors
///
/// See [`export_azure`] and [`export_dns_zone`].
pub async fn export_configuration(
    config: &ManageConfiguration,
    azure: Option<&AzureProviders>,
    digital_ocean: Option<&dyn DnsZoneProvider>,
) -> Result<ManageConfiguration, ManageError> {
    let mut exported = ManageConfiguration::default();

    if let Some(desired) = &config.azure {
        match azure {
            Some(providers) => exported.azure = Some(export_azure(providers, desired).await?),
            None => warn!("No Azure credentials, Azure section skipped from export"),
        }
    }

    if let Some(desired) = &config.digital_ocean {
        match digital_ocean {
            Some(provider) => {
                let mut domains = Vec::new();
                for domain in &desired.domains {
                    let mut unscoped = domain.clone();
                    unscoped.resource_group = None;
                    domains.extend(export_dns_zone(provider, &unscoped).await?);
                }
                exported.digital_ocean = Some(DigitalOceanConfiguration { domains });
            }
            None => warn!("No DigitalOcean token, DigitalOcean section skipped from export"),
        }
    }

    info!("Export complete");
    Ok(exported)
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod export_tests;
