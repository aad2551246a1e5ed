// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of the Azure part of a configuration.
//!
//! Every resource kind follows the same steps:
//!
//! 1. Inherit the resource group and region of the single configured
//!    resource group when omitted
//! 2. Look the resource up by name
//! 3. Absent: create it and record an `ADD`
//! 4. Present: compare; a blocking difference aborts the run, deferred
//!    differences are applied and recorded as `UPDATE`
//! 5. Nested collections (file shares, custom hostnames, mounts, databases)
//!    are compared element by element
//!
//! Kinds are processed in a fixed order so that DNS entries computed from web
//! apps get the best chance to resolve without a deferral.

use super::{apply_record_sets, resolve_dns_dependencies};
use crate::config::AzureConfiguration;
use crate::context::{DeferralKind, ManageContext, ModificationAction};
use crate::dns::lookup::DnsLookup;
use crate::dns::reconciler::compute_desired_entries;
use crate::errors::ManageError;
use crate::providers::AzureProviders;
use crate::resources::{
    compare_lists, deferred_updates, ApplicationServicePlan, DnsZone, KeyVault, ListChange,
    Lookup, ManagedResource, Mariadb, ResourceGroup, StorageAccount, WebApp,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{info, warn};

/// Secret namespace holding generated MariaDB admin passwords.
pub const MARIADB_SECRET_NAMESPACE: &str = "mariadb";

/// Length of the random part of a generated MariaDB admin password.
const MARIADB_PASSWORD_LEN: usize = 24;

/// Secret name of the admin password of `server`.
#[must_use]
pub fn mariadb_password_secret(server: &str) -> String {
    format!("{server}-admin-password")
}

/// Random password meeting the Azure complexity rules (upper, lower, digit, symbol).
fn generate_password() -> String {
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(MARIADB_PASSWORD_LEN)
        .map(char::from)
        .collect();
    format!("{random}aA1!")
}

/// Fill in omitted resource groups, regions and key vaults.
///
/// A resource without a resource group inherits the single configured one.
/// A resource without a region inherits the region of its resource group
/// when that group is part of the configuration. A MariaDB server without a
/// key vault uses the single configured key vault. Anything that cannot be
/// inherited stays unset and fails when it is needed.
#[must_use]
pub fn with_defaults(config: &AzureConfiguration) -> AzureConfiguration {
    let mut resolved = config.clone();
    let default_group = config.default_resource_group().map(|g| g.name.clone());
    let region_of = |group: Option<&String>| -> Option<String> {
        let group = group?;
        config
            .resource_groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(group))
            .map(|g| g.region_id.clone())
    };

    macro_rules! inherit {
        ($items:expr) => {
            for item in &mut $items {
                if item.resource_group.is_none() {
                    item.resource_group.clone_from(&default_group);
                }
                if item.region_id.is_none() {
                    item.region_id = region_of(item.resource_group.as_ref());
                }
            }
        };
    }
    inherit!(resolved.key_vaults);
    inherit!(resolved.application_service_plans);
    inherit!(resolved.mariadbs);
    inherit!(resolved.storage_accounts);
    inherit!(resolved.web_apps);

    for zone in &mut resolved.dns_zones {
        if zone.resource_group.is_none() {
            zone.resource_group.clone_from(&default_group);
        }
        let group = zone.resource_group.clone();
        zone.config.apply_default_resource_group(group.as_deref());
    }

    if let [only] = config.key_vaults.as_slice() {
        for server in &mut resolved.mariadbs {
            if server.key_vault.is_none() {
                server.key_vault = Some(only.name.clone());
            }
        }
    }
    resolved
}

fn require_group<R: ManagedResource>(
    resource: &R,
    resource_group: Option<&str>,
) -> Result<String, ManageError> {
    resource_group
        .map(str::to_string)
        .ok_or_else(|| ManageError::MissingDefault {
            resource_type: R::RESOURCE_TYPE.to_string(),
            name: resource.name().to_string(),
            field: "resourceGroup".to_string(),
        })
}

fn require_region<R: ManagedResource>(
    resource: &R,
    region: Option<&str>,
) -> Result<(), ManageError> {
    region.map(|_| ()).ok_or_else(|| ManageError::MissingDefault {
        resource_type: R::RESOURCE_TYPE.to_string(),
        name: resource.name().to_string(),
        field: "regionId".to_string(),
    })
}

fn record_updates<U: Display>(ctx: &mut ManageContext, resource_type: &str, name: &str, updates: &[U]) {
    for update in updates {
        ctx.modified(resource_type, name, ModificationAction::Update, update.to_string());
    }
}

/// Applies the Azure part of a configuration through [`AzureProviders`].
#[derive(Clone)]
pub struct AzureManageService {
    providers: AzureProviders,
    lookup: Arc<dyn DnsLookup>,
}

impl AzureManageService {
    pub fn new(providers: AzureProviders, lookup: Arc<dyn DnsLookup>) -> Self {
        Self { providers, lookup }
    }

    /// Run one pass over every Azure resource of `config`.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error: a divergence, a missing
    /// default, an invalid DNS record set or a provider failure.
    pub async fn manage(
        &self,
        ctx: &mut ManageContext,
        config: &AzureConfiguration,
    ) -> Result<(), ManageError> {
        let config = with_defaults(config);

        for group in &config.resource_groups {
            self.manage_resource_group(ctx, group).await?;
        }
        for vault in &config.key_vaults {
            self.manage_key_vault(ctx, vault).await?;
        }
        for plan in &config.application_service_plans {
            self.manage_app_service_plan(ctx, plan).await?;
        }
        for server in &config.mariadbs {
            self.manage_mariadb(ctx, server).await?;
        }
        for zone in &config.dns_zones {
            self.manage_dns_zone(ctx, zone).await?;
        }
        for account in &config.storage_accounts {
            self.manage_storage_account(ctx, account).await?;
        }
        for web_app in &config.web_apps {
            self.manage_web_app(ctx, web_app).await?;
        }
        Ok(())
    }

    pub async fn manage_resource_group(
        &self,
        ctx: &mut ManageContext,
        desired: &ResourceGroup,
    ) -> Result<(), ManageError> {
        let provider = &self.providers.resource_groups;
        match provider.find_resource_group(&desired.name).await? {
            Lookup::NotFound => {
                provider.create_resource_group(desired).await?;
                ctx.modified(
                    ResourceGroup::RESOURCE_TYPE,
                    &desired.name,
                    ModificationAction::Add,
                    format!("in {}", desired.region_id),
                );
            }
            Lookup::Found(current) => {
                deferred_updates(
                    ResourceGroup::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
            }
        }
        Ok(())
    }

    pub async fn manage_key_vault(
        &self,
        ctx: &mut ManageContext,
        desired: &KeyVault,
    ) -> Result<(), ManageError> {
        let group = require_group(desired, desired.resource_group.as_deref())?;
        let provider = &self.providers.key_vaults;
        match provider.find_key_vault(&group, &desired.name).await? {
            Lookup::NotFound => {
                require_region(desired, desired.region_id.as_deref())?;
                provider.create_key_vault(desired).await?;
                ctx.modified(KeyVault::RESOURCE_TYPE, &desired.name, ModificationAction::Add, "");
            }
            Lookup::Found(current) => {
                deferred_updates(
                    KeyVault::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
            }
        }
        Ok(())
    }

    pub async fn manage_app_service_plan(
        &self,
        ctx: &mut ManageContext,
        desired: &ApplicationServicePlan,
    ) -> Result<(), ManageError> {
        let group = require_group(desired, desired.resource_group.as_deref())?;
        let provider = &self.providers.app_service_plans;
        match provider.find_app_service_plan(&group, &desired.name).await? {
            Lookup::NotFound => {
                require_region(desired, desired.region_id.as_deref())?;
                provider.create_app_service_plan(desired).await?;
                ctx.modified(
                    ApplicationServicePlan::RESOURCE_TYPE,
                    &desired.name,
                    ModificationAction::Add,
                    format!("{} {} x{}", desired.os, desired.pricing_tier, desired.capacity),
                );
            }
            Lookup::Found(current) => {
                let updates = deferred_updates(
                    ApplicationServicePlan::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
                if !updates.is_empty() {
                    provider.update_app_service_plan(&current, &updates).await?;
                    record_updates(ctx, ApplicationServicePlan::RESOURCE_TYPE, &desired.name, &updates);
                }
            }
        }
        Ok(())
    }

    pub async fn manage_mariadb(
        &self,
        ctx: &mut ManageContext,
        desired: &Mariadb,
    ) -> Result<(), ManageError> {
        let group = require_group(desired, desired.resource_group.as_deref())?;
        let provider = &self.providers.mariadbs;
        let current = match provider.find_mariadb(&group, &desired.name).await? {
            Lookup::NotFound => {
                require_region(desired, desired.region_id.as_deref())?;
                let password = generate_password();
                self.store_mariadb_password(desired, &group, &password).await?;
                let created = provider.create_mariadb(desired, &password).await?;
                ctx.modified(
                    Mariadb::RESOURCE_TYPE,
                    &desired.name,
                    ModificationAction::Add,
                    format!("version {} {}", desired.version, desired.sku_name),
                );
                created
            }
            Lookup::Found(current) => {
                let updates = deferred_updates(
                    Mariadb::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
                if !updates.is_empty() {
                    provider.update_mariadb(&current, &updates).await?;
                    record_updates(ctx, Mariadb::RESOURCE_TYPE, &desired.name, &updates);
                }
                current
            }
        };

        for database in desired.missing_databases(&current) {
            provider.create_database(&current, &database).await?;
            ctx.modified(
                Mariadb::RESOURCE_TYPE,
                &desired.name,
                ModificationAction::Add,
                format!("database {database}"),
            );
        }
        Ok(())
    }

    async fn store_mariadb_password(
        &self,
        server: &Mariadb,
        group: &str,
        password: &str,
    ) -> Result<(), ManageError> {
        let missing_vault = || ManageError::MissingReference {
            resource_type: Mariadb::RESOURCE_TYPE.to_string(),
            name: server.name.clone(),
            reference: format!("keyVault {}", server.key_vault.as_deref().unwrap_or("<unset>")),
        };
        let vault_name = server.key_vault.as_deref().ok_or_else(missing_vault)?;
        let vault = self
            .providers
            .key_vaults
            .find_key_vault(group, vault_name)
            .await?
            .into_option()
            .ok_or_else(missing_vault)?;
        self.providers
            .key_vaults
            .secret_store(&vault)
            .set_text_or_fail(
                MARIADB_SECRET_NAMESPACE,
                &mariadb_password_secret(&server.name),
                password,
            )
            .await?;
        info!(server = %server.name, vault = %vault.name, "Stored MariaDB admin password");
        Ok(())
    }

    pub async fn manage_dns_zone(
        &self,
        ctx: &mut ManageContext,
        desired: &DnsZone,
    ) -> Result<(), ManageError> {
        let provider = &self.providers.dns;
        let zone = match provider
            .find_dns_zone(desired.resource_group.as_deref(), &desired.name)
            .await?
        {
            Lookup::NotFound => {
                require_group(desired, desired.resource_group.as_deref())?;
                let created = provider.create_dns_zone(desired).await?;
                ctx.modified(DnsZone::RESOURCE_TYPE, &desired.name, ModificationAction::Add, "");
                created
            }
            Lookup::Found(current) => {
                deferred_updates(
                    DnsZone::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
                current
            }
        };

        let dependencies = resolve_dns_dependencies(
            &desired.name,
            &desired.config,
            Some(self.providers.web_apps.as_ref()),
            self.lookup.as_ref(),
        )
        .await?;
        let current = provider.list_entries(&zone).await?;
        let entries =
            compute_desired_entries(&desired.name, &current, &desired.config, &dependencies, ctx);
        apply_record_sets(ctx, provider.as_ref(), &zone, &current, &entries).await
    }

    pub async fn manage_storage_account(
        &self,
        ctx: &mut ManageContext,
        desired: &StorageAccount,
    ) -> Result<(), ManageError> {
        let group = require_group(desired, desired.resource_group.as_deref())?;
        let provider = &self.providers.storage_accounts;
        let current = match provider.find_storage_account(&group, &desired.name).await? {
            Lookup::NotFound => {
                require_region(desired, desired.region_id.as_deref())?;
                let created = provider.create_storage_account(desired).await?;
                ctx.modified(
                    StorageAccount::RESOURCE_TYPE,
                    &desired.name,
                    ModificationAction::Add,
                    format!("{} {}", desired.kind, desired.sku),
                );
                created
            }
            Lookup::Found(current) => {
                let updates = deferred_updates(
                    StorageAccount::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
                if !updates.is_empty() {
                    provider.update_storage_account(&current, &updates).await?;
                    record_updates(ctx, StorageAccount::RESOURCE_TYPE, &desired.name, &updates);
                }
                current
            }
        };

        for change in compare_lists(&current.file_shares, &desired.file_shares, |s| s.name.clone()) {
            match change {
                ListChange::Added(share) => {
                    provider.put_file_share(&current, share).await?;
                    ctx.modified(
                        StorageAccount::RESOURCE_TYPE,
                        &desired.name,
                        ModificationAction::Add,
                        format!("file share {}", share.name),
                    );
                }
                ListChange::Removed(share) => {
                    provider.delete_file_share(&current, &share.name).await?;
                    ctx.modified(
                        StorageAccount::RESOURCE_TYPE,
                        &desired.name,
                        ModificationAction::Remove,
                        format!("file share {}", share.name),
                    );
                }
                ListChange::Changed { desired: share, .. } => {
                    provider.put_file_share(&current, share).await?;
                    ctx.modified(
                        StorageAccount::RESOURCE_TYPE,
                        &desired.name,
                        ModificationAction::Update,
                        format!("file share {} quota {:?}", share.name, share.quota_gb),
                    );
                }
            }
        }
        Ok(())
    }

    pub async fn manage_web_app(
        &self,
        ctx: &mut ManageContext,
        desired: &WebApp,
    ) -> Result<(), ManageError> {
        let group = require_group(desired, desired.resource_group.as_deref())?;
        let provider = &self.providers.web_apps;
        let current = match provider.find_web_app(&group, &desired.name).await? {
            Lookup::NotFound => {
                require_region(desired, desired.region_id.as_deref())?;
                let created = provider.create_web_app(desired).await?;
                ctx.modified(
                    WebApp::RESOURCE_TYPE,
                    &desired.name,
                    ModificationAction::Add,
                    format!("on plan {}", desired.app_service_plan),
                );
                created
            }
            Lookup::Found(current) => {
                let updates = deferred_updates(
                    WebApp::RESOURCE_TYPE,
                    &desired.name,
                    desired.differences(&current),
                )?;
                if !updates.is_empty() {
                    provider.update_web_app(&current, &updates).await?;
                    record_updates(ctx, WebApp::RESOURCE_TYPE, &desired.name, &updates);
                }
                current
            }
        };

        self.manage_custom_hostnames(ctx, &current, desired).await?;

        let mount_changes = compare_lists(&current.mount_storages, &desired.mount_storages, |m| {
            m.name.clone()
        });
        if !mount_changes.is_empty() {
            provider
                .set_mount_storages(&current, &desired.mount_storages)
                .await?;
            for change in mount_changes {
                let (action, mount) = match change {
                    ListChange::Added(m) => (ModificationAction::Add, m),
                    ListChange::Removed(m) => (ModificationAction::Remove, m),
                    ListChange::Changed { desired: m, .. } => (ModificationAction::Update, m),
                };
                ctx.modified(
                    WebApp::RESOURCE_TYPE,
                    &desired.name,
                    action,
                    format!(
                        "mount {} {}/{} at {}",
                        mount.name, mount.storage_account, mount.share_name, mount.mount_path
                    ),
                );
            }
        }
        Ok(())
    }

    /// Bind and unbind custom hostnames.
    ///
    /// Binding needs the DNS verification records to be visible, which may
    /// only happen on a later pass, so a failed binding is deferred instead of
    /// aborting the run.
    async fn manage_custom_hostnames(
        &self,
        ctx: &mut ManageContext,
        current: &WebApp,
        desired: &WebApp,
    ) -> Result<(), ManageError> {
        let provider = &self.providers.web_apps;
        let current_hostnames: Vec<String> = current
            .custom_hostnames
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        let desired_hostnames: Vec<String> = desired
            .custom_hostnames
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();

        for change in compare_lists(&current_hostnames, &desired_hostnames, String::clone) {
            match change {
                ListChange::Added(hostname) => {
                    match provider.add_custom_hostname(current, hostname).await {
                        Ok(()) => ctx.modified(
                            WebApp::RESOURCE_TYPE,
                            &desired.name,
                            ModificationAction::Add,
                            format!("hostname {hostname}"),
                        ),
                        Err(e) => {
                            warn!(
                                web_app = %desired.name,
                                hostname = %hostname,
                                error = %e,
                                "Custom hostname could not be bound yet"
                            );
                            ctx.needs_next_stage(
                                DeferralKind::HostnameBinding,
                                format!("{}/{hostname}", desired.name),
                            );
                        }
                    }
                }
                ListChange::Removed(hostname) => {
                    provider.remove_custom_hostname(current, hostname).await?;
                    ctx.modified(
                        WebApp::RESOURCE_TYPE,
                        &desired.name,
                        ModificationAction::Remove,
                        format!("hostname {hostname}"),
                    );
                }
                // Hostnames are their own key
                ListChange::Changed { .. } => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod azure_tests;
