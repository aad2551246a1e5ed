// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Capability interfaces implemented by every cloud provider.
//!
//! Each concern (resource groups, web apps, DNS zones, secrets, ...) is one
//! trait. A provider implements the traits it supports and is selected once
//! at construction; services only see `Arc<dyn Trait>`.
//!
//! Lookups return [`Lookup::NotFound`] for absent resources. Every other
//! failure is a [`ProviderError`](crate::errors::ProviderError).
//!
//! Implementations:
//! - [`azure`] - Azure Resource Manager and Key Vault REST APIs
//! - [`digitalocean`] - DigitalOcean domains API
//! - [`memory`] - in-process state, used by tests and dry runs
//! - [`public_ip`] - public IP discovery over HTTP

pub mod azure;
pub mod digitalocean;
pub mod http;
pub mod memory;
pub mod public_ip;
pub mod retry;

use crate::dns::{DnsRecordType, RawDnsEntry};
use crate::errors::ProviderResult;
use crate::resources::{
    ApplicationServicePlan, DnsZone, FileShare, KeyVault, Lookup, Mariadb, MariadbUpdate,
    PlanUpdate, ResourceGroup, StorageAccount, StorageAccountUpdate, WebApp, WebAppMountStorage,
    WebAppUpdate,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ResourceGroupProvider: Send + Sync {
    async fn find_resource_group(&self, name: &str) -> ProviderResult<Lookup<ResourceGroup>>;

    async fn create_resource_group(&self, desired: &ResourceGroup)
        -> ProviderResult<ResourceGroup>;
}

#[async_trait]
pub trait KeyVaultProvider: Send + Sync {
    async fn find_key_vault(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<KeyVault>>;

    async fn create_key_vault(&self, desired: &KeyVault) -> ProviderResult<KeyVault>;

    /// Secret store backed by `vault`.
    fn secret_store(&self, vault: &KeyVault) -> Arc<dyn SecretStore>;
}

#[async_trait]
pub trait AppServicePlanProvider: Send + Sync {
    async fn find_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<ApplicationServicePlan>>;

    async fn create_app_service_plan(
        &self,
        desired: &ApplicationServicePlan,
    ) -> ProviderResult<ApplicationServicePlan>;

    async fn update_app_service_plan(
        &self,
        plan: &ApplicationServicePlan,
        updates: &[PlanUpdate],
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait MariadbProvider: Send + Sync {
    /// Current server, with its databases listed.
    async fn find_mariadb(&self, resource_group: &str, name: &str)
        -> ProviderResult<Lookup<Mariadb>>;

    async fn create_mariadb(&self, desired: &Mariadb, admin_password: &str)
        -> ProviderResult<Mariadb>;

    async fn update_mariadb(&self, server: &Mariadb, updates: &[MariadbUpdate])
        -> ProviderResult<()>;

    async fn create_database(&self, server: &Mariadb, database: &str) -> ProviderResult<()>;
}

#[async_trait]
pub trait StorageAccountProvider: Send + Sync {
    /// Current account, with its file shares listed.
    async fn find_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<StorageAccount>>;

    async fn create_storage_account(&self, desired: &StorageAccount)
        -> ProviderResult<StorageAccount>;

    async fn update_storage_account(
        &self,
        account: &StorageAccount,
        updates: &[StorageAccountUpdate],
    ) -> ProviderResult<()>;

    /// Create or resize a file share.
    async fn put_file_share(&self, account: &StorageAccount, share: &FileShare)
        -> ProviderResult<()>;

    async fn delete_file_share(&self, account: &StorageAccount, share_name: &str)
        -> ProviderResult<()>;
}

#[async_trait]
pub trait WebAppProvider: Send + Sync {
    /// Current web app with custom hostnames, mounts, default hostname and
    /// verification id filled in when the provider exposes them.
    async fn find_web_app(&self, resource_group: &str, name: &str)
        -> ProviderResult<Lookup<WebApp>>;

    async fn create_web_app(&self, desired: &WebApp) -> ProviderResult<WebApp>;

    async fn update_web_app(&self, web_app: &WebApp, updates: &[WebAppUpdate])
        -> ProviderResult<()>;

    async fn add_custom_hostname(&self, web_app: &WebApp, hostname: &str) -> ProviderResult<()>;

    async fn remove_custom_hostname(&self, web_app: &WebApp, hostname: &str)
        -> ProviderResult<()>;

    /// Replace the whole set of storage mounts.
    async fn set_mount_storages(
        &self,
        web_app: &WebApp,
        mounts: &[WebAppMountStorage],
    ) -> ProviderResult<()>;

    /// Upload a PKCS#12 bundle and bind it (SNI) to `hostname`.
    async fn push_certificate(
        &self,
        web_app: &WebApp,
        hostname: &str,
        pfx: &[u8],
        password: &str,
    ) -> ProviderResult<()>;
}

/// Record-set level DNS access.
#[async_trait]
pub trait DnsZoneProvider: Send + Sync {
    async fn find_dns_zone(
        &self,
        resource_group: Option<&str>,
        name: &str,
    ) -> ProviderResult<Lookup<DnsZone>>;

    async fn create_dns_zone(&self, desired: &DnsZone) -> ProviderResult<DnsZone>;

    /// Entries of the zone with fully qualified names, excluding SOA and apex NS.
    async fn list_entries(&self, zone: &DnsZone) -> ProviderResult<Vec<RawDnsEntry>>;

    /// Delete a record set; deleting a missing set is not an error.
    async fn delete_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
    ) -> ProviderResult<()>;

    /// Create a record set with one value per entry.
    async fn create_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
        ttl: u32,
        entries: &[RawDnsEntry],
    ) -> ProviderResult<()>;
}

/// Record level DNS access, for providers that address single records by id.
#[async_trait]
pub trait DnsRecordProvider: DnsZoneProvider {
    /// Add one record, returning it with its provider id.
    async fn add_record(&self, zone: &DnsZone, entry: &RawDnsEntry) -> ProviderResult<RawDnsEntry>;

    async fn delete_record(&self, zone: &DnsZone, record_id: &str) -> ProviderResult<()>;
}

/// Opaque text secrets grouped by namespace.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_text(&self, namespace: &str, name: &str) -> ProviderResult<Option<String>>;

    async fn set_text_or_fail(&self, namespace: &str, name: &str, value: &str)
        -> ProviderResult<()>;
}

#[async_trait]
pub trait PublicIpSource: Send + Sync {
    async fn get_public_ip(&self) -> ProviderResult<String>;
}

/// One implementation of every Azure capability, built once at startup.
#[derive(Clone)]
pub struct AzureProviders {
    pub resource_groups: Arc<dyn ResourceGroupProvider>,
    pub key_vaults: Arc<dyn KeyVaultProvider>,
    pub app_service_plans: Arc<dyn AppServicePlanProvider>,
    pub mariadbs: Arc<dyn MariadbProvider>,
    pub storage_accounts: Arc<dyn StorageAccountProvider>,
    pub web_apps: Arc<dyn WebAppProvider>,
    pub dns: Arc<dyn DnsZoneProvider>,
}

impl AzureProviders {
    /// Use one client for every capability.
    pub fn from_client<P>(client: Arc<P>) -> Self
    where
        P: ResourceGroupProvider
            + KeyVaultProvider
            + AppServicePlanProvider
            + MariadbProvider
            + StorageAccountProvider
            + WebAppProvider
            + DnsZoneProvider
            + 'static,
    {
        Self {
            resource_groups: client.clone(),
            key_vaults: client.clone(),
            app_service_plans: client.clone(),
            mariadbs: client.clone(),
            storage_accounts: client.clone(),
            web_apps: client.clone(),
            dns: client,
        }
    }
}
