// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider.
//!
//! Implements every capability trait over process-local state. It behaves like
//! a well-mannered cloud: names are case-insensitive, created resources get ids,
//! DNS names resolve from the zones it hosts, and a freshly created web app can
//! be configured to hide its hostname and verification id for a number of
//! lookups, mimicking eventual consistency.
//!
//! Every mutating call is appended to an operation log ([`InMemoryProvider::operations`]).

use super::{
    AppServicePlanProvider, DnsRecordProvider, DnsZoneProvider, KeyVaultProvider,
    MariadbProvider, PublicIpSource, ResourceGroupProvider, SecretStore, StorageAccountProvider,
    WebAppProvider,
};
use crate::dns::lookup::DnsLookup;
use crate::dns::{absolute_name, DnsRecordType, RawDnsEntry};
use crate::errors::{ProviderError, ProviderResult};
use crate::resources::{
    ApplicationServicePlan, CloudProvider, DnsZone, FileShare, KeyVault, Lookup, Mariadb,
    MariadbUpdate, PlanUpdate, ResourceGroup, StorageAccount, StorageAccountUpdate, WebApp,
    WebAppMountStorage, WebAppUpdate,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Default public IP returned by [`PublicIpSource::get_public_ip`].
const DEFAULT_PUBLIC_IP: &str = "203.0.113.10";

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn scoped_key(resource_group: &str, name: &str) -> String {
    format!("{}/{}", resource_group.to_ascii_lowercase(), name.to_ascii_lowercase())
}

fn missing_resource_group(kind: &str, name: &str) -> ProviderError {
    ProviderError::Rejected(format!("{kind} {name} has no resource group"))
}

struct StoredWebApp {
    app: WebApp,
    /// Lookups left during which live-only fields stay hidden
    hidden_lookups: u32,
}

struct StoredZone {
    zone: DnsZone,
    records: Vec<RawDnsEntry>,
}

#[derive(Default)]
struct State {
    id_counter: u64,
    resource_groups: BTreeMap<String, ResourceGroup>,
    key_vaults: BTreeMap<String, KeyVault>,
    plans: BTreeMap<String, ApplicationServicePlan>,
    mariadbs: BTreeMap<String, (Mariadb, String)>,
    storage_accounts: BTreeMap<String, StorageAccount>,
    web_apps: BTreeMap<String, StoredWebApp>,
    certificates: BTreeMap<String, (Vec<u8>, String)>,
    zones: BTreeMap<String, StoredZone>,
    hosts: BTreeMap<String, Vec<String>>,
    failing_hostnames: BTreeSet<String>,
    operations: Vec<String>,
}

impl State {
    fn next_id(&mut self, kind: &str, name: &str) -> String {
        self.id_counter += 1;
        format!("/memory/{kind}/{name}/{}", self.id_counter)
    }

    fn record(&mut self, operation: String) {
        debug!(operation = %operation, "In-memory provider call");
        self.operations.push(operation);
    }

    fn zone_mut(&mut self, zone: &DnsZone) -> ProviderResult<&mut StoredZone> {
        self.zones
            .get_mut(&key(&zone.name))
            .ok_or_else(|| ProviderError::Rejected(format!("DNS zone {} does not exist", zone.name)))
    }
}

/// Secrets held in memory, keyed `namespace|name`.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_key(namespace: &str, name: &str) -> String {
        format!("{namespace}|{name}")
    }

    /// Snapshot of every stored secret, keyed `namespace|name`.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_text(&self, namespace: &str, name: &str) -> ProviderResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(&Self::entry_key(namespace, name))
            .cloned())
    }

    async fn set_text_or_fail(&self, namespace: &str, name: &str, value: &str) -> ProviderResult<()> {
        self.entries
            .lock()
            .await
            .insert(Self::entry_key(namespace, name), value.to_string());
        Ok(())
    }
}

/// Provider backed by process memory.
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    state: Arc<Mutex<State>>,
    /// One secret store per key vault, created on first use
    vaults: Arc<std::sync::Mutex<BTreeMap<String, InMemorySecretStore>>>,
    web_app_visibility_delay: u32,
    public_ip: Option<String>,
}

impl InMemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide the default hostname and verification id of newly created web
    /// apps for the next `lookups` calls to [`WebAppProvider::find_web_app`].
    #[must_use]
    pub fn with_web_app_visibility_delay(mut self, lookups: u32) -> Self {
        self.web_app_visibility_delay = lookups;
        self
    }

    #[must_use]
    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = Some(ip.into());
        self
    }

    /// Make `hostname` resolve to `addresses` (outside any hosted zone).
    pub async fn add_host(&self, hostname: &str, addresses: &[&str]) {
        self.state.lock().await.hosts.insert(
            key(hostname),
            addresses.iter().map(|a| (*a).to_string()).collect(),
        );
    }

    /// Make binding `hostname` to any web app fail.
    pub async fn fail_hostname_binding(&self, hostname: &str) {
        self.state
            .lock()
            .await
            .failing_hostnames
            .insert(key(hostname));
    }

    /// Mutating calls made so far, in order.
    pub async fn operations(&self) -> Vec<String> {
        self.state.lock().await.operations.clone()
    }

    /// Forget the operation log.
    pub async fn clear_operations(&self) {
        self.state.lock().await.operations.clear();
    }

    /// Certificate pushed for `hostname`, with its password.
    pub async fn pushed_certificate(&self, hostname: &str) -> Option<(Vec<u8>, String)> {
        self.state
            .lock()
            .await
            .certificates
            .get(&key(hostname))
            .cloned()
    }

    /// Admin password a MariaDB server was created with.
    pub async fn mariadb_admin_password(&self, resource_group: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .mariadbs
            .get(&scoped_key(resource_group, name))
            .map(|(_, password)| password.clone())
    }

    /// Secret store of the key vault named `vault`.
    #[must_use]
    pub fn vault_secrets(&self, vault: &str) -> InMemorySecretStore {
        let mut vaults = self
            .vaults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        vaults.entry(key(vault)).or_default().clone()
    }
}

#[async_trait]
impl ResourceGroupProvider for InMemoryProvider {
    async fn find_resource_group(&self, name: &str) -> ProviderResult<Lookup<ResourceGroup>> {
        let state = self.state.lock().await;
        Ok(state.resource_groups.get(&key(name)).cloned().into())
    }

    async fn create_resource_group(&self, desired: &ResourceGroup) -> ProviderResult<ResourceGroup> {
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("resourceGroups", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        state
            .resource_groups
            .insert(key(&desired.name), created.clone());
        state.record(format!("create resource group {}", desired.name));
        Ok(created)
    }
}

#[async_trait]
impl KeyVaultProvider for InMemoryProvider {
    async fn find_key_vault(&self, resource_group: &str, name: &str) -> ProviderResult<Lookup<KeyVault>> {
        let state = self.state.lock().await;
        Ok(state
            .key_vaults
            .get(&scoped_key(resource_group, name))
            .cloned()
            .into())
    }

    async fn create_key_vault(&self, desired: &KeyVault) -> ProviderResult<KeyVault> {
        let resource_group = desired
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("KeyVault", &desired.name))?;
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("vaults", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        state
            .key_vaults
            .insert(scoped_key(resource_group, &desired.name), created.clone());
        state.record(format!("create key vault {}", desired.name));
        Ok(created)
    }

    fn secret_store(&self, vault: &KeyVault) -> Arc<dyn SecretStore> {
        Arc::new(self.vault_secrets(&vault.name))
    }
}

#[async_trait]
impl AppServicePlanProvider for InMemoryProvider {
    async fn find_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<ApplicationServicePlan>> {
        let state = self.state.lock().await;
        Ok(state.plans.get(&scoped_key(resource_group, name)).cloned().into())
    }

    async fn create_app_service_plan(
        &self,
        desired: &ApplicationServicePlan,
    ) -> ProviderResult<ApplicationServicePlan> {
        let resource_group = desired
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("ApplicationServicePlan", &desired.name))?;
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("serverfarms", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        state
            .plans
            .insert(scoped_key(resource_group, &desired.name), created.clone());
        state.record(format!("create app service plan {}", desired.name));
        Ok(created)
    }

    async fn update_app_service_plan(
        &self,
        plan: &ApplicationServicePlan,
        updates: &[PlanUpdate],
    ) -> ProviderResult<()> {
        let resource_group = plan
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("ApplicationServicePlan", &plan.name))?;
        let mut state = self.state.lock().await;
        let stored = state
            .plans
            .get_mut(&scoped_key(resource_group, &plan.name))
            .ok_or_else(|| ProviderError::Rejected(format!("Plan {} does not exist", plan.name)))?;
        for update in updates {
            match update {
                PlanUpdate::PricingTier(tier) => stored.pricing_tier.clone_from(tier),
                PlanUpdate::Capacity(capacity) => stored.capacity = *capacity,
            }
        }
        state.record(format!("update app service plan {}", plan.name));
        Ok(())
    }
}

#[async_trait]
impl MariadbProvider for InMemoryProvider {
    async fn find_mariadb(&self, resource_group: &str, name: &str) -> ProviderResult<Lookup<Mariadb>> {
        let state = self.state.lock().await;
        Ok(state
            .mariadbs
            .get(&scoped_key(resource_group, name))
            .map(|(server, _)| server.clone())
            .into())
    }

    async fn create_mariadb(&self, desired: &Mariadb, admin_password: &str) -> ProviderResult<Mariadb> {
        let resource_group = desired
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("Mariadb", &desired.name))?;
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("servers", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        created.key_vault = None;
        created.databases = Vec::new();
        state.mariadbs.insert(
            scoped_key(resource_group, &desired.name),
            (created.clone(), admin_password.to_string()),
        );
        state.record(format!("create mariadb {}", desired.name));
        Ok(created)
    }

    async fn update_mariadb(&self, server: &Mariadb, updates: &[MariadbUpdate]) -> ProviderResult<()> {
        let resource_group = server
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("Mariadb", &server.name))?;
        let mut state = self.state.lock().await;
        let (stored, _) = state
            .mariadbs
            .get_mut(&scoped_key(resource_group, &server.name))
            .ok_or_else(|| ProviderError::Rejected(format!("Server {} does not exist", server.name)))?;
        for update in updates {
            match update {
                MariadbUpdate::Sku(sku) => stored.sku_name.clone_from(sku),
                MariadbUpdate::StorageMb(mb) => stored.storage_mb = *mb,
            }
        }
        state.record(format!("update mariadb {}", server.name));
        Ok(())
    }

    async fn create_database(&self, server: &Mariadb, database: &str) -> ProviderResult<()> {
        let resource_group = server
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("Mariadb", &server.name))?;
        let mut state = self.state.lock().await;
        let (stored, _) = state
            .mariadbs
            .get_mut(&scoped_key(resource_group, &server.name))
            .ok_or_else(|| ProviderError::Rejected(format!("Server {} does not exist", server.name)))?;
        stored.databases.push(database.to_string());
        stored.databases.sort();
        state.record(format!("create database {}/{database}", server.name));
        Ok(())
    }
}

#[async_trait]
impl StorageAccountProvider for InMemoryProvider {
    async fn find_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<StorageAccount>> {
        let state = self.state.lock().await;
        Ok(state
            .storage_accounts
            .get(&scoped_key(resource_group, name))
            .cloned()
            .into())
    }

    async fn create_storage_account(&self, desired: &StorageAccount) -> ProviderResult<StorageAccount> {
        let resource_group = desired
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("StorageAccount", &desired.name))?;
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("storageAccounts", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        created.file_shares = Vec::new();
        state
            .storage_accounts
            .insert(scoped_key(resource_group, &desired.name), created.clone());
        state.record(format!("create storage account {}", desired.name));
        Ok(created)
    }

    async fn update_storage_account(
        &self,
        account: &StorageAccount,
        updates: &[StorageAccountUpdate],
    ) -> ProviderResult<()> {
        let stored = self.stored_account(account).await?;
        let mut state = self.state.lock().await;
        if let Some(stored) = state.storage_accounts.get_mut(&stored) {
            for update in updates {
                match update {
                    StorageAccountUpdate::Sku(sku) => stored.sku.clone_from(sku),
                    StorageAccountUpdate::HttpsOnly(enabled) => stored.https_only = *enabled,
                }
            }
        }
        state.record(format!("update storage account {}", account.name));
        Ok(())
    }

    async fn put_file_share(&self, account: &StorageAccount, share: &FileShare) -> ProviderResult<()> {
        let stored = self.stored_account(account).await?;
        let mut state = self.state.lock().await;
        if let Some(stored) = state.storage_accounts.get_mut(&stored) {
            stored.file_shares.retain(|s| s.name != share.name);
            stored.file_shares.push(share.clone());
            stored.file_shares.sort_by(|a, b| a.name.cmp(&b.name));
        }
        state.record(format!("put file share {}/{}", account.name, share.name));
        Ok(())
    }

    async fn delete_file_share(&self, account: &StorageAccount, share_name: &str) -> ProviderResult<()> {
        let stored = self.stored_account(account).await?;
        let mut state = self.state.lock().await;
        if let Some(stored) = state.storage_accounts.get_mut(&stored) {
            stored.file_shares.retain(|s| s.name != share_name);
        }
        state.record(format!("delete file share {}/{share_name}", account.name));
        Ok(())
    }
}

impl InMemoryProvider {
    async fn stored_account(&self, account: &StorageAccount) -> ProviderResult<String> {
        let resource_group = account
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("StorageAccount", &account.name))?;
        let stored = scoped_key(resource_group, &account.name);
        if self.state.lock().await.storage_accounts.contains_key(&stored) {
            Ok(stored)
        } else {
            Err(ProviderError::Rejected(format!(
                "Storage account {} does not exist",
                account.name
            )))
        }
    }

    async fn with_web_app<R: Send>(
        &self,
        web_app: &WebApp,
        operation: String,
        f: impl FnOnce(&mut WebApp) -> ProviderResult<R> + Send,
    ) -> ProviderResult<R> {
        let resource_group = web_app
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("WebApp", &web_app.name))?;
        let mut state = self.state.lock().await;
        let stored = state
            .web_apps
            .get_mut(&scoped_key(resource_group, &web_app.name))
            .ok_or_else(|| ProviderError::Rejected(format!("Web app {} does not exist", web_app.name)))?;
        let result = f(&mut stored.app)?;
        state.record(operation);
        Ok(result)
    }
}

#[async_trait]
impl WebAppProvider for InMemoryProvider {
    async fn find_web_app(&self, resource_group: &str, name: &str) -> ProviderResult<Lookup<WebApp>> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.web_apps.get_mut(&scoped_key(resource_group, name)) else {
            return Ok(Lookup::NotFound);
        };
        let mut app = stored.app.clone();
        if stored.hidden_lookups > 0 {
            stored.hidden_lookups -= 1;
            app.default_hostname = None;
            app.verification_id = None;
        }
        Ok(Lookup::Found(app))
    }

    async fn create_web_app(&self, desired: &WebApp) -> ProviderResult<WebApp> {
        let resource_group = desired
            .resource_group
            .as_deref()
            .ok_or_else(|| missing_resource_group("WebApp", &desired.name))?;
        let mut state = self.state.lock().await;
        let plan_key = scoped_key(resource_group, &desired.app_service_plan);
        if !state.plans.contains_key(&plan_key) {
            return Err(ProviderError::Rejected(format!(
                "App service plan {} does not exist",
                desired.app_service_plan
            )));
        }
        let mut created = desired.clone();
        let id = state.next_id("sites", &desired.name);
        created.verification_id = Some(format!("{:016X}", state.id_counter));
        created.id = Some(id);
        created.provider = Some(CloudProvider::InMemory);
        created.default_hostname = Some(format!("{}.azurewebsites.net", desired.name.to_ascii_lowercase()));
        created.custom_hostnames = Vec::new();
        created.mount_storages = Vec::new();
        state.web_apps.insert(
            scoped_key(resource_group, &desired.name),
            StoredWebApp {
                app: created.clone(),
                hidden_lookups: self.web_app_visibility_delay,
            },
        );
        state.record(format!("create web app {}", desired.name));
        if self.web_app_visibility_delay > 0 {
            created.default_hostname = None;
            created.verification_id = None;
        }
        Ok(created)
    }

    async fn update_web_app(&self, web_app: &WebApp, updates: &[WebAppUpdate]) -> ProviderResult<()> {
        let updates = updates.to_vec();
        self.with_web_app(web_app, format!("update web app {}", web_app.name), move |stored| {
            for update in updates {
                match update {
                    WebAppUpdate::LinuxFxVersion(version) => stored.linux_fx_version = Some(version),
                    WebAppUpdate::AlwaysOn(enabled) => stored.always_on = enabled,
                    WebAppUpdate::HttpsOnly(enabled) => stored.https_only = enabled,
                    WebAppUpdate::AppSettings(settings) => stored.app_settings = settings,
                }
            }
            Ok(())
        })
        .await
    }

    async fn add_custom_hostname(&self, web_app: &WebApp, hostname: &str) -> ProviderResult<()> {
        if self
            .state
            .lock()
            .await
            .failing_hostnames
            .contains(&key(hostname))
        {
            return Err(ProviderError::Rejected(format!(
                "Hostname {hostname} could not be verified"
            )));
        }
        let hostname = hostname.to_string();
        self.with_web_app(
            web_app,
            format!("add hostname {}/{hostname}", web_app.name),
            move |stored| {
                if !stored.custom_hostnames.contains(&hostname) {
                    stored.custom_hostnames.push(hostname);
                    stored.custom_hostnames.sort();
                }
                Ok(())
            },
        )
        .await
    }

    async fn remove_custom_hostname(&self, web_app: &WebApp, hostname: &str) -> ProviderResult<()> {
        let hostname = hostname.to_string();
        self.with_web_app(
            web_app,
            format!("remove hostname {}/{hostname}", web_app.name),
            move |stored| {
                stored.custom_hostnames.retain(|h| *h != hostname);
                Ok(())
            },
        )
        .await
    }

    async fn set_mount_storages(&self, web_app: &WebApp, mounts: &[WebAppMountStorage]) -> ProviderResult<()> {
        let mounts = mounts.to_vec();
        self.with_web_app(
            web_app,
            format!("set mounts {}", web_app.name),
            move |stored| {
                stored.mount_storages = mounts;
                Ok(())
            },
        )
        .await
    }

    async fn push_certificate(
        &self,
        web_app: &WebApp,
        hostname: &str,
        pfx: &[u8],
        password: &str,
    ) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state
            .certificates
            .insert(key(hostname), (pfx.to_vec(), password.to_string()));
        state.record(format!("push certificate {}/{hostname}", web_app.name));
        Ok(())
    }
}

#[async_trait]
impl DnsZoneProvider for InMemoryProvider {
    async fn find_dns_zone(&self, _resource_group: Option<&str>, name: &str) -> ProviderResult<Lookup<DnsZone>> {
        let state = self.state.lock().await;
        Ok(state.zones.get(&key(name)).map(|z| z.zone.clone()).into())
    }

    async fn create_dns_zone(&self, desired: &DnsZone) -> ProviderResult<DnsZone> {
        let mut state = self.state.lock().await;
        let mut created = desired.clone();
        created.id = Some(state.next_id("dnszones", &desired.name));
        created.provider = Some(CloudProvider::InMemory);
        created.config = crate::dns::reconciler::DnsConfig::default();
        state.zones.insert(
            key(&desired.name),
            StoredZone {
                zone: created.clone(),
                records: Vec::new(),
            },
        );
        state.record(format!("create dns zone {}", desired.name));
        Ok(created)
    }

    async fn list_entries(&self, zone: &DnsZone) -> ProviderResult<Vec<RawDnsEntry>> {
        let mut state = self.state.lock().await;
        let mut entries = state.zone_mut(zone)?.records.clone();
        entries.sort();
        Ok(entries)
    }

    async fn delete_record_set(
        &self,
        zone: &DnsZone,
        relative_name: &str,
        record_type: DnsRecordType,
    ) -> ProviderResult<()> {
        let name = absolute_name(&zone.name, relative_name);
        let mut state = self.state.lock().await;
        state
            .zone_mut(zone)?
            .records
            .retain(|r| !(r.name.eq_ignore_ascii_case(&name) && r.record_type == record_type));
        state.record(format!("delete record set {name} {record_type}"));
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
        let mut state = self.state.lock().await;
        let mut created = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut record = entry.clone();
            record.name.clone_from(&name);
            record.ttl = ttl;
            record.provider_id = Some(state.next_id("records", &name));
            created.push(record);
        }
        state.zone_mut(zone)?.records.extend(created);
        state.record(format!("create record set {name} {record_type} ({} values)", entries.len()));
        Ok(())
    }
}

#[async_trait]
impl DnsRecordProvider for InMemoryProvider {
    async fn add_record(&self, zone: &DnsZone, entry: &RawDnsEntry) -> ProviderResult<RawDnsEntry> {
        let mut state = self.state.lock().await;
        let mut record = entry.clone();
        record.provider_id = Some(state.next_id("records", &entry.name));
        state.zone_mut(zone)?.records.push(record.clone());
        state.record(format!("add record {entry}"));
        Ok(record)
    }

    async fn delete_record(&self, zone: &DnsZone, record_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().await;
        state
            .zone_mut(zone)?
            .records
            .retain(|r| r.provider_id.as_deref() != Some(record_id));
        state.record(format!("delete record {record_id}"));
        Ok(())
    }
}

#[async_trait]
impl DnsLookup for InMemoryProvider {
    async fn lookup_a(&self, name: &str) -> ProviderResult<Vec<String>> {
        let state = self.state.lock().await;
        if let Some(addresses) = state.hosts.get(&key(name)) {
            return Ok(addresses.clone());
        }
        Ok(state
            .zones
            .values()
            .flat_map(|z| z.records.iter())
            .filter(|r| r.record_type == DnsRecordType::A && r.name.eq_ignore_ascii_case(name))
            .map(|r| r.details.clone())
            .collect())
    }

    async fn lookup_txt(&self, name: &str) -> ProviderResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .zones
            .values()
            .flat_map(|z| z.records.iter())
            .filter(|r| r.record_type == DnsRecordType::TXT && r.name.eq_ignore_ascii_case(name))
            .map(|r| r.details.clone())
            .collect())
    }
}

#[async_trait]
impl PublicIpSource for InMemoryProvider {
    async fn get_public_ip(&self) -> ProviderResult<String> {
        Ok(self
            .public_ip
            .clone()
            .unwrap_or_else(|| DEFAULT_PUBLIC_IP.to_string()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
