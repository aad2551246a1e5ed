// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource groups, key vaults, App Service plans, MariaDB servers and
//! storage accounts on Azure Resource Manager.
//!
//! ARM creations are asynchronous on the Azure side: after a PUT the resource
//! is read back, and when it is not visible yet the desired value is returned.

use super::key_vault::AzureSecretStore;
use super::{resource_path, AzureClient, AzureSession};
use crate::constants::{
    API_VERSION_KEY_VAULT, API_VERSION_MARIADB, API_VERSION_RESOURCES, API_VERSION_STORAGE,
    API_VERSION_WEB,
};
use crate::errors::{ProviderError, ProviderResult};
use crate::providers::{
    AppServicePlanProvider, KeyVaultProvider, MariadbProvider, ResourceGroupProvider,
    SecretStore, StorageAccountProvider,
};
use crate::resources::{
    ApplicationServicePlan, CloudProvider, FileShare, KeyVault, Lookup, Mariadb, MariadbUpdate,
    PlanOs, PlanUpdate, ResourceGroup, StorageAccount, StorageAccountUpdate,
};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Databases every MariaDB server carries and that are never managed.
const MARIADB_SYSTEM_DATABASES: [&str; 4] =
    ["information_schema", "mysql", "performance_schema", "sys"];

/// Envelope shared by every ARM resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArmResource<P> {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub sku: Option<ArmSku>,
    pub properties: Option<P>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ArmSku {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl<P: Default> ArmResource<P> {
    pub(crate) fn properties_or_default(&mut self) -> P {
        self.properties.take().unwrap_or_default()
    }

    pub(crate) fn sku_name(&self) -> String {
        self.sku.as_ref().map(|s| s.name.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanProperties {
    #[serde(default)]
    reserved: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MariadbProperties {
    #[serde(default)]
    version: String,
    #[serde(default)]
    administrator_login: String,
    #[serde(default)]
    storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageProfile {
    #[serde(rename = "storageMB", default)]
    storage_mb: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageProperties {
    #[serde(default)]
    supports_https_traffic_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareProperties {
    #[serde(default)]
    share_quota: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StorageKeys {
    #[serde(default)]
    keys: Vec<StorageKey>,
}

#[derive(Debug, Deserialize)]
struct StorageKey {
    value: String,
}

fn group_path(name: &str) -> String {
    format!("/resourceGroups/{name}")
}

fn vault_path(resource_group: &str, name: &str) -> String {
    resource_path(resource_group, "Microsoft.KeyVault/vaults", name)
}

fn plan_path(resource_group: &str, name: &str) -> String {
    resource_path(resource_group, "Microsoft.Web/serverfarms", name)
}

fn mariadb_path(resource_group: &str, name: &str) -> String {
    resource_path(resource_group, "Microsoft.DBforMariaDB/servers", name)
}

fn storage_path(resource_group: &str, name: &str) -> String {
    resource_path(resource_group, "Microsoft.Storage/storageAccounts", name)
}

/// Resource group of a desired resource; defaults are resolved before any provider call.
pub(crate) fn required_group<'a>(
    resource_type: &str,
    name: &str,
    resource_group: Option<&'a str>,
) -> ProviderResult<&'a str> {
    resource_group.ok_or_else(|| {
        ProviderError::Rejected(format!("{resource_type} ({name}) has no resource group"))
    })
}

pub(crate) fn required_region<'a>(
    resource_type: &str,
    name: &str,
    region: Option<&'a str>,
) -> ProviderResult<&'a str> {
    region.ok_or_else(|| {
        ProviderError::Rejected(format!("{resource_type} ({name}) has no region"))
    })
}

async fn get_resource<P: DeserializeOwned>(
    session: &AzureSession,
    path: &str,
    api_version: &str,
) -> ProviderResult<Lookup<ArmResource<P>>> {
    session.arm_get(path, api_version).await
}

fn to_plan(resource_group: &str, mut resource: ArmResource<PlanProperties>) -> ApplicationServicePlan {
    let properties = resource.properties_or_default();
    let is_linux = properties.reserved
        || resource
            .kind
            .as_deref()
            .is_some_and(|k| k.to_ascii_lowercase().contains("linux"));
    ApplicationServicePlan {
        id: Some(resource.id.clone()),
        provider: Some(CloudProvider::Azure),
        name: resource.name.clone(),
        resource_group: Some(resource_group.to_string()),
        region_id: resource.location.clone(),
        os: if is_linux { PlanOs::Linux } else { PlanOs::Windows },
        pricing_tier: resource.sku_name(),
        capacity: resource.sku.as_ref().and_then(|s| s.capacity).unwrap_or(1),
    }
}

fn to_mariadb(
    resource_group: &str,
    mut resource: ArmResource<MariadbProperties>,
    databases: Vec<String>,
) -> Mariadb {
    let properties = resource.properties_or_default();
    Mariadb {
        id: Some(resource.id.clone()),
        provider: Some(CloudProvider::Azure),
        name: resource.name.clone(),
        resource_group: Some(resource_group.to_string()),
        region_id: resource.location.clone(),
        version: properties.version,
        sku_name: resource.sku_name(),
        storage_mb: properties.storage_profile.map_or(0, |p| p.storage_mb),
        admin_user: properties.administrator_login,
        key_vault: None,
        databases,
    }
}

fn to_storage_account(
    resource_group: &str,
    mut resource: ArmResource<StorageProperties>,
    file_shares: Vec<FileShare>,
) -> StorageAccount {
    let properties = resource.properties_or_default();
    StorageAccount {
        id: Some(resource.id.clone()),
        provider: Some(CloudProvider::Azure),
        name: resource.name.clone(),
        resource_group: Some(resource_group.to_string()),
        region_id: resource.location.clone(),
        kind: resource.kind.clone().unwrap_or_default(),
        sku: resource.sku_name(),
        https_only: properties.supports_https_traffic_only,
        file_shares,
    }
}

/// First access key of a storage account.
pub(crate) async fn list_storage_key(
    session: &AzureSession,
    resource_group: &str,
    account: &str,
) -> ProviderResult<String> {
    let path = format!("{}/listKeys", storage_path(resource_group, account));
    let keys: StorageKeys = session
        .arm_send(Method::POST, &path, API_VERSION_STORAGE, None)
        .await?;
    keys.keys
        .into_iter()
        .next()
        .map(|k| k.value)
        .ok_or_else(|| ProviderError::InvalidResponse {
            url: session.arm_url(&path, API_VERSION_STORAGE),
            reason: format!("storage account {account} returned no keys"),
        })
}

#[async_trait]
impl ResourceGroupProvider for AzureClient {
    async fn find_resource_group(&self, name: &str) -> ProviderResult<Lookup<ResourceGroup>> {
        let found: Lookup<ArmResource<Value>> =
            get_resource(self.session(), &group_path(name), API_VERSION_RESOURCES).await?;
        Ok(found.map(|r| ResourceGroup {
            id: Some(r.id),
            provider: Some(CloudProvider::Azure),
            name: r.name,
            region_id: r.location.unwrap_or_default(),
        }))
    }

    async fn create_resource_group(&self, desired: &ResourceGroup) -> ProviderResult<ResourceGroup> {
        let body = json!({ "location": desired.region_id });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &group_path(&desired.name),
                API_VERSION_RESOURCES,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, region = %desired.region_id, "Created Azure resource group");
        Ok(self
            .find_resource_group(&desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone()))
    }
}

#[async_trait]
impl KeyVaultProvider for AzureClient {
    async fn find_key_vault(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<KeyVault>> {
        let found: Lookup<ArmResource<Value>> = get_resource(
            self.session(),
            &vault_path(resource_group, name),
            API_VERSION_KEY_VAULT,
        )
        .await?;
        Ok(found.map(|r| KeyVault {
            id: Some(r.id),
            provider: Some(CloudProvider::Azure),
            name: r.name,
            resource_group: Some(resource_group.to_string()),
            region_id: r.location,
        }))
    }

    async fn create_key_vault(&self, desired: &KeyVault) -> ProviderResult<KeyVault> {
        let resource_group =
            required_group("KeyVault", &desired.name, desired.resource_group.as_deref())?;
        let region = required_region("KeyVault", &desired.name, desired.region_id.as_deref())?;
        let body = json!({
            "location": region,
            "properties": {
                "tenantId": self.session().tenant_id(),
                "sku": { "family": "A", "name": "standard" },
                "enableRbacAuthorization": true,
                "accessPolicies": []
            }
        });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &vault_path(resource_group, &desired.name),
                API_VERSION_KEY_VAULT,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, resource_group = %resource_group, "Created Azure key vault");
        Ok(self
            .find_key_vault(resource_group, &desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone()))
    }

    fn secret_store(&self, vault: &KeyVault) -> Arc<dyn SecretStore> {
        Arc::new(AzureSecretStore::new(self.session.clone(), &vault.name))
    }
}

#[async_trait]
impl AppServicePlanProvider for AzureClient {
    async fn find_app_service_plan(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<ApplicationServicePlan>> {
        let found: Lookup<ArmResource<PlanProperties>> = get_resource(
            self.session(),
            &plan_path(resource_group, name),
            API_VERSION_WEB,
        )
        .await?;
        Ok(found.map(|r| to_plan(resource_group, r)))
    }

    async fn create_app_service_plan(
        &self,
        desired: &ApplicationServicePlan,
    ) -> ProviderResult<ApplicationServicePlan> {
        let resource_group = required_group(
            "ApplicationServicePlan",
            &desired.name,
            desired.resource_group.as_deref(),
        )?;
        let region = required_region(
            "ApplicationServicePlan",
            &desired.name,
            desired.region_id.as_deref(),
        )?;
        let linux = desired.os == PlanOs::Linux;
        let body = json!({
            "location": region,
            "kind": if linux { "linux" } else { "app" },
            "sku": { "name": desired.pricing_tier, "capacity": desired.capacity },
            "properties": { "reserved": linux }
        });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &plan_path(resource_group, &desired.name),
                API_VERSION_WEB,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, tier = %desired.pricing_tier, "Created App Service plan");
        Ok(self
            .find_app_service_plan(resource_group, &desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone()))
    }

    async fn update_app_service_plan(
        &self,
        plan: &ApplicationServicePlan,
        updates: &[PlanUpdate],
    ) -> ProviderResult<()> {
        let resource_group = required_group(
            "ApplicationServicePlan",
            &plan.name,
            plan.resource_group.as_deref(),
        )?;
        let mut tier = plan.pricing_tier.clone();
        let mut capacity = plan.capacity;
        for update in updates {
            match update {
                PlanUpdate::PricingTier(t) => tier.clone_from(t),
                PlanUpdate::Capacity(c) => capacity = *c,
            }
        }
        let body = json!({ "sku": { "name": tier, "capacity": capacity } });
        let _: Value = self
            .session()
            .arm_send(
                Method::PATCH,
                &plan_path(resource_group, &plan.name),
                API_VERSION_WEB,
                Some(&body),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MariadbProvider for AzureClient {
    async fn find_mariadb(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<Mariadb>> {
        let path = mariadb_path(resource_group, name);
        let found: Lookup<ArmResource<MariadbProperties>> =
            get_resource(self.session(), &path, API_VERSION_MARIADB).await?;
        let Lookup::Found(resource) = found else {
            return Ok(Lookup::NotFound);
        };

        let databases: Vec<ArmResource<Value>> = self
            .session()
            .arm_list(&format!("{path}/databases"), API_VERSION_MARIADB)
            .await?;
        let mut names: Vec<String> = databases
            .into_iter()
            .map(|db| db.name)
            .filter(|db| !MARIADB_SYSTEM_DATABASES.contains(&db.as_str()))
            .collect();
        names.sort();
        Ok(Lookup::Found(to_mariadb(resource_group, resource, names)))
    }

    async fn create_mariadb(&self, desired: &Mariadb, admin_password: &str) -> ProviderResult<Mariadb> {
        let resource_group =
            required_group("Mariadb", &desired.name, desired.resource_group.as_deref())?;
        let region = required_region("Mariadb", &desired.name, desired.region_id.as_deref())?;
        let body = json!({
            "location": region,
            "sku": { "name": desired.sku_name },
            "properties": {
                "createMode": "Default",
                "version": desired.version,
                "administratorLogin": desired.admin_user,
                "administratorLoginPassword": admin_password,
                "storageProfile": { "storageMB": desired.storage_mb }
            }
        });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &mariadb_path(resource_group, &desired.name),
                API_VERSION_MARIADB,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, version = %desired.version, "Created MariaDB server");
        Ok(self
            .find_mariadb(resource_group, &desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone()))
    }

    async fn update_mariadb(&self, server: &Mariadb, updates: &[MariadbUpdate]) -> ProviderResult<()> {
        let resource_group =
            required_group("Mariadb", &server.name, server.resource_group.as_deref())?;
        let mut body = json!({});
        for update in updates {
            match update {
                MariadbUpdate::Sku(sku) => body["sku"] = json!({ "name": sku }),
                MariadbUpdate::StorageMb(mb) => {
                    body["properties"] = json!({ "storageProfile": { "storageMB": mb } });
                }
            }
        }
        let _: Value = self
            .session()
            .arm_send(
                Method::PATCH,
                &mariadb_path(resource_group, &server.name),
                API_VERSION_MARIADB,
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn create_database(&self, server: &Mariadb, database: &str) -> ProviderResult<()> {
        let resource_group =
            required_group("Mariadb", &server.name, server.resource_group.as_deref())?;
        let path = format!("{}/databases/{database}", mariadb_path(resource_group, &server.name));
        let body = json!({ "properties": { "charset": "utf8", "collation": "utf8_general_ci" } });
        let _: Value = self
            .session()
            .arm_send(Method::PUT, &path, API_VERSION_MARIADB, Some(&body))
            .await?;
        info!(server = %server.name, database = %database, "Created MariaDB database");
        Ok(())
    }
}

#[async_trait]
impl StorageAccountProvider for AzureClient {
    async fn find_storage_account(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Lookup<StorageAccount>> {
        let path = storage_path(resource_group, name);
        let found: Lookup<ArmResource<StorageProperties>> =
            get_resource(self.session(), &path, API_VERSION_STORAGE).await?;
        let Lookup::Found(resource) = found else {
            return Ok(Lookup::NotFound);
        };

        let shares: Vec<ArmResource<ShareProperties>> = self
            .session()
            .arm_list(
                &format!("{path}/fileServices/default/shares"),
                API_VERSION_STORAGE,
            )
            .await?;
        let file_shares = shares
            .into_iter()
            .map(|mut share| FileShare {
                quota_gb: share.properties_or_default().share_quota,
                name: share.name,
            })
            .collect();
        Ok(Lookup::Found(to_storage_account(
            resource_group,
            resource,
            file_shares,
        )))
    }

    async fn create_storage_account(&self, desired: &StorageAccount) -> ProviderResult<StorageAccount> {
        let resource_group =
            required_group("StorageAccount", &desired.name, desired.resource_group.as_deref())?;
        let region = required_region("StorageAccount", &desired.name, desired.region_id.as_deref())?;
        let body = json!({
            "location": region,
            "kind": desired.kind,
            "sku": { "name": desired.sku },
            "properties": { "supportsHttpsTrafficOnly": desired.https_only }
        });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &storage_path(resource_group, &desired.name),
                API_VERSION_STORAGE,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, sku = %desired.sku, "Created storage account");
        let mut created = self
            .find_storage_account(resource_group, &desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone());
        // Shares are reconciled separately
        created.file_shares.clear();
        Ok(created)
    }

    async fn update_storage_account(
        &self,
        account: &StorageAccount,
        updates: &[StorageAccountUpdate],
    ) -> ProviderResult<()> {
        let resource_group =
            required_group("StorageAccount", &account.name, account.resource_group.as_deref())?;
        let mut body = json!({});
        for update in updates {
            match update {
                StorageAccountUpdate::Sku(sku) => body["sku"] = json!({ "name": sku }),
                StorageAccountUpdate::HttpsOnly(enabled) => {
                    body["properties"] = json!({ "supportsHttpsTrafficOnly": enabled });
                }
            }
        }
        let _: Value = self
            .session()
            .arm_send(
                Method::PATCH,
                &storage_path(resource_group, &account.name),
                API_VERSION_STORAGE,
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn put_file_share(&self, account: &StorageAccount, share: &FileShare) -> ProviderResult<()> {
        let resource_group =
            required_group("StorageAccount", &account.name, account.resource_group.as_deref())?;
        let path = format!(
            "{}/fileServices/default/shares/{}",
            storage_path(resource_group, &account.name),
            share.name
        );
        let body = match share.quota_gb {
            Some(quota) => json!({ "properties": { "shareQuota": quota } }),
            None => json!({ "properties": {} }),
        };
        let _: Value = self
            .session()
            .arm_send(Method::PUT, &path, API_VERSION_STORAGE, Some(&body))
            .await?;
        info!(account = %account.name, share = %share.name, "Put file share");
        Ok(())
    }

    async fn delete_file_share(&self, account: &StorageAccount, share_name: &str) -> ProviderResult<()> {
        let resource_group =
            required_group("StorageAccount", &account.name, account.resource_group.as_deref())?;
        let path = format!(
            "{}/fileServices/default/shares/{share_name}",
            storage_path(resource_group, &account.name)
        );
        self.session().arm_delete(&path, API_VERSION_STORAGE).await?;
        info!(account = %account.name, share = %share_name, "Deleted file share");
        Ok(())
    }
}
