// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! App Service sites: settings, custom hostnames, Azure Files mounts and
//! SNI certificates.
//!
//! A site is spread over several ARM documents (`sites/{name}`, `config/web`,
//! `config/appsettings`, `config/azurestorageaccounts`); [`AzureClient`]
//! stitches them into one [`WebApp`].

use super::resources::{required_group, required_region, ArmResource};
use super::{id_name, resource_path, AzureClient};
use crate::constants::API_VERSION_WEB;
use crate::errors::ProviderResult;
use crate::providers::WebAppProvider;
use crate::resources::{CloudProvider, Lookup, WebApp, WebAppMountStorage, WebAppUpdate};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteProperties {
    #[serde(default)]
    server_farm_id: String,
    #[serde(default)]
    default_host_name: Option<String>,
    #[serde(default)]
    custom_domain_verification_id: Option<String>,
    #[serde(default)]
    https_only: bool,
    #[serde(default)]
    host_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteConfig {
    #[serde(default)]
    linux_fx_version: Option<String>,
    #[serde(default)]
    always_on: bool,
}

#[derive(Debug, Deserialize)]
struct NamedProperties<P> {
    #[serde(default)]
    properties: P,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageMount {
    #[serde(default)]
    account_name: String,
    #[serde(default)]
    share_name: String,
    #[serde(default)]
    mount_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateProperties {
    #[serde(default)]
    thumbprint: String,
}

fn site_path(resource_group: &str, name: &str) -> String {
    resource_path(resource_group, "Microsoft.Web/sites", name)
}

fn certificate_path(resource_group: &str, hostname: &str) -> String {
    resource_path(
        resource_group,
        "Microsoft.Web/certificates",
        &hostname.replace('.', "-"),
    )
}

impl AzureClient {
    fn server_farm_id(&self, resource_group: &str, plan: &str) -> String {
        format!(
            "/subscriptions/{}{}",
            self.session().subscription_id(),
            resource_path(resource_group, "Microsoft.Web/serverfarms", plan)
        )
    }

    async fn site_config(&self, resource_group: &str, name: &str) -> ProviderResult<SiteConfig> {
        let path = format!("{}/config/web", site_path(resource_group, name));
        let config: NamedProperties<SiteConfig> = self
            .session()
            .arm_send(Method::GET, &path, API_VERSION_WEB, None)
            .await?;
        Ok(config.properties)
    }

    async fn app_settings(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<BTreeMap<String, String>> {
        let path = format!("{}/config/appsettings/list", site_path(resource_group, name));
        let settings: NamedProperties<BTreeMap<String, String>> = self
            .session()
            .arm_send(Method::POST, &path, API_VERSION_WEB, None)
            .await?;
        Ok(settings.properties)
    }

    async fn mount_storages(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Vec<WebAppMountStorage>> {
        let path = format!(
            "{}/config/azurestorageaccounts/list",
            site_path(resource_group, name)
        );
        let mounts: NamedProperties<BTreeMap<String, StorageMount>> = self
            .session()
            .arm_send(Method::POST, &path, API_VERSION_WEB, None)
            .await?;
        Ok(mounts
            .properties
            .into_iter()
            .map(|(mount_name, mount)| WebAppMountStorage {
                name: mount_name,
                storage_account: mount.account_name,
                share_name: mount.share_name,
                mount_path: mount.mount_path,
            })
            .collect())
    }

    async fn put_hostname_binding(
        &self,
        resource_group: &str,
        web_app: &str,
        hostname: &str,
        thumbprint: Option<&str>,
    ) -> ProviderResult<()> {
        let path = format!(
            "{}/hostNameBindings/{hostname}",
            site_path(resource_group, web_app)
        );
        let mut properties = json!({ "siteName": web_app, "hostNameType": "Verified" });
        if let Some(thumbprint) = thumbprint {
            properties["sslState"] = json!("SniEnabled");
            properties["thumbprint"] = json!(thumbprint);
        }
        let body = json!({ "properties": properties });
        let _: Value = self
            .session()
            .arm_send(Method::PUT, &path, API_VERSION_WEB, Some(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WebAppProvider for AzureClient {
    async fn find_web_app(&self, resource_group: &str, name: &str) -> ProviderResult<Lookup<WebApp>> {
        let found: Lookup<ArmResource<SiteProperties>> = self
            .session()
            .arm_get(&site_path(resource_group, name), API_VERSION_WEB)
            .await?;
        let Lookup::Found(mut site) = found else {
            return Ok(Lookup::NotFound);
        };
        let properties = site.properties_or_default();
        let config = self.site_config(resource_group, name).await?;
        let app_settings = self.app_settings(resource_group, name).await?;
        let mount_storages = self.mount_storages(resource_group, name).await?;

        let default_hostname = properties.default_host_name.clone();
        let mut custom_hostnames: Vec<String> = properties
            .host_names
            .into_iter()
            .filter(|h| {
                default_hostname
                    .as_deref()
                    .is_none_or(|d| !h.eq_ignore_ascii_case(d))
            })
            .collect();
        custom_hostnames.sort();

        Ok(Lookup::Found(WebApp {
            id: Some(site.id.clone()),
            provider: Some(CloudProvider::Azure),
            name: site.name.clone(),
            resource_group: Some(resource_group.to_string()),
            region_id: site.location.clone(),
            app_service_plan: id_name(&properties.server_farm_id).to_string(),
            linux_fx_version: config.linux_fx_version.filter(|v| !v.is_empty()),
            always_on: config.always_on,
            https_only: properties.https_only,
            app_settings,
            custom_hostnames,
            mount_storages,
            default_hostname,
            verification_id: properties.custom_domain_verification_id,
        }))
    }

    async fn create_web_app(&self, desired: &WebApp) -> ProviderResult<WebApp> {
        let resource_group =
            required_group("WebApp", &desired.name, desired.resource_group.as_deref())?;
        let region = required_region("WebApp", &desired.name, desired.region_id.as_deref())?;
        let app_settings: Vec<Value> = desired
            .app_settings
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        let mut site_config = json!({ "alwaysOn": desired.always_on, "appSettings": app_settings });
        if let Some(version) = &desired.linux_fx_version {
            site_config["linuxFxVersion"] = json!(version);
        }
        let body = json!({
            "location": region,
            "properties": {
                "serverFarmId": self.server_farm_id(resource_group, &desired.app_service_plan),
                "httpsOnly": desired.https_only,
                "siteConfig": site_config
            }
        });
        let _: Value = self
            .session()
            .arm_send(
                Method::PUT,
                &site_path(resource_group, &desired.name),
                API_VERSION_WEB,
                Some(&body),
            )
            .await?;
        info!(name = %desired.name, plan = %desired.app_service_plan, "Created web app");

        let mut created = self
            .find_web_app(resource_group, &desired.name)
            .await?
            .into_option()
            .unwrap_or_else(|| desired.clone());
        // Hostnames and mounts are reconciled element by element afterwards
        created.custom_hostnames.clear();
        created.mount_storages.clear();
        Ok(created)
    }

    async fn update_web_app(&self, web_app: &WebApp, updates: &[WebAppUpdate]) -> ProviderResult<()> {
        let resource_group =
            required_group("WebApp", &web_app.name, web_app.resource_group.as_deref())?;
        let path = site_path(resource_group, &web_app.name);
        let mut config = Map::new();
        for update in updates {
            match update {
                WebAppUpdate::LinuxFxVersion(version) => {
                    config.insert("linuxFxVersion".to_string(), json!(version));
                }
                WebAppUpdate::AlwaysOn(enabled) => {
                    config.insert("alwaysOn".to_string(), json!(enabled));
                }
                WebAppUpdate::HttpsOnly(enabled) => {
                    let body = json!({ "properties": { "httpsOnly": enabled } });
                    let _: Value = self
                        .session()
                        .arm_send(Method::PATCH, &path, API_VERSION_WEB, Some(&body))
                        .await?;
                }
                WebAppUpdate::AppSettings(settings) => {
                    let body = json!({ "properties": settings });
                    let _: Value = self
                        .session()
                        .arm_send(
                            Method::PUT,
                            &format!("{path}/config/appsettings"),
                            API_VERSION_WEB,
                            Some(&body),
                        )
                        .await?;
                }
            }
        }
        if !config.is_empty() {
            let body = json!({ "properties": config });
            let _: Value = self
                .session()
                .arm_send(
                    Method::PATCH,
                    &format!("{path}/config/web"),
                    API_VERSION_WEB,
                    Some(&body),
                )
                .await?;
        }
        Ok(())
    }

    async fn add_custom_hostname(&self, web_app: &WebApp, hostname: &str) -> ProviderResult<()> {
        let resource_group =
            required_group("WebApp", &web_app.name, web_app.resource_group.as_deref())?;
        self.put_hostname_binding(resource_group, &web_app.name, hostname, None)
            .await?;
        info!(web_app = %web_app.name, hostname = %hostname, "Bound custom hostname");
        Ok(())
    }

    async fn remove_custom_hostname(&self, web_app: &WebApp, hostname: &str) -> ProviderResult<()> {
        let resource_group =
            required_group("WebApp", &web_app.name, web_app.resource_group.as_deref())?;
        let path = format!(
            "{}/hostNameBindings/{hostname}",
            site_path(resource_group, &web_app.name)
        );
        self.session().arm_delete(&path, API_VERSION_WEB).await?;
        info!(web_app = %web_app.name, hostname = %hostname, "Removed custom hostname");
        Ok(())
    }

    async fn set_mount_storages(
        &self,
        web_app: &WebApp,
        mounts: &[WebAppMountStorage],
    ) -> ProviderResult<()> {
        let resource_group =
            required_group("WebApp", &web_app.name, web_app.resource_group.as_deref())?;
        let mut properties = Map::new();
        for mount in mounts {
            let access_key = self
                .storage_account_key(resource_group, &mount.storage_account)
                .await?;
            properties.insert(
                mount.name.clone(),
                json!({
                    "type": "AzureFiles",
                    "accountName": mount.storage_account,
                    "shareName": mount.share_name,
                    "mountPath": mount.mount_path,
                    "accessKey": access_key
                }),
            );
        }
        let body = json!({ "properties": properties });
        let path = format!(
            "{}/config/azurestorageaccounts",
            site_path(resource_group, &web_app.name)
        );
        let _: Value = self
            .session()
            .arm_send(Method::PUT, &path, API_VERSION_WEB, Some(&body))
            .await?;
        Ok(())
    }

    async fn push_certificate(
        &self,
        web_app: &WebApp,
        hostname: &str,
        pfx: &[u8],
        password: &str,
    ) -> ProviderResult<()> {
        let resource_group =
            required_group("WebApp", &web_app.name, web_app.resource_group.as_deref())?;
        let region = required_region("WebApp", &web_app.name, web_app.region_id.as_deref())?;
        let body = json!({
            "location": region,
            "properties": {
                "pfxBlob": base64::engine::general_purpose::STANDARD.encode(pfx),
                "password": password,
                "serverFarmId": self.server_farm_id(resource_group, &web_app.app_service_plan)
            }
        });
        let mut certificate: ArmResource<CertificateProperties> = self
            .session()
            .arm_send(
                Method::PUT,
                &certificate_path(resource_group, hostname),
                API_VERSION_WEB,
                Some(&body),
            )
            .await?;
        let thumbprint = certificate.properties_or_default().thumbprint;
        self.put_hostname_binding(resource_group, &web_app.name, hostname, Some(&thumbprint))
            .await?;
        info!(
            web_app = %web_app.name,
            hostname = %hostname,
            thumbprint = %thumbprint,
            "Uploaded certificate and enabled SNI binding"
        );
        Ok(())
    }
}
