// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure provider.
//!
//! Talks to Azure Resource Manager (ARM) and the Key Vault data plane over
//! REST. One [`AzureClient`] is built at startup and implements every Azure
//! capability; see [`AzureClient::into_providers`].
//!
//! Submodules:
//! - [`auth`] - client-credentials tokens cached per scope
//! - [`resources`] - resource groups, key vaults, plans, MariaDB, storage
//! - [`web_app`] - sites, hostnames, mounts, certificates
//! - [`dns`] - DNS zones and record sets
//! - [`key_vault`] - secrets

pub mod auth;
pub mod dns;
pub mod key_vault;
pub mod resources;
pub mod web_app;

use self::auth::{AzureCredentials, TokenCache};
use super::http::{parse_json, JsonApi};
use super::AzureProviders;
use crate::constants::{
    AZURE_LOGIN_URL, AZURE_MANAGEMENT_SCOPE, AZURE_MANAGEMENT_URL, STORAGE_KEY_CACHE_SECS,
};
use crate::errors::ProviderResult;
use crate::resources::Lookup;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Base URLs of the Azure services.
#[derive(Debug, Clone)]
pub struct AzureEndpoints {
    pub management_url: String,
    pub login_url: String,
    /// Key Vault data plane base URL; `None` means `https://<vault>.vault.azure.net`
    pub key_vault_url: Option<String>,
}

impl Default for AzureEndpoints {
    fn default() -> Self {
        Self {
            management_url: AZURE_MANAGEMENT_URL.to_string(),
            login_url: AZURE_LOGIN_URL.to_string(),
            key_vault_url: None,
        }
    }
}

/// Authenticated HTTP session shared by the client and its secret stores.
pub struct AzureSession {
    api: JsonApi,
    credentials: AzureCredentials,
    endpoints: AzureEndpoints,
    tokens: TokenCache,
}

impl AzureSession {
    pub fn new(api: JsonApi, credentials: AzureCredentials, endpoints: AzureEndpoints) -> Self {
        let tokens = TokenCache::new(endpoints.login_url.clone());
        Self {
            api,
            credentials,
            endpoints,
            tokens,
        }
    }

    pub(crate) async fn token(&self, scope: &str) -> ProviderResult<String> {
        self.tokens
            .token(self.api.client(), &self.credentials, scope)
            .await
    }

    /// Absolute ARM URL of a subscription-relative path.
    pub(crate) fn arm_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}{path}?api-version={api_version}",
            self.endpoints.management_url.trim_end_matches('/'),
            self.credentials.subscription_id
        )
    }

    pub(crate) async fn arm_get<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> ProviderResult<Lookup<T>> {
        let token = self.token(AZURE_MANAGEMENT_SCOPE).await?;
        self.api
            .get_optional(&self.arm_url(path, api_version), Some(&token))
            .await
    }

    /// Send an ARM request and decode the JSON response (`null` when empty).
    pub(crate) async fn arm_send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> ProviderResult<T> {
        let token = self.token(AZURE_MANAGEMENT_SCOPE).await?;
        let url = self.arm_url(path, api_version);
        let text = self.api.send(method, &url, Some(&token), body).await?;
        parse_json(&url, &text)
    }

    /// DELETE an ARM resource; a missing resource counts as deleted.
    pub(crate) async fn arm_delete(&self, path: &str, api_version: &str) -> ProviderResult<()> {
        match self
            .arm_send::<Value>(Method::DELETE, path, api_version, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Follow `nextLink` pages of an ARM list.
    pub(crate) async fn arm_list<T: DeserializeOwned>(
        &self,
        path: &str,
        api_version: &str,
    ) -> ProviderResult<Vec<T>> {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Page<T> {
            #[serde(default = "Vec::new")]
            value: Vec<T>,
            #[serde(default)]
            next_link: Option<String>,
        }

        let token = self.token(AZURE_MANAGEMENT_SCOPE).await?;
        let mut url = self.arm_url(path, api_version);
        let mut items = Vec::new();
        loop {
            let page: Page<T> = self.api.json(Method::GET, &url, Some(&token), None).await?;
            items.extend(page.value);
            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }
        Ok(items)
    }

    pub(crate) fn subscription_id(&self) -> &str {
        &self.credentials.subscription_id
    }

    pub(crate) fn tenant_id(&self) -> &str {
        &self.credentials.tenant_id
    }

    pub(crate) fn api(&self) -> &JsonApi {
        &self.api
    }

    pub(crate) fn key_vault_url(&self, vault: &str) -> String {
        self.endpoints.key_vault_url.as_ref().map_or_else(
            || format!("https://{vault}.vault.azure.net"),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

/// Path of a resource inside a resource group.
pub(crate) fn resource_path(resource_group: &str, provider_type: &str, name: &str) -> String {
    format!("/resourceGroups/{resource_group}/providers/{provider_type}/{name}")
}

/// Last segment of an ARM id (e.g. the plan name of a `serverFarmId`).
pub(crate) fn id_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Resource group segment of an ARM id.
pub(crate) fn id_resource_group(id: &str) -> Option<&str> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next();
        }
    }
    None
}

/// Azure implementation of every capability.
pub struct AzureClient {
    session: Arc<AzureSession>,
    storage_keys: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl AzureClient {
    pub fn new(session: AzureSession) -> Self {
        Self {
            session: Arc::new(session),
            storage_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Bundle this client as the implementation of every Azure capability.
    #[must_use]
    pub fn into_providers(self) -> AzureProviders {
        AzureProviders::from_client(Arc::new(self))
    }

    pub(crate) fn session(&self) -> &AzureSession {
        &self.session
    }

    /// Primary key of a storage account, cached for an hour.
    pub(crate) async fn storage_account_key(
        &self,
        resource_group: &str,
        account: &str,
    ) -> ProviderResult<String> {
        let cache_key = format!("{}/{}", resource_group.to_ascii_lowercase(), account.to_ascii_lowercase());
        let mut keys = self.storage_keys.lock().await;
        if let Some((key, expires_at)) = keys.get(&cache_key) {
            if *expires_at > Utc::now() {
                return Ok(key.clone());
            }
        }
        let key = resources::list_storage_key(&self.session, resource_group, account).await?;
        keys.insert(
            cache_key,
            (key.clone(), Utc::now() + Duration::seconds(STORAGE_KEY_CACHE_SECS)),
        );
        Ok(key)
    }
}
