// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure web app (App Service site).
//!
//! Besides its own settings, a web app owns two nested collections that are
//! reconciled element by element: custom hostnames and Azure Files mounts.

use super::{immutable_field, CloudProvider, Difference, ManagedResource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

fn default_true() -> bool {
    true
}

/// Azure Files share mounted into the web app file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAppMountStorage {
    /// Mount identifier, unique per web app
    pub name: String,
    pub storage_account: String,
    pub share_name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    /// Name of the App Service plan hosting the app
    pub app_service_plan: String,
    /// Runtime stack for Linux plans (e.g. `DOCKER|nginx:latest`, `NODE|18-lts`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_fx_version: Option<String>,
    #[serde(default)]
    pub always_on: bool,
    #[serde(default = "default_true")]
    pub https_only: bool,
    #[serde(default)]
    pub app_settings: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_hostnames: Vec<String>,
    #[serde(default)]
    pub mount_storages: Vec<WebAppMountStorage>,
    /// Live-only: `<name>.azurewebsites.net`
    #[serde(skip)]
    pub default_hostname: Option<String>,
    /// Live-only: value expected in `asuid.<hostname>` TXT records
    #[serde(skip)]
    pub verification_id: Option<String>,
}

/// In-place change of a web app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebAppUpdate {
    LinuxFxVersion(String),
    AlwaysOn(bool),
    HttpsOnly(bool),
    AppSettings(BTreeMap<String, String>),
}

impl fmt::Display for WebAppUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinuxFxVersion(version) => write!(f, "linuxFxVersion: {version}"),
            Self::AlwaysOn(enabled) => write!(f, "alwaysOn: {enabled}"),
            Self::HttpsOnly(enabled) => write!(f, "httpsOnly: {enabled}"),
            // Values may be secrets; only keys are logged
            Self::AppSettings(settings) => {
                let keys: Vec<&str> = settings.keys().map(String::as_str).collect();
                write!(f, "appSettings: [{}]", keys.join(", "))
            }
        }
    }
}

impl WebApp {
    /// Builds a desired web app with default settings.
    pub fn new(name: impl Into<String>, app_service_plan: impl Into<String>) -> Self {
        Self {
            id: None,
            provider: None,
            name: name.into(),
            resource_group: None,
            region_id: None,
            app_service_plan: app_service_plan.into(),
            linux_fx_version: None,
            always_on: false,
            https_only: true,
            app_settings: BTreeMap::new(),
            custom_hostnames: Vec::new(),
            mount_storages: Vec::new(),
            default_hostname: None,
            verification_id: None,
        }
    }

    /// Compares the site settings; hostnames and mounts go through the list comparator.
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<WebAppUpdate>> {
        let mut diffs = Vec::new();
        immutable_field(
            &mut diffs,
            "resourceGroup",
            self.resource_group.as_deref(),
            current.resource_group.as_deref(),
        );
        immutable_field(
            &mut diffs,
            "regionId",
            self.region_id.as_deref(),
            current.region_id.as_deref(),
        );
        immutable_field(
            &mut diffs,
            "appServicePlan",
            Some(&self.app_service_plan),
            Some(&current.app_service_plan),
        );
        if let Some(version) = &self.linux_fx_version {
            if current.linux_fx_version.as_deref() != Some(version.as_str()) {
                diffs.push(Difference::Deferred(WebAppUpdate::LinuxFxVersion(
                    version.clone(),
                )));
            }
        }
        if self.always_on != current.always_on {
            diffs.push(Difference::Deferred(WebAppUpdate::AlwaysOn(self.always_on)));
        }
        if self.https_only != current.https_only {
            diffs.push(Difference::Deferred(WebAppUpdate::HttpsOnly(self.https_only)));
        }
        if self.app_settings != current.app_settings {
            diffs.push(Difference::Deferred(WebAppUpdate::AppSettings(
                self.app_settings.clone(),
            )));
        }
        diffs
    }
}

impl ManagedResource for WebApp {
    const RESOURCE_TYPE: &'static str = "WebApp";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
        self.default_hostname = None;
        self.verification_id = None;
    }
}
