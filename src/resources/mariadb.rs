// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Database for MariaDB server.

use super::{immutable_field, CloudProvider, Difference, ManagedResource};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_storage_mb() -> u32 {
    5120
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mariadb {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    /// Server version (e.g. `10.3`)
    pub version: String,
    /// SKU name (e.g. `B_Gen5_1`)
    pub sku_name: String,
    #[serde(default = "default_storage_mb")]
    pub storage_mb: u32,
    pub admin_user: String,
    /// Key vault receiving the generated admin password on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_vault: Option<String>,
    /// Databases that must exist on the server (never removed)
    #[serde(default)]
    pub databases: Vec<String>,
}

/// In-place change of a MariaDB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MariadbUpdate {
    Sku(String),
    StorageMb(u32),
}

impl fmt::Display for MariadbUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sku(sku) => write!(f, "skuName: {sku}"),
            Self::StorageMb(mb) => write!(f, "storageMb: {mb}"),
        }
    }
}

impl Mariadb {
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<MariadbUpdate>> {
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
            "version",
            Some(&self.version),
            Some(&current.version),
        );
        immutable_field(
            &mut diffs,
            "adminUser",
            Some(&self.admin_user),
            Some(&current.admin_user),
        );
        if !self.sku_name.eq_ignore_ascii_case(&current.sku_name) {
            diffs.push(Difference::Deferred(MariadbUpdate::Sku(self.sku_name.clone())));
        }
        if self.storage_mb != current.storage_mb {
            diffs.push(Difference::Deferred(MariadbUpdate::StorageMb(self.storage_mb)));
        }
        diffs
    }

    /// Databases configured but missing on the server.
    #[must_use]
    pub fn missing_databases(&self, current: &Self) -> Vec<String> {
        self.databases
            .iter()
            .filter(|db| !current.databases.contains(db))
            .cloned()
            .collect()
    }
}

impl ManagedResource for Mariadb {
    const RESOURCE_TYPE: &'static str = "Mariadb";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
