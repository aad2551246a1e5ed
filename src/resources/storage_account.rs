// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure storage account and its file shares.

use super::{immutable_field, CloudProvider, Difference, ManagedResource};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_kind() -> String {
    "StorageV2".to_string()
}

fn default_sku() -> String {
    "Standard_LRS".to_string()
}

fn default_true() -> bool {
    true
}

/// Azure Files share inside a storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileShare {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_gb: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_sku")]
    pub sku: String,
    #[serde(default = "default_true")]
    pub https_only: bool,
    #[serde(default)]
    pub file_shares: Vec<FileShare>,
}

/// In-place change of a storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageAccountUpdate {
    Sku(String),
    HttpsOnly(bool),
}

impl fmt::Display for StorageAccountUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sku(sku) => write!(f, "sku: {sku}"),
            Self::HttpsOnly(enabled) => write!(f, "httpsOnly: {enabled}"),
        }
    }
}

impl StorageAccount {
    /// Compares the account itself; file shares go through the list comparator.
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<StorageAccountUpdate>> {
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
        immutable_field(&mut diffs, "kind", Some(&self.kind), Some(&current.kind));
        if !self.sku.eq_ignore_ascii_case(&current.sku) {
            diffs.push(Difference::Deferred(StorageAccountUpdate::Sku(self.sku.clone())));
        }
        if self.https_only != current.https_only {
            diffs.push(Difference::Deferred(StorageAccountUpdate::HttpsOnly(
                self.https_only,
            )));
        }
        diffs
    }
}

impl ManagedResource for StorageAccount {
    const RESOURCE_TYPE: &'static str = "StorageAccount";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
