// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Key Vault.

use super::{immutable_field, CloudProvider, Difference, ManagedResource, NoUpdate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVault {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

impl KeyVault {
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<NoUpdate>> {
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
        diffs
    }
}

impl ManagedResource for KeyVault {
    const RESOURCE_TYPE: &'static str = "KeyVault";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
