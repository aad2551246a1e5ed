// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure resource group.

use super::{immutable_field, CloudProvider, Difference, ManagedResource, NoUpdate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    pub region_id: String,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>, region_id: impl Into<String>) -> Self {
        Self {
            id: None,
            provider: None,
            name: name.into(),
            region_id: region_id.into(),
        }
    }

    /// The region is the only property and it cannot be changed.
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<NoUpdate>> {
        let mut diffs = Vec::new();
        immutable_field(
            &mut diffs,
            "regionId",
            Some(&self.region_id),
            Some(&current.region_id),
        );
        diffs
    }
}

impl ManagedResource for ResourceGroup {
    const RESOURCE_TYPE: &'static str = "ResourceGroup";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
