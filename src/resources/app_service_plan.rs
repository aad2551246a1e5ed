// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure App Service plan (server farm).

use super::{immutable_field, CloudProvider, Difference, ManagedResource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system of the workers of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanOs {
    Linux,
    Windows,
}

impl fmt::Display for PlanOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Linux => "LINUX",
            Self::Windows => "WINDOWS",
        })
    }
}

fn default_capacity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationServicePlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    pub os: PlanOs,
    /// SKU name (e.g. `B1`, `P1v3`)
    pub pricing_tier: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

/// In-place change of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanUpdate {
    PricingTier(String),
    Capacity(u32),
}

impl fmt::Display for PlanUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PricingTier(tier) => write!(f, "pricingTier: {tier}"),
            Self::Capacity(capacity) => write!(f, "capacity: {capacity}"),
        }
    }
}

impl ApplicationServicePlan {
    #[must_use]
    pub fn differences(&self, current: &Self) -> Vec<Difference<PlanUpdate>> {
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
        if self.os != current.os {
            diffs.push(Difference::Blocking {
                field: "os".to_string(),
                desired: self.os.to_string(),
                current: current.os.to_string(),
            });
        }
        if !self.pricing_tier.eq_ignore_ascii_case(&current.pricing_tier) {
            diffs.push(Difference::Deferred(PlanUpdate::PricingTier(
                self.pricing_tier.clone(),
            )));
        }
        if self.capacity != current.capacity {
            diffs.push(Difference::Deferred(PlanUpdate::Capacity(self.capacity)));
        }
        diffs
    }
}

impl ManagedResource for ApplicationServicePlan {
    const RESOURCE_TYPE: &'static str = "ApplicationServicePlan";

    fn name(&self) -> &str {
        &self.name
    }

    fn strip_provider_fields(&mut self) {
        self.id = None;
        self.provider = None;
    }
}
