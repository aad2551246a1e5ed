// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_same_identifier_normalizes_case_and_spaces() {
        assert!(same_identifier("Canada East", "canadaeast"));
        assert!(same_identifier("RG-One", "rg-one"));
        assert!(!same_identifier("eastus", "eastus2"));
    }

    #[test]
    fn test_lookup_conversions() {
        let found: Lookup<u32> = Some(3).into();
        assert!(matches!(found, Lookup::Found(_)));
        assert_eq!(found.map(|v| v * 2).into_option(), Some(6));

        let missing: Lookup<u32> = None.into();
        assert_eq!(missing, Lookup::NotFound);
    }

    #[test]
    fn test_immutable_field_ignores_unspecified_desired() {
        let mut diffs: Vec<Difference<NoUpdate>> = Vec::new();
        immutable_field(&mut diffs, "regionId", None, Some("eastus"));
        assert!(diffs.is_empty());

        immutable_field(&mut diffs, "regionId", Some("eastus"), Some("East US"));
        assert!(diffs.is_empty());

        immutable_field(&mut diffs, "regionId", Some("eastus"), Some("westus"));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].to_string(), "regionId: desired eastus, current westus");
    }

    #[test]
    fn test_deferred_updates_returns_updates_when_nothing_blocks() {
        let diffs = vec![
            Difference::Deferred(PlanUpdate::Capacity(3)),
            Difference::Deferred(PlanUpdate::PricingTier("S1".to_string())),
        ];
        let updates = deferred_updates("ApplicationServicePlan", "plan1", diffs).unwrap();
        assert_eq!(updates.len(), 2);
    }

    #[test]
    fn test_deferred_updates_fails_on_any_blocking_difference() {
        let diffs = vec![
            Difference::Deferred(PlanUpdate::Capacity(3)),
            Difference::Blocking {
                field: "os".to_string(),
                desired: "LINUX".to_string(),
                current: "WINDOWS".to_string(),
            },
            Difference::Blocking {
                field: "regionId".to_string(),
                desired: "eastus".to_string(),
                current: "westus".to_string(),
            },
        ];
        match deferred_updates("ApplicationServicePlan", "plan1", diffs) {
            Err(ManageError::Divergence {
                resource_type,
                name,
                differences,
            }) => {
                assert_eq!(resource_type, "ApplicationServicePlan");
                assert_eq!(name, "plan1");
                assert_eq!(differences.len(), 2);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }
}
