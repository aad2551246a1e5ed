// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `manage/azure.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::context::DeferralKind;
    use crate::providers::memory::InMemoryProvider;
    use crate::providers::{AppServicePlanProvider, SecretStore, StorageAccountProvider, WebAppProvider};
    use crate::resources::{FileShare, PlanOs, WebAppMountStorage};

    fn service(provider: &InMemoryProvider) -> AzureManageService {
        AzureManageService::new(
            AzureProviders::from_client(Arc::new(provider.clone())),
            Arc::new(provider.clone()),
        )
    }

    fn plan(tier: &str) -> ApplicationServicePlan {
        ApplicationServicePlan {
            id: None,
            provider: None,
            name: "plan1".to_string(),
            resource_group: None,
            region_id: None,
            os: PlanOs::Linux,
            pricing_tier: tier.to_string(),
            capacity: 1,
        }
    }

    fn base_config() -> AzureConfiguration {
        AzureConfiguration {
            resource_groups: vec![ResourceGroup::new("rg1", "canadacentral")],
            application_service_plans: vec![plan("B1")],
            ..AzureConfiguration::default()
        }
    }

    fn rendered(ctx: &ManageContext) -> Vec<String> {
        ctx.modifications().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_with_defaults_inherits_single_group() {
        let mut config = base_config();
        config.key_vaults.push(KeyVault {
            id: None,
            provider: None,
            name: "vault1".to_string(),
            resource_group: None,
            region_id: None,
        });
        config.mariadbs.push(Mariadb {
            id: None,
            provider: None,
            name: "db1".to_string(),
            resource_group: None,
            region_id: None,
            version: "10.3".to_string(),
            sku_name: "B_Gen5_1".to_string(),
            storage_mb: 5120,
            admin_user: "admin1".to_string(),
            key_vault: None,
            databases: vec![],
        });

        let resolved = with_defaults(&config);
        let plan = &resolved.application_service_plans[0];
        assert_eq!(plan.resource_group.as_deref(), Some("rg1"));
        assert_eq!(plan.region_id.as_deref(), Some("canadacentral"));
        assert_eq!(resolved.mariadbs[0].key_vault.as_deref(), Some("vault1"));
    }

    #[test]
    fn test_with_defaults_leaves_ambiguous_group_unset() {
        let mut config = base_config();
        config.resource_groups.push(ResourceGroup::new("rg2", "eastus"));
        let resolved = with_defaults(&config);
        assert_eq!(resolved.application_service_plans[0].resource_group, None);
        assert_eq!(resolved.application_service_plans[0].region_id, None);
    }

    #[tokio::test]
    async fn test_missing_default_is_reported() {
        let provider = InMemoryProvider::new();
        let mut config = base_config();
        config.resource_groups.push(ResourceGroup::new("rg2", "eastus"));

        let mut ctx = ManageContext::new();
        let result = service(&provider).manage(&mut ctx, &config).await;
        assert!(matches!(
            result,
            Err(ManageError::MissingDefault { ref field, .. }) if field == "resourceGroup"
        ));
    }

    #[tokio::test]
    async fn test_second_pass_makes_no_modification() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        let config = base_config();

        let mut first = ManageContext::new();
        service.manage(&mut first, &config).await.expect("first pass");
        assert_eq!(
            rendered(&first),
            vec![
                "ResourceGroup (rg1) ADD in canadacentral",
                "ApplicationServicePlan (plan1) ADD LINUX B1 x1",
            ]
        );

        let mut second = ManageContext::new();
        service.manage(&mut second, &config).await.expect("second pass");
        assert!(second.modifications().is_empty());
        assert!(second.needs_next_stage_hash().is_empty());
    }

    #[tokio::test]
    async fn test_region_divergence_aborts() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        let mut ctx = ManageContext::new();
        service
            .manage_resource_group(&mut ctx, &ResourceGroup::new("rg1", "eastus"))
            .await
            .expect("create");

        let result = service
            .manage_resource_group(&mut ctx, &ResourceGroup::new("rg1", "westeurope"))
            .await;
        match result {
            Err(ManageError::Divergence {
                resource_type,
                differences,
                ..
            }) => {
                assert_eq!(resource_type, "ResourceGroup");
                assert_eq!(differences, vec!["regionId: desired westeurope, current eastus"]);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pricing_tier_is_updated_in_place() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        service
            .manage(&mut ManageContext::new(), &base_config())
            .await
            .expect("create");

        let mut config = base_config();
        config.application_service_plans = vec![plan("P1v3")];
        let mut ctx = ManageContext::new();
        service.manage(&mut ctx, &config).await.expect("update");
        assert_eq!(
            rendered(&ctx),
            vec!["ApplicationServicePlan (plan1) UPDATE pricingTier: P1v3"]
        );
        let stored = provider
            .find_app_service_plan("rg1", "plan1")
            .await
            .expect("find")
            .into_option()
            .expect("found");
        assert_eq!(stored.pricing_tier, "P1v3");
    }

    #[tokio::test]
    async fn test_mariadb_password_goes_to_vault() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        let mut config = base_config();
        config.key_vaults.push(KeyVault {
            id: None,
            provider: None,
            name: "vault1".to_string(),
            resource_group: None,
            region_id: None,
        });
        config.mariadbs.push(Mariadb {
            id: None,
            provider: None,
            name: "db1".to_string(),
            resource_group: None,
            region_id: None,
            version: "10.3".to_string(),
            sku_name: "B_Gen5_1".to_string(),
            storage_mb: 5120,
            admin_user: "admin1".to_string(),
            key_vault: None,
            databases: vec!["app".to_string()],
        });

        let mut ctx = ManageContext::new();
        service.manage(&mut ctx, &config).await.expect("manage");

        let stored = provider
            .vault_secrets("vault1")
            .get_text(MARIADB_SECRET_NAMESPACE, &mariadb_password_secret("db1"))
            .await
            .expect("get")
            .expect("password stored");
        assert_eq!(
            provider.mariadb_admin_password("rg1", "db1").await.as_deref(),
            Some(stored.as_str())
        );
        assert!(rendered(&ctx).contains(&"Mariadb (db1) ADD database app".to_string()));

        let mut second = ManageContext::new();
        service.manage(&mut second, &config).await.expect("second pass");
        assert!(second.modifications().is_empty());
    }

    #[tokio::test]
    async fn test_mariadb_without_vault_is_missing_reference() {
        let provider = InMemoryProvider::new();
        let mut config = base_config();
        config.mariadbs.push(Mariadb {
            id: None,
            provider: None,
            name: "db1".to_string(),
            resource_group: None,
            region_id: None,
            version: "10.3".to_string(),
            sku_name: "B_Gen5_1".to_string(),
            storage_mb: 5120,
            admin_user: "admin1".to_string(),
            key_vault: None,
            databases: vec![],
        });

        let result = service(&provider).manage(&mut ManageContext::new(), &config).await;
        assert!(matches!(result, Err(ManageError::MissingReference { .. })));
        assert_eq!(provider.mariadb_admin_password("rg1", "db1").await, None);
    }

    #[tokio::test]
    async fn test_file_shares_follow_configuration() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        let mut account = StorageAccount {
            id: None,
            provider: None,
            name: "store1".to_string(),
            resource_group: Some("rg1".to_string()),
            region_id: Some("canadacentral".to_string()),
            kind: "StorageV2".to_string(),
            sku: "Standard_LRS".to_string(),
            https_only: true,
            file_shares: vec![
                FileShare { name: "data".to_string(), quota_gb: Some(10) },
                FileShare { name: "logs".to_string(), quota_gb: None },
            ],
        };
        service
            .manage_storage_account(&mut ManageContext::new(), &account)
            .await
            .expect("create");

        account.file_shares = vec![
            FileShare { name: "data".to_string(), quota_gb: Some(20) },
            FileShare { name: "media".to_string(), quota_gb: None },
        ];
        let mut ctx = ManageContext::new();
        service
            .manage_storage_account(&mut ctx, &account)
            .await
            .expect("update");
        assert_eq!(
            rendered(&ctx),
            vec![
                "StorageAccount (store1) UPDATE file share data quota Some(20)",
                "StorageAccount (store1) REMOVE file share logs",
                "StorageAccount (store1) ADD file share media",
            ]
        );
        let stored = provider
            .find_storage_account("rg1", "store1")
            .await
            .expect("find")
            .into_option()
            .expect("found");
        assert_eq!(stored.file_shares, account.file_shares);
    }

    #[tokio::test]
    async fn test_failed_hostname_binding_is_deferred() {
        let provider = InMemoryProvider::new();
        provider.fail_hostname_binding("www.example.com").await;
        let service = service(&provider);
        let mut config = base_config();
        let mut app = WebApp::new("app1", "plan1");
        app.custom_hostnames = vec!["www.example.com".to_string(), "api.example.com".to_string()];
        config.web_apps.push(app);

        let mut ctx = ManageContext::new();
        service.manage(&mut ctx, &config).await.expect("manage");
        assert!(rendered(&ctx).contains(&"WebApp (app1) ADD hostname api.example.com".to_string()));
        assert_eq!(ctx.deferrals().len(), 1);
        assert_eq!(ctx.deferrals()[0].kind, DeferralKind::HostnameBinding);
        assert_eq!(ctx.deferrals()[0].resource, "app1/www.example.com");
    }

    #[tokio::test]
    async fn test_mounts_are_replaced_as_a_whole() {
        let provider = InMemoryProvider::new();
        let service = service(&provider);
        let mut config = base_config();
        let mut app = WebApp::new("app1", "plan1");
        app.mount_storages = vec![WebAppMountStorage {
            name: "data".to_string(),
            storage_account: "store1".to_string(),
            share_name: "data".to_string(),
            mount_path: "/data".to_string(),
        }];
        config.web_apps.push(app.clone());
        service
            .manage(&mut ManageContext::new(), &config)
            .await
            .expect("create");

        app.mount_storages[0].mount_path = "/srv/data".to_string();
        config.web_apps = vec![app];
        let mut ctx = ManageContext::new();
        service.manage(&mut ctx, &config).await.expect("update");
        assert_eq!(
            rendered(&ctx),
            vec!["WebApp (app1) UPDATE mount data store1/data at /srv/data"]
        );
        let stored = provider
            .find_web_app("rg1", "app1")
            .await
            .expect("find")
            .into_option()
            .expect("found");
        assert_eq!(stored.mount_storages[0].mount_path, "/srv/data");
    }
}
