// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `providers/memory.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::resources::{ApplicationServicePlan, PlanOs};

    fn plan(rg: &str) -> ApplicationServicePlan {
        ApplicationServicePlan {
            id: None,
            provider: None,
            name: "plan1".to_string(),
            resource_group: Some(rg.to_string()),
            region_id: Some("eastus".to_string()),
            os: PlanOs::Linux,
            pricing_tier: "B1".to_string(),
            capacity: 1,
        }
    }

    fn web_app(rg: &str) -> WebApp {
        let mut app = WebApp::new("App1", "plan1");
        app.resource_group = Some(rg.to_string());
        app
    }

    #[tokio::test]
    async fn test_resource_group_lookup_is_case_insensitive() {
        let provider = InMemoryProvider::new();
        let created = provider
            .create_resource_group(&ResourceGroup::new("RG1", "eastus"))
            .await
            .expect("create");
        assert!(created.id.is_some());
        assert_eq!(created.provider, Some(CloudProvider::InMemory));

        let found = provider.find_resource_group("rg1").await.expect("find");
        assert!(matches!(found, Lookup::Found(_)));
        assert_eq!(
            provider.find_resource_group("rg2").await.expect("find"),
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn test_web_app_requires_plan() {
        let provider = InMemoryProvider::new();
        let err = provider.create_web_app(&web_app("rg1")).await;
        assert!(matches!(err, Err(ProviderError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_web_app_visibility_delay() {
        let provider = InMemoryProvider::new().with_web_app_visibility_delay(1);
        provider.create_app_service_plan(&plan("rg1")).await.expect("plan");
        provider.create_web_app(&web_app("rg1")).await.expect("app");

        let first = provider
            .find_web_app("rg1", "app1")
            .await
            .expect("find")
            .into_option()
            .expect("exists");
        assert!(first.verification_id.is_none());
        assert!(first.default_hostname.is_none());

        let second = provider
            .find_web_app("rg1", "app1")
            .await
            .expect("find")
            .into_option()
            .expect("exists");
        assert!(second.verification_id.is_some());
        assert_eq!(second.default_hostname.as_deref(), Some("app1.azurewebsites.net"));
    }

    #[tokio::test]
    async fn test_record_sets_and_lookup() {
        let provider = InMemoryProvider::new();
        let zone = provider
            .create_dns_zone(&DnsZone::new("example.com"))
            .await
            .expect("zone");
        let entry = RawDnsEntry::new("_acme-challenge.example.com", DnsRecordType::TXT, "digest", 60);
        provider
            .create_record_set(&zone, "_acme-challenge", DnsRecordType::TXT, 60, &[entry])
            .await
            .expect("create");

        assert_eq!(
            provider
                .lookup_txt("_acme-challenge.example.com")
                .await
                .expect("lookup"),
            vec!["digest".to_string()]
        );

        provider
            .delete_record_set(&zone, "_acme-challenge", DnsRecordType::TXT)
            .await
            .expect("delete");
        assert!(provider.list_entries(&zone).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_record_level_add_and_delete() {
        let provider = InMemoryProvider::new();
        let zone = provider
            .create_dns_zone(&DnsZone::new("example.com"))
            .await
            .expect("zone");
        let added = provider
            .add_record(&zone, &RawDnsEntry::new("www.example.com", DnsRecordType::A, "1.2.3.4", 300))
            .await
            .expect("add");
        let id = added.provider_id.clone().expect("id assigned");

        provider.delete_record(&zone, &id).await.expect("delete");
        assert!(provider.list_entries(&zone).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_vault_secret_stores_are_isolated() {
        let provider = InMemoryProvider::new();
        let vault1 = KeyVault {
            id: None,
            provider: None,
            name: "vault1".to_string(),
            resource_group: Some("rg1".to_string()),
            region_id: None,
        };
        let mut vault2 = vault1.clone();
        vault2.name = "vault2".to_string();

        provider
            .secret_store(&vault1)
            .set_text_or_fail("example.com", "cert", "PEM")
            .await
            .expect("set");
        assert_eq!(
            provider
                .secret_store(&vault1)
                .get_text("example.com", "cert")
                .await
                .expect("get")
                .as_deref(),
            Some("PEM")
        );
        assert_eq!(
            provider
                .secret_store(&vault2)
                .get_text("example.com", "cert")
                .await
                .expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn test_failing_hostname_binding() {
        let provider = InMemoryProvider::new();
        provider.create_app_service_plan(&plan("rg1")).await.expect("plan");
        let app = provider.create_web_app(&web_app("rg1")).await.expect("app");
        provider.fail_hostname_binding("www.example.com").await;

        assert!(provider.add_custom_hostname(&app, "www.example.com").await.is_err());
        assert!(provider.add_custom_hostname(&app, "api.example.com").await.is_ok());
    }
}
