// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `manage/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::context::DeferralKind;
    use crate::dns::reconciler::{compute_desired_entries, AzureCustomDomainDnsEntry, DnsEntryConfig};
    use crate::errors::DnsError;
    use crate::providers::memory::InMemoryProvider;
    use crate::providers::{AppServicePlanProvider, ResourceGroupProvider};
    use crate::resources::{ApplicationServicePlan, PlanOs, ResourceGroup, WebApp};

    fn a(name: &str, ip: &str) -> RawDnsEntry {
        RawDnsEntry::new(name, DnsRecordType::A, ip, 300)
    }

    async fn zone(provider: &InMemoryProvider) -> DnsZone {
        provider
            .create_dns_zone(&DnsZone::new("example.com"))
            .await
            .expect("zone")
    }

    fn rendered(ctx: &ManageContext) -> Vec<String> {
        ctx.modifications().iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_new_record_set_is_added() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let mut ctx = ManageContext::new();

        apply_record_sets(&mut ctx, &provider, &zone, &[], &[a("www.example.com", "1.2.3.4")])
            .await
            .expect("apply");

        assert_eq!(
            rendered(&ctx),
            vec!["DnsZone (example.com) ADD www.example.com A 1.2.3.4 (ttl 300)"]
        );
        let listed = provider.list_entries(&zone).await.expect("list");
        assert_eq!(listed, vec![a("www.example.com", "1.2.3.4")]);
    }

    #[tokio::test]
    async fn test_changed_and_removed_sets() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let initial = vec![a("old.example.com", "1.1.1.1"), a("www.example.com", "1.2.3.4")];
        apply_record_sets(&mut ManageContext::new(), &provider, &zone, &[], &initial)
            .await
            .expect("seed");
        let current = provider.list_entries(&zone).await.expect("list");

        let mut ctx = ManageContext::new();
        apply_record_sets(&mut ctx, &provider, &zone, &current, &[a("www.example.com", "5.6.7.8")])
            .await
            .expect("apply");

        assert_eq!(
            rendered(&ctx),
            vec![
                "DnsZone (example.com) REMOVE old.example.com A 1.1.1.1 (ttl 300)",
                "DnsZone (example.com) UPDATE www.example.com A 1.2.3.4 (ttl 300) -> www.example.com A 5.6.7.8 (ttl 300)",
            ]
        );
        assert_eq!(
            provider.list_entries(&zone).await.expect("list"),
            vec![a("www.example.com", "5.6.7.8")]
        );
    }

    #[tokio::test]
    async fn test_unchanged_sets_are_not_written() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let entries = vec![a("www.example.com", "1.2.3.4")];
        apply_record_sets(&mut ManageContext::new(), &provider, &zone, &[], &entries)
            .await
            .expect("seed");
        provider.clear_operations().await;

        // Listed entries carry provider ids, which never take part in the comparison
        let current = provider.list_entries(&zone).await.expect("list");
        let mut ctx = ManageContext::new();
        apply_record_sets(&mut ctx, &provider, &zone, &current, &entries)
            .await
            .expect("apply");
        assert!(ctx.modifications().is_empty());
        assert!(provider.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cname_set_is_rejected() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let desired = vec![
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "a.example.net", 300),
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "b.example.net", 300),
        ];
        let result =
            apply_record_sets(&mut ManageContext::new(), &provider, &zone, &[], &desired).await;
        assert!(matches!(
            result,
            Err(ManageError::Dns(DnsError::MultipleCname { count: 2, .. }))
        ));
    }

    #[tokio::test]
    async fn test_overwrite_with_other_case_replaces_the_cname() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let old = RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "old.example.net", 300);
        apply_record_sets(&mut ManageContext::new(), &provider, &zone, &[], &[old])
            .await
            .expect("seed");
        let current = provider.list_entries(&zone).await.expect("list");

        let new = RawDnsEntry::new("WWW.example.com", DnsRecordType::CNAME, "new.example.net", 300);
        let config = DnsConfig {
            configs: vec![DnsEntryConfig {
                raw_dns_entries: vec![new.clone()],
                ..DnsEntryConfig::default()
            }],
            ..DnsConfig::default()
        };
        let mut ctx = ManageContext::new();
        let desired = compute_desired_entries(
            "example.com",
            &current,
            &config,
            &ResolvedDependencies::new(),
            &mut ctx,
        );
        assert_eq!(desired, vec![new.clone()]);

        apply_record_sets(&mut ctx, &provider, &zone, &current, &desired)
            .await
            .expect("apply");
        assert_eq!(provider.list_entries(&zone).await.expect("list"), vec![new]);
    }

    #[tokio::test]
    async fn test_names_outside_zone_are_skipped() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        let mut ctx = ManageContext::new();
        apply_record_sets(&mut ctx, &provider, &zone, &[], &[a("www.example.org", "1.2.3.4")])
            .await
            .expect("apply");
        assert!(ctx.modifications().is_empty());
    }

    fn apex_config() -> DnsConfig {
        DnsConfig {
            configs: vec![DnsEntryConfig {
                azure_custom_domain_dns_entries: vec![AzureCustomDomainDnsEntry {
                    name: "example.com".to_string(),
                    web_app: "app1".to_string(),
                    resource_group: Some("rg1".to_string()),
                    ttl: Some(600),
                    use_a_record: false,
                }],
                ..DnsEntryConfig::default()
            }],
            ..DnsConfig::default()
        }
    }

    async fn web_app(provider: &InMemoryProvider) {
        provider
            .create_resource_group(&ResourceGroup::new("rg1", "eastus"))
            .await
            .expect("rg");
        provider
            .create_app_service_plan(&ApplicationServicePlan {
                id: None,
                provider: None,
                name: "plan1".to_string(),
                resource_group: Some("rg1".to_string()),
                region_id: Some("eastus".to_string()),
                os: PlanOs::Linux,
                pricing_tier: "B1".to_string(),
                capacity: 1,
            })
            .await
            .expect("plan");
        let mut app = WebApp::new("app1", "plan1");
        app.resource_group = Some("rg1".to_string());
        app.region_id = Some("eastus".to_string());
        provider.create_web_app(&app).await.expect("web app");
    }

    #[tokio::test]
    async fn test_apex_resolves_web_app_addresses() {
        let provider = InMemoryProvider::new();
        web_app(&provider).await;
        provider
            .add_host("app1.azurewebsites.net", &["20.1.2.3", "20.1.2.4"])
            .await;

        let config = apex_config();
        let dependencies =
            resolve_dns_dependencies("example.com", &config, Some(&provider), &provider)
                .await
                .expect("resolve");
        let mut ctx = ManageContext::new();
        let entries = compute_desired_entries("example.com", &[], &config, &dependencies, &mut ctx);

        assert!(ctx.deferrals().is_empty());
        let details: Vec<&str> = entries.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(details, vec!["20.1.2.3", "20.1.2.4"]);
        assert!(entries.iter().all(|e| e.record_type == DnsRecordType::A));
    }

    #[tokio::test]
    async fn test_unresolved_hostname_is_deferred() {
        let provider = InMemoryProvider::new();
        web_app(&provider).await;

        let config = apex_config();
        let dependencies =
            resolve_dns_dependencies("example.com", &config, Some(&provider), &provider)
                .await
                .expect("resolve");
        let mut ctx = ManageContext::new();
        let entries = compute_desired_entries("example.com", &[], &config, &dependencies, &mut ctx);

        assert!(entries.is_empty());
        assert_eq!(ctx.deferrals()[0].kind, DeferralKind::HostnameResolution);
        assert_eq!(ctx.deferrals()[0].resource, "app1.azurewebsites.net");
    }

    #[tokio::test]
    async fn test_missing_web_app_provider_defers_lookup() {
        let provider = InMemoryProvider::new();
        let config = apex_config();
        let dependencies = resolve_dns_dependencies("example.com", &config, None, &provider)
            .await
            .expect("resolve");
        let mut ctx = ManageContext::new();
        compute_desired_entries("example.com", &[], &config, &dependencies, &mut ctx);
        assert_eq!(ctx.deferrals()[0].kind, DeferralKind::WebAppNotFound);
        assert_eq!(ctx.deferrals()[0].resource, "rg1/app1");
    }
}
