// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns/apply.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::providers::memory::InMemoryProvider;

    async fn zone(provider: &InMemoryProvider) -> DnsZone {
        provider
            .create_dns_zone(&DnsZone::new("example.com"))
            .await
            .expect("zone")
    }

    fn a(name: &str, ip: &str, ttl: u32) -> RawDnsEntry {
        RawDnsEntry::new(name, DnsRecordType::A, ip, ttl)
    }

    #[test]
    fn test_two_cname_values_rejected() {
        let entries = vec![
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "a.example.net", 300),
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "b.example.net", 300),
        ];
        assert_eq!(
            validate_record_set("www.example.com", DnsRecordType::CNAME, &entries),
            Err(DnsError::MultipleCname {
                name: "www.example.com".to_string(),
                count: 2
            })
        );
    }

    #[test]
    fn test_mixed_entries_rejected() {
        let entries = vec![
            a("www.example.com", "1.2.3.4", 300),
            RawDnsEntry::new("www.example.com", DnsRecordType::TXT, "hello", 300),
        ];
        let err = validate_record_set("www.example.com", DnsRecordType::A, &entries)
            .expect_err("mixed types");
        assert!(matches!(err, DnsError::MixedEntries { .. }));
    }

    #[tokio::test]
    async fn test_set_entry_rejects_cname_before_writing() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        provider.clear_operations().await;
        let entries = vec![
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "a.example.net", 300),
            RawDnsEntry::new("www.example.com", DnsRecordType::CNAME, "b.example.net", 300),
        ];

        let result = set_entry(&provider, &zone, "www.example.com", DnsRecordType::CNAME, &entries).await;
        assert!(matches!(result, Err(ApplyError::Dns(DnsError::MultipleCname { .. }))));
        assert!(provider.operations().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_entry_replaces_set_with_min_ttl() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        set_entry(
            &provider,
            &zone,
            "www.example.com",
            DnsRecordType::A,
            &[a("www.example.com", "9.9.9.9", 300)],
        )
        .await
        .expect("first write");

        let written = set_entry(
            &provider,
            &zone,
            "www.example.com",
            DnsRecordType::A,
            &[a("www.example.com", "1.2.3.4", 600), a("www.example.com", "1.2.3.5", 300)],
        )
        .await
        .expect("second write");
        assert!(written);

        let entries = provider.list_entries(&zone).await.expect("list");
        assert_eq!(
            entries,
            vec![a("www.example.com", "1.2.3.4", 300), a("www.example.com", "1.2.3.5", 300)]
        );
    }

    #[tokio::test]
    async fn test_set_entry_with_no_entries_deletes() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        set_entry(
            &provider,
            &zone,
            "example.com",
            DnsRecordType::A,
            &[a("example.com", "1.2.3.4", 300)],
        )
        .await
        .expect("write");
        set_entry(&provider, &zone, "example.com", DnsRecordType::A, &[])
            .await
            .expect("delete");
        assert!(provider.list_entries(&zone).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_set_entry_skips_names_outside_zone() {
        let provider = InMemoryProvider::new();
        let zone = zone(&provider).await;
        provider.clear_operations().await;

        let written = set_entry(
            &provider,
            &zone,
            "www.notexample.com",
            DnsRecordType::A,
            &[a("www.notexample.com", "1.2.3.4", 300)],
        )
        .await
        .expect("skip is not an error");
        assert!(!written);
        assert!(provider.operations().await.is_empty());
    }
}
