// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `providers/azure/dns.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::providers::azure::auth::AzureCredentials;
    use crate::providers::azure::{AzureEndpoints, AzureSession};
    use crate::providers::http::JsonApi;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE: &str =
        "/subscriptions/sub/resourceGroups/rg-dns/providers/Microsoft.Network/dnsZones/example.com";

    async fn client(server: &MockServer) -> AzureClient {
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3600,
                "access_token": "t"
            })))
            .mount(server)
            .await;
        AzureClient::new(AzureSession::new(
            JsonApi::default(),
            AzureCredentials {
                tenant_id: "tenant-1".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                subscription_id: "sub".to_string(),
            },
            AzureEndpoints {
                management_url: server.uri(),
                login_url: server.uri(),
                key_vault_url: None,
            },
        ))
    }

    fn zone() -> DnsZone {
        DnsZone::new("example.com").with_resource_group("rg-dns")
    }

    #[test]
    fn test_long_txt_is_split() {
        let value = "x".repeat(300);
        let chunks = split_txt(&value);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 255);
        assert_eq!(chunks.concat(), value);
        assert_eq!(split_txt(""), vec![String::new()]);
    }

    #[test]
    fn test_mx_properties_wire_names() {
        let mut entry = RawDnsEntry::new("example.com", DnsRecordType::MX, "mail.example.com", 300);
        entry.priority = Some(10);
        let properties =
            record_set_properties(DnsRecordType::MX, 300, &[entry]).expect("properties");
        assert_eq!(
            serde_json::to_value(&properties).expect("json"),
            json!({"TTL": 300, "MXRecords": [{"preference": 10, "exchange": "mail.example.com"}]})
        );
    }

    #[test]
    fn test_invalid_caa_is_rejected() {
        let entry = RawDnsEntry::new("example.com", DnsRecordType::CAA, "issue", 300);
        assert!(matches!(
            record_set_properties(DnsRecordType::CAA, 300, &[entry]),
            Err(DnsError::InvalidRecordData { .. })
        ));
    }

    #[test]
    fn test_srv_entries_carry_numbers() {
        let properties = RecordSetProperties {
            ttl: 600,
            srv_records: vec![SrvRecord {
                priority: 1,
                weight: 5,
                port: 5060,
                target: "sip.example.com.".to_string(),
            }],
            ..RecordSetProperties::default()
        };
        let entries = record_set_entries("example.com", "_sip._tcp", DnsRecordType::SRV, &properties);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "_sip._tcp.example.com");
        assert_eq!(entries[0].details, "sip.example.com");
        assert_eq!(entries[0].port, Some(5060));
        assert_eq!(entries[0].ttl, 600);
    }

    #[tokio::test]
    async fn test_list_entries_skips_soa_and_apex_ns() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE}/recordsets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"name": "@", "type": "Microsoft.Network/dnszones/SOA",
                     "properties": {"TTL": 3600, "SOARecord": {"host": "ns1-01.azure-dns.com."}}},
                    {"name": "@", "type": "Microsoft.Network/dnszones/NS",
                     "properties": {"TTL": 172800, "NSRecords": [{"nsdname": "ns1-01.azure-dns.com."}]}},
                    {"name": "www", "type": "Microsoft.Network/dnszones/A",
                     "properties": {"TTL": 300, "ARecords": [{"ipv4Address": "1.2.3.4"}, {"ipv4Address": "1.2.3.5"}]}},
                    {"name": "asuid.www", "type": "Microsoft.Network/dnszones/TXT",
                     "properties": {"TTL": 3600, "TXTRecords": [{"value": ["ABC", "DEF"]}]}}
                ]
            })))
            .mount(&server)
            .await;

        let entries = client.list_entries(&zone()).await.expect("list");
        let rendered: Vec<String> = entries
            .iter()
            .map(|e| format!("{} {} {}", e.name, e.record_type, e.details))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "www.example.com A 1.2.3.4",
                "www.example.com A 1.2.3.5",
                "asuid.www.example.com TXT ABCDEF",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_record_set_body() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("PUT"))
            .and(path(format!("{ZONE}/CNAME/www")))
            .and(body_json(json!({
                "properties": {"TTL": 3600, "CNAMERecord": {"cname": "app1.azurewebsites.net"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "www"})))
            .expect(1)
            .mount(&server)
            .await;

        let entry = RawDnsEntry::new(
            "www.example.com",
            DnsRecordType::CNAME,
            "app1.azurewebsites.net",
            3600,
        );
        client
            .create_record_set(&zone(), "www", DnsRecordType::CNAME, 3600, &[entry])
            .await
            .expect("create");
    }

    #[tokio::test]
    async fn test_delete_missing_record_set_is_ok() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        Mock::given(method("DELETE"))
            .and(path(format!("{ZONE}/TXT/_acme-challenge")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client
            .delete_record_set(&zone(), "_acme-challenge", DnsRecordType::TXT)
            .await
            .expect("delete of a missing set succeeds");
    }

    #[tokio::test]
    async fn test_find_zone_without_resource_group_rejected() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        assert!(matches!(
            client.find_dns_zone(None, "example.com").await,
            Err(ProviderError::Rejected(_))
        ));
    }
}
