// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `providers/digitalocean.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DigitalOceanClient {
        DigitalOceanClient::new(JsonApi::default(), "do-token").with_base_url(server.uri())
    }

    fn zone() -> DnsZone {
        DnsZone::new("example.com")
    }

    #[tokio::test]
    async fn test_find_missing_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "not_found",
                "message": "The resource you were accessing could not be found."
            })))
            .mount(&server)
            .await;

        let found = client(&server)
            .find_dns_zone(None, "example.com")
            .await
            .expect("not found is not an error");
        assert_eq!(found, Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_find_domain_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com"))
            .and(header("authorization", "Bearer do-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domain": {"name": "example.com", "ttl": 1800, "zone_file": ""}
            })))
            .mount(&server)
            .await;

        let zone = client(&server)
            .find_dns_zone(None, "example.com")
            .await
            .expect("find")
            .into_option()
            .expect("found");
        assert_eq!(zone.name, "example.com");
        assert_eq!(zone.provider, Some(CloudProvider::DigitalOcean));
    }

    #[tokio::test]
    async fn test_list_entries_normalizes_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com/records"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domain_records": [
                    {"id": 1, "type": "SOA", "name": "@", "data": "1800", "ttl": 1800},
                    {"id": 2, "type": "NS", "name": "@", "data": "ns1.digitalocean.com", "ttl": 1800},
                    {"id": 3, "type": "A", "name": "www", "data": "1.2.3.4", "ttl": 300},
                    {"id": 4, "type": "CNAME", "name": "api", "data": "@", "ttl": 300}
                ],
                "links": {"pages": {"next": "page-2"}},
                "meta": {"total": 5}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com/records"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domain_records": [
                    {"id": 5, "type": "MX", "name": "@", "data": "mail.example.com", "ttl": 300, "priority": 10}
                ],
                "links": {},
                "meta": {"total": 5}
            })))
            .mount(&server)
            .await;

        let entries = client(&server).list_entries(&zone()).await.expect("list");
        let rendered: Vec<String> = entries
            .iter()
            .map(|e| format!("{} {} {} {:?}", e.name, e.record_type, e.details, e.provider_id))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "www.example.com A 1.2.3.4 Some(\"3\")",
                "api.example.com CNAME example.com Some(\"4\")",
                "example.com MX mail.example.com Some(\"5\")",
            ]
        );
        assert_eq!(entries[2].priority, Some(10));
    }

    #[tokio::test]
    async fn test_add_record_uses_relative_name_and_trailing_dot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/domains/example.com/records"))
            .and(body_partial_json(json!({
                "type": "CNAME",
                "name": "www",
                "data": "app1.azurewebsites.net.",
                "ttl": 3600
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "domain_record": {
                    "id": 42, "type": "CNAME", "name": "www",
                    "data": "app1.azurewebsites.net", "ttl": 3600
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entry = RawDnsEntry::new(
            "www.example.com",
            DnsRecordType::CNAME,
            "app1.azurewebsites.net",
            3600,
        );
        let added = client(&server)
            .add_record(&zone(), &entry)
            .await
            .expect("add");
        assert_eq!(added.provider_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_caa_record_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/domains/example.com/records"))
            .and(body_partial_json(json!({
                "type": "CAA", "name": "@", "data": "letsencrypt.org", "flags": 0, "tag": "issue"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "domain_record": {"id": 7, "type": "CAA", "name": "@", "data": "letsencrypt.org", "ttl": 300, "flags": 0, "tag": "issue"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entry = RawDnsEntry::new(
            "example.com",
            DnsRecordType::CAA,
            "0 issue \"letsencrypt.org\"",
            300,
        );
        client(&server).add_record(&zone(), &entry).await.expect("add");
    }

    #[tokio::test]
    async fn test_delete_record_set_deletes_matching_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/domains/example.com/records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domain_records": [
                    {"id": 10, "type": "A", "name": "www", "data": "1.2.3.4", "ttl": 300},
                    {"id": 11, "type": "A", "name": "www", "data": "1.2.3.5", "ttl": 300},
                    {"id": 12, "type": "TXT", "name": "www", "data": "keep", "ttl": 300}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v2/domains/example.com/records/10"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v2/domains/example.com/records/11"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete_record_set(&zone(), "www", DnsRecordType::A)
            .await
            .expect("delete");
    }

    #[test]
    fn test_record_outside_zone_rejected() {
        let entry = RawDnsEntry::new("www.other.org", DnsRecordType::A, "1.2.3.4", 300);
        assert!(to_api_record("example.com", &entry).is_err());
    }
}
