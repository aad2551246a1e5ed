// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `letsencrypt/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ProviderResult;
    use crate::letsencrypt::acme::{Authorization, Challenge, Directory, Identifier, Problem};
    use crate::providers::memory::{InMemoryProvider, InMemorySecretStore};
    use async_trait::async_trait;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkcs12::Pkcs12;
    use openssl::x509::{X509Builder, X509NameBuilder, X509Req, X509};
    use std::sync::Mutex;
    use std::time::Duration;

    const DOMAIN: &str = "www.example.com";

    /// ACME server double that signs every CSR with its own CA.
    struct FakeAcme {
        ca_key: PKey<Private>,
        ca_cert: X509,
        leaf_days: u32,
        authorization_status: String,
        challenge_types: Vec<String>,
        challenge_result: String,
        order_statuses: Mutex<Vec<String>>,
        chain: Mutex<Option<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAcme {
        fn new() -> Self {
            let ca_key = certs::generate_key(2048).expect("ca key");
            let mut name = X509NameBuilder::new().expect("name");
            name.append_entry_by_nid(Nid::COMMONNAME, "Fake CA")
                .expect("cn");
            let name = name.build();
            let mut builder = X509Builder::new().expect("builder");
            builder.set_version(2).expect("version");
            builder.set_subject_name(&name).expect("subject");
            builder.set_issuer_name(&name).expect("issuer");
            builder.set_pubkey(&ca_key).expect("pubkey");
            builder
                .set_not_before(&Asn1Time::days_from_now(0).expect("now"))
                .expect("not before");
            builder
                .set_not_after(&Asn1Time::days_from_now(365).expect("later"))
                .expect("not after");
            builder.sign(&ca_key, MessageDigest::sha256()).expect("sign");
            Self {
                ca_key,
                ca_cert: builder.build(),
                leaf_days: 90,
                authorization_status: "pending".to_string(),
                challenge_types: vec!["http-01".to_string(), DNS_01.to_string()],
                challenge_result: STATUS_VALID.to_string(),
                order_statuses: Mutex::new(Vec::new()),
                chain: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call(&self, name: &str) {
            self.calls.lock().expect("calls").push(name.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }

        fn order_with_status(&self, status: &str) -> Order {
            Order {
                url: "fake://order/1".to_string(),
                status: status.to_string(),
                authorizations: vec!["fake://authz/1".to_string()],
                finalize: "fake://order/1/finalize".to_string(),
                certificate: (status == STATUS_VALID).then(|| "fake://cert/1".to_string()),
                error: (status == STATUS_INVALID).then(|| Problem {
                    problem_type: "urn:ietf:params:acme:error:badCSR".to_string(),
                    detail: "rejected".to_string(),
                }),
            }
        }

        fn challenge_with_status(&self, challenge_type: &str, status: &str) -> Challenge {
            Challenge {
                challenge_type: challenge_type.to_string(),
                url: format!("fake://challenge/{challenge_type}"),
                status: status.to_string(),
                token: "token-1".to_string(),
                error: (status == STATUS_INVALID).then(|| Problem {
                    problem_type: "urn:ietf:params:acme:error:incorrectResponse".to_string(),
                    detail: "TXT record not found".to_string(),
                }),
            }
        }

        fn issue(&self, csr_der: &[u8]) -> String {
            let request = X509Req::from_der(csr_der).expect("csr");
            let public_key = request.public_key().expect("public key");
            let mut builder = X509Builder::new().expect("builder");
            builder.set_version(2).expect("version");
            builder
                .set_subject_name(request.subject_name())
                .expect("subject");
            builder
                .set_issuer_name(self.ca_cert.subject_name())
                .expect("issuer");
            builder.set_pubkey(&public_key).expect("pubkey");
            builder
                .set_not_before(&Asn1Time::days_from_now(0).expect("now"))
                .expect("not before");
            builder
                .set_not_after(&Asn1Time::days_from_now(self.leaf_days).expect("later"))
                .expect("not after");
            builder
                .sign(&self.ca_key, MessageDigest::sha256())
                .expect("sign");
            let leaf = String::from_utf8(builder.build().to_pem().expect("pem")).expect("utf8");
            let ca = String::from_utf8(self.ca_cert.to_pem().expect("pem")).expect("utf8");
            format!("{leaf}{ca}")
        }
    }

    #[async_trait]
    impl AcmeConnector for FakeAcme {
        async fn login(
            &self,
            directory_url: &str,
            key: &PKey<Private>,
            _email: &str,
        ) -> Result<AcmeAccount, AcmeError> {
            self.call(&format!("login {directory_url}"));
            Ok(AcmeAccount {
                key: key.clone(),
                kid: "fake://account/1".to_string(),
                directory: Directory {
                    new_nonce: "fake://nonce".to_string(),
                    new_account: "fake://account".to_string(),
                    new_order: "fake://order".to_string(),
                },
            })
        }

        async fn new_order(&self, _account: &AcmeAccount, _domain: &str) -> Result<Order, AcmeError> {
            self.call("new_order");
            Ok(self.order_with_status("pending"))
        }

        async fn authorization(
            &self,
            _account: &AcmeAccount,
            _url: &str,
        ) -> Result<Authorization, AcmeError> {
            self.call("authorization");
            Ok(Authorization {
                identifier: Identifier {
                    identifier_type: "dns".to_string(),
                    value: DOMAIN.to_string(),
                },
                status: self.authorization_status.clone(),
                challenges: self
                    .challenge_types
                    .iter()
                    .map(|t| self.challenge_with_status(t, "pending"))
                    .collect(),
            })
        }

        async fn trigger_challenge(
            &self,
            _account: &AcmeAccount,
            _url: &str,
        ) -> Result<Challenge, AcmeError> {
            self.call("trigger_challenge");
            Ok(self.challenge_with_status(DNS_01, "processing"))
        }

        async fn challenge(&self, _account: &AcmeAccount, _url: &str) -> Result<Challenge, AcmeError> {
            self.call("challenge");
            Ok(self.challenge_with_status(DNS_01, &self.challenge_result))
        }

        async fn finalize(
            &self,
            _account: &AcmeAccount,
            _order: &Order,
            csr_der: &[u8],
        ) -> Result<Order, AcmeError> {
            self.call("finalize");
            *self.chain.lock().expect("chain") = Some(self.issue(csr_der));
            Ok(self.order_with_status("processing"))
        }

        async fn order(&self, _account: &AcmeAccount, _url: &str) -> Result<Order, AcmeError> {
            self.call("order");
            let mut statuses = self.order_statuses.lock().expect("statuses");
            let status = if statuses.is_empty() {
                STATUS_VALID.to_string()
            } else {
                statuses.remove(0)
            };
            Ok(self.order_with_status(&status))
        }

        async fn certificate(&self, _account: &AcmeAccount, _url: &str) -> Result<String, AcmeError> {
            self.call("certificate");
            Ok(self.chain.lock().expect("chain").clone().unwrap_or_default())
        }
    }

    /// Resolver that never sees any record.
    struct EmptyLookup;

    #[async_trait]
    impl DnsLookup for EmptyLookup {
        async fn lookup_a(&self, _name: &str) -> ProviderResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn lookup_txt(&self, _name: &str) -> ProviderResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        provider: InMemoryProvider,
        secrets: InMemorySecretStore,
        zone: DnsZone,
    }

    async fn fixture(zone_name: &str) -> Fixture {
        let provider = InMemoryProvider::new();
        let zone = provider
            .create_dns_zone(&DnsZone::new(zone_name))
            .await
            .expect("zone");
        Fixture {
            provider,
            secrets: InMemorySecretStore::new(),
            zone,
        }
    }

    fn service(acme: Arc<FakeAcme>, lookup: Arc<dyn DnsLookup>) -> LetsEncryptService {
        LetsEncryptService::new(acme, lookup, LetsEncryptSettings::immediate())
            .with_directories("fake://production", "fake://staging")
    }

    fn request<'a>(fixture: &'a Fixture, staging: bool) -> CertificateRequest<'a> {
        CertificateRequest {
            domain: DOMAIN,
            zone: &fixture.zone,
            dns: &fixture.provider,
            secrets: &fixture.secrets,
            web_app: None,
            staging,
            email: "ops@example.com",
        }
    }

    #[test]
    fn test_certificate_namespace() {
        assert_eq!(certificate_namespace(DOMAIN, false), "www.example.com");
        assert_eq!(certificate_namespace(DOMAIN, true), "www.example.com-staging");
        assert_eq!(challenge_record_name(DOMAIN), "_acme-challenge.www.example.com");
    }

    #[tokio::test]
    async fn test_issues_and_stores_certificate() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme::new());
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));

        let outcome = service.update(&request(&fixture, false)).await.expect("update");
        let CertificateOutcome::Issued { expires_at, pushed } = outcome else {
            panic!("expected issuance, got {outcome:?}");
        };
        assert!(!pushed);
        assert!((89..=90).contains(&(expires_at - Utc::now()).num_days()));

        assert_eq!(
            acme.calls(),
            vec![
                "login fake://production",
                "new_order",
                "authorization",
                "trigger_challenge",
                "challenge",
                "finalize",
                "order",
                "certificate",
            ]
        );

        let secrets = fixture.secrets.snapshot().await;
        for name in [
            SECRET_CA_CERT,
            SECRET_CERT,
            SECRET_PUBLIC_KEY,
            SECRET_PRIVATE_KEY,
            SECRET_PFX_PASSWORD,
        ] {
            assert!(
                secrets.contains_key(&format!("www.example.com|{name}")),
                "missing {name}"
            );
        }
        assert_eq!(secrets["www.example.com|pfx-password"].len(), 20);
        assert!(secrets["www.example.com|ca-cert"].contains("BEGIN CERTIFICATE"));

        // Challenge record carries the digest of the stored account key
        let account_key = certs::load_private_key(&secrets["account|private-key"]).expect("key");
        let digest = acme::dns_challenge_digest("token-1", &account_key).expect("digest");
        let records = fixture
            .provider
            .list_entries(&fixture.zone)
            .await
            .expect("records");
        let challenge = records
            .iter()
            .find(|r| r.name == "_acme-challenge.www.example.com")
            .expect("challenge record");
        assert_eq!(challenge.record_type, DnsRecordType::TXT);
        assert_eq!(challenge.details, digest);
        assert_eq!(challenge.ttl, ACME_CHALLENGE_TTL_SECS);
    }

    #[tokio::test]
    async fn test_valid_certificate_is_kept_without_acme_calls() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme::new());
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));
        service.update(&request(&fixture, false)).await.expect("first");
        let calls = acme.calls().len();
        let before = fixture.secrets.snapshot().await;

        let outcome = service.update(&request(&fixture, false)).await.expect("second");
        assert!(matches!(outcome, CertificateOutcome::Kept { .. }));
        assert_eq!(acme.calls().len(), calls);
        assert_eq!(fixture.secrets.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_expiring_certificate_is_renewed() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            leaf_days: 10,
            ..FakeAcme::new()
        });
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));
        service.update(&request(&fixture, false)).await.expect("first");
        let account_key = fixture.secrets.snapshot().await["account|private-key"].clone();

        let outcome = service.update(&request(&fixture, false)).await.expect("second");
        assert!(matches!(outcome, CertificateOutcome::Issued { .. }));
        assert_eq!(
            acme.calls().iter().filter(|c| *c == "finalize").count(),
            2
        );
        // The account key is generated once
        assert_eq!(
            fixture.secrets.snapshot().await["account|private-key"],
            account_key
        );
    }

    #[tokio::test]
    async fn test_staging_uses_its_own_directory_and_namespace() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme::new());
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));

        service.update(&request(&fixture, true)).await.expect("update");
        assert_eq!(acme.calls()[0], "login fake://staging");
        let secrets = fixture.secrets.snapshot().await;
        assert!(secrets.contains_key("www.example.com-staging|cert"));
        assert!(!secrets.contains_key("www.example.com|cert"));
    }

    #[tokio::test]
    async fn test_valid_authorization_skips_challenge() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            authorization_status: STATUS_VALID.to_string(),
            ..FakeAcme::new()
        });
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));

        service.update(&request(&fixture, false)).await.expect("update");
        assert!(!acme.calls().iter().any(|c| c == "trigger_challenge"));
        let records = fixture
            .provider
            .list_entries(&fixture.zone)
            .await
            .expect("records");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_dns_challenge_lists_offered_types() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            challenge_types: vec!["http-01".to_string(), "tls-alpn-01".to_string()],
            ..FakeAcme::new()
        });
        let service = service(acme, Arc::new(fixture.provider.clone()));

        match service.update(&request(&fixture, false)).await {
            Err(AcmeError::MissingDnsChallenge { domain, available }) => {
                assert_eq!(domain, DOMAIN);
                assert_eq!(available, vec!["http-01", "tls-alpn-01"]);
            }
            other => panic!("expected missing challenge, got {other:?}"),
        }
        assert!(!fixture
            .secrets
            .snapshot()
            .await
            .contains_key("www.example.com|cert"));
    }

    #[tokio::test]
    async fn test_invalid_challenge_stores_nothing() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            challenge_result: STATUS_INVALID.to_string(),
            ..FakeAcme::new()
        });
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));

        match service.update(&request(&fixture, false)).await {
            Err(AcmeError::ChallengeInvalid { detail, .. }) => {
                assert_eq!(detail, "TXT record not found");
            }
            other => panic!("expected invalid challenge, got {other:?}"),
        }
        assert!(!acme.calls().iter().any(|c| c == "finalize"));
        let secrets = fixture.secrets.snapshot().await;
        assert_eq!(secrets.keys().collect::<Vec<_>>(), vec!["account|private-key"]);
    }

    #[tokio::test]
    async fn test_order_never_valid_times_out() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            order_statuses: Mutex::new(vec!["processing".to_string(); 10]),
            ..FakeAcme::new()
        });
        let settings = LetsEncryptSettings {
            order_poll_attempts: 3,
            ..LetsEncryptSettings::immediate()
        };
        let service = LetsEncryptService::new(acme.clone(), Arc::new(fixture.provider.clone()), settings);

        match service.update(&request(&fixture, false)).await {
            Err(AcmeError::FinalizeTimeout {
                attempts, status, ..
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(status, "processing");
            }
            other => panic!("expected finalize timeout, got {other:?}"),
        }
        assert_eq!(acme.calls().iter().filter(|c| *c == "order").count(), 3);
        assert!(!acme.calls().iter().any(|c| c == "certificate"));
    }

    #[tokio::test]
    async fn test_invalid_order_is_fatal() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme {
            order_statuses: Mutex::new(vec![STATUS_INVALID.to_string()]),
            ..FakeAcme::new()
        });
        let service = service(acme, Arc::new(fixture.provider.clone()));

        assert!(matches!(
            service.update(&request(&fixture, false)).await,
            Err(AcmeError::OrderInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_domain_outside_zone_is_rejected() {
        let fixture = fixture("example.org").await;
        let acme = Arc::new(FakeAcme::new());
        let service = service(acme.clone(), Arc::new(fixture.provider.clone()));

        match service.update(&request(&fixture, false)).await {
            Err(AcmeError::OutsideZone { name, zone }) => {
                assert_eq!(name, "_acme-challenge.www.example.com");
                assert_eq!(zone, "example.org");
            }
            other => panic!("expected outside zone, got {other:?}"),
        }
        assert!(!acme.calls().iter().any(|c| c == "trigger_challenge"));
    }

    #[tokio::test]
    async fn test_dns_wait_is_bounded_when_configured() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme::new());
        let settings = LetsEncryptSettings {
            dns_max_wait: Some(Duration::ZERO),
            ..LetsEncryptSettings::immediate()
        };
        let service = LetsEncryptService::new(acme.clone(), Arc::new(EmptyLookup), settings);

        match service.update(&request(&fixture, false)).await {
            Err(AcmeError::DnsWaitTimeout { name, .. }) => {
                assert_eq!(name, "_acme-challenge.www.example.com");
            }
            other => panic!("expected DNS wait timeout, got {other:?}"),
        }
        assert!(!acme.calls().iter().any(|c| c == "trigger_challenge"));
    }

    #[tokio::test]
    async fn test_certificate_is_pushed_to_web_app() {
        let fixture = fixture("example.com").await;
        let acme = Arc::new(FakeAcme::new());
        let service = service(acme, Arc::new(fixture.provider.clone()));
        let web_app = WebApp::new("app1", "plan1");

        let web_apps: &dyn WebAppProvider = &fixture.provider;
        let mut request = request(&fixture, false);
        request.web_app = Some((web_apps, &web_app));
        let outcome = service.update(&request).await.expect("update");
        assert!(matches!(outcome, CertificateOutcome::Issued { pushed: true, .. }));

        let (pfx, password) = fixture
            .provider
            .pushed_certificate(DOMAIN)
            .await
            .expect("pushed");
        let secrets = fixture.secrets.snapshot().await;
        assert_eq!(password, secrets["www.example.com|pfx-password"]);
        let parsed = Pkcs12::from_der(&pfx)
            .expect("der")
            .parse2(&password)
            .expect("parse");
        assert!(parsed.cert.is_some());
        assert!(parsed.pkey.is_some());
    }
}
