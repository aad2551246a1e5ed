// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Let's Encrypt certificates through DNS-01 challenges.
//!
//! [`LetsEncryptService::update`] runs the whole issuance:
//!
//! 1. Load (or generate and store) the ACME account key
//! 2. Keep the stored certificate if it is complete and not about to expire
//! 3. Log in, order a certificate and pick the dns-01 challenge
//! 4. Publish the challenge digest as `_acme-challenge.<domain>` TXT
//! 5. Wait until the record is visible through DNS
//! 6. Trigger the challenge and wait until it is valid
//! 7. Finalize the order with a fresh key and wait until it is valid
//! 8. Store the CA chain, certificate, key pair and a new PFX password
//! 9. Optionally push a PKCS#12 bundle to a web app
//!
//! Secrets are only written once the certificate has been downloaded, so a
//! failed issuance leaves the previous bundle untouched.

pub mod acme;
pub mod certs;

use crate::config::LetsEncryptSettings;
use crate::constants::{
    ACCOUNT_SECRET_NAMESPACE, ACME_CHALLENGE_LABEL, ACME_CHALLENGE_TTL_SECS,
    LETSENCRYPT_PRODUCTION_DIRECTORY, LETSENCRYPT_STAGING_DIRECTORY, SECRET_ACCOUNT_PRIVATE_KEY,
    SECRET_CA_CERT, SECRET_CERT, SECRET_PFX_PASSWORD, SECRET_PRIVATE_KEY, SECRET_PUBLIC_KEY,
    STAGING_NAMESPACE_SUFFIX,
};
use crate::dns::apply::set_entry;
use crate::dns::lookup::DnsLookup;
use crate::dns::{DnsRecordType, RawDnsEntry};
use crate::errors::AcmeError;
use crate::providers::{DnsZoneProvider, SecretStore, WebAppProvider};
use crate::resources::{DnsZone, WebApp};
use acme::{AcmeAccount, AcmeConnector, Order, DNS_01, STATUS_INVALID, STATUS_VALID};
use chrono::{DateTime, Utc};
use openssl::pkey::{PKey, Private};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Secret namespace of the certificate of `domain`.
#[must_use]
pub fn certificate_namespace(domain: &str, staging: bool) -> String {
    if staging {
        format!("{domain}{STAGING_NAMESPACE_SUFFIX}")
    } else {
        domain.to_string()
    }
}

/// Name of the TXT record holding the dns-01 digest of `domain`.
#[must_use]
pub fn challenge_record_name(domain: &str) -> String {
    format!("{ACME_CHALLENGE_LABEL}.{domain}")
}

/// Certificate artifacts as kept in a secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    pub ca_cert: String,
    pub cert: String,
    pub public_key: String,
    pub private_key: String,
    pub pfx_password: String,
}

impl CertificateBundle {
    /// Load the bundle of `namespace`; `None` unless the certificate, both
    /// keys and the PFX password are all present.
    ///
    /// # Errors
    ///
    /// Returns [`AcmeError::Provider`] when the store cannot be read.
    pub async fn load(store: &dyn SecretStore, namespace: &str) -> Result<Option<Self>, AcmeError> {
        let cert = store.get_text(namespace, SECRET_CERT).await?;
        let public_key = store.get_text(namespace, SECRET_PUBLIC_KEY).await?;
        let private_key = store.get_text(namespace, SECRET_PRIVATE_KEY).await?;
        let pfx_password = store.get_text(namespace, SECRET_PFX_PASSWORD).await?;
        let (Some(cert), Some(public_key), Some(private_key), Some(pfx_password)) =
            (cert, public_key, private_key, pfx_password)
        else {
            return Ok(None);
        };
        let ca_cert = store
            .get_text(namespace, SECRET_CA_CERT)
            .await?
            .unwrap_or_default();
        Ok(Some(Self {
            ca_cert,
            cert,
            public_key,
            private_key,
            pfx_password,
        }))
    }

    /// Write every artifact to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`AcmeError::Provider`] on the first failed write.
    pub async fn store(&self, store: &dyn SecretStore, namespace: &str) -> Result<(), AcmeError> {
        store.set_text_or_fail(namespace, SECRET_CA_CERT, &self.ca_cert).await?;
        store.set_text_or_fail(namespace, SECRET_CERT, &self.cert).await?;
        store.set_text_or_fail(namespace, SECRET_PUBLIC_KEY, &self.public_key).await?;
        store.set_text_or_fail(namespace, SECRET_PRIVATE_KEY, &self.private_key).await?;
        store.set_text_or_fail(namespace, SECRET_PFX_PASSWORD, &self.pfx_password).await?;
        Ok(())
    }

    /// PKCS#12 bundle of the certificate, protected by the stored password.
    ///
    /// # Errors
    ///
    /// Returns [`AcmeError::Crypto`] when the artifacts do not parse.
    pub fn pfx(&self, friendly_name: &str) -> Result<Vec<u8>, AcmeError> {
        certs::build_pfx(
            friendly_name,
            &self.cert,
            &self.ca_cert,
            &self.private_key,
            &self.pfx_password,
        )
    }
}

/// Where the certificate is requested and kept.
pub struct CertificateRequest<'a> {
    pub domain: &'a str,
    /// Zone that receives the challenge record
    pub zone: &'a DnsZone,
    pub dns: &'a dyn DnsZoneProvider,
    pub secrets: &'a dyn SecretStore,
    /// Web app the certificate is pushed to, bound to `domain`
    pub web_app: Option<(&'a dyn WebAppProvider, &'a WebApp)>,
    pub staging: bool,
    pub email: &'a str,
}

/// What [`LetsEncryptService::update`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutcome {
    /// The stored certificate is still valid long enough
    Kept { expires_at: DateTime<Utc> },
    /// A new certificate was issued and stored
    Issued { expires_at: DateTime<Utc>, pushed: bool },
}

/// Issues certificates through an [`AcmeConnector`].
pub struct LetsEncryptService {
    acme: Arc<dyn AcmeConnector>,
    lookup: Arc<dyn DnsLookup>,
    settings: LetsEncryptSettings,
    production_directory: String,
    staging_directory: String,
}

impl LetsEncryptService {
    pub fn new(
        acme: Arc<dyn AcmeConnector>,
        lookup: Arc<dyn DnsLookup>,
        settings: LetsEncryptSettings,
    ) -> Self {
        Self {
            acme,
            lookup,
            settings,
            production_directory: LETSENCRYPT_PRODUCTION_DIRECTORY.to_string(),
            staging_directory: LETSENCRYPT_STAGING_DIRECTORY.to_string(),
        }
    }

    /// Use other ACME directories (e.g. a test server).
    #[must_use]
    pub fn with_directories(
        mut self,
        production: impl Into<String>,
        staging: impl Into<String>,
    ) -> Self {
        self.production_directory = production.into();
        self.staging_directory = staging.into();
        self
    }

    fn directory_url(&self, staging: bool) -> &str {
        if staging {
            &self.staging_directory
        } else {
            &self.production_directory
        }
    }

    /// Make sure a valid certificate for `request.domain` is stored, issuing
    /// one when needed.
    ///
    /// # Errors
    ///
    /// Any [`AcmeError`]; nothing of a failed issuance is stored.
    pub async fn update(
        &self,
        request: &CertificateRequest<'_>,
    ) -> Result<CertificateOutcome, AcmeError> {
        let domain = request.domain;
        let account_key = self.account_key(request.secrets).await?;

        let namespace = certificate_namespace(domain, request.staging);
        if let Some(expires_at) = self.reusable_expiry(request.secrets, &namespace).await? {
            info!(domain = %domain, expires_at = %expires_at, "Certificate still valid, keeping it");
            return Ok(CertificateOutcome::Kept { expires_at });
        }

        let account = self
            .acme
            .login(self.directory_url(request.staging), &account_key, request.email)
            .await?;
        let order = self.acme.new_order(&account, domain).await?;
        self.validate_authorizations(&account, &order, request).await?;

        let (chain, certificate_key) = self.finalize(&account, &order, domain).await?;
        let (cert, ca_cert) = certs::split_chain(&chain)?;
        let expires_at = certs::certificate_expiry(&cert)?;
        let bundle = CertificateBundle {
            ca_cert,
            cert,
            public_key: certs::public_key_pem(&certificate_key)?,
            private_key: certs::private_key_pem(&certificate_key)?,
            pfx_password: certs::generate_pfx_password(),
        };
        bundle.store(request.secrets, &namespace).await?;
        info!(domain = %domain, namespace = %namespace, expires_at = %expires_at, "Stored new certificate");

        let pushed = match request.web_app {
            Some((provider, web_app)) => {
                let pfx = bundle.pfx(domain)?;
                provider
                    .push_certificate(web_app, domain, &pfx, &bundle.pfx_password)
                    .await?;
                info!(domain = %domain, web_app = %web_app.name, "Pushed certificate to web app");
                true
            }
            None => false,
        };
        Ok(CertificateOutcome::Issued { expires_at, pushed })
    }

    async fn account_key(&self, secrets: &dyn SecretStore) -> Result<PKey<Private>, AcmeError> {
        if let Some(pem) = secrets
            .get_text(ACCOUNT_SECRET_NAMESPACE, SECRET_ACCOUNT_PRIVATE_KEY)
            .await?
        {
            return certs::load_private_key(&pem);
        }
        info!("Generating ACME account key");
        let key = certs::generate_key(self.settings.key_bits)?;
        secrets
            .set_text_or_fail(
                ACCOUNT_SECRET_NAMESPACE,
                SECRET_ACCOUNT_PRIVATE_KEY,
                &certs::private_key_pem(&key)?,
            )
            .await?;
        Ok(key)
    }

    /// Expiry of the stored certificate when it can be kept.
    async fn reusable_expiry(
        &self,
        secrets: &dyn SecretStore,
        namespace: &str,
    ) -> Result<Option<DateTime<Utc>>, AcmeError> {
        let Some(bundle) = CertificateBundle::load(secrets, namespace).await? else {
            debug!(namespace = %namespace, "No complete certificate stored");
            return Ok(None);
        };
        let expires_at = match certs::certificate_expiry(&bundle.cert) {
            Ok(expires_at) => expires_at,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Stored certificate unreadable, reissuing");
                return Ok(None);
            }
        };
        if expires_at - Utc::now() > self.settings.renew_before {
            Ok(Some(expires_at))
        } else {
            info!(namespace = %namespace, expires_at = %expires_at, "Certificate expires soon, renewing");
            Ok(None)
        }
    }

    async fn validate_authorizations(
        &self,
        account: &AcmeAccount,
        order: &Order,
        request: &CertificateRequest<'_>,
    ) -> Result<(), AcmeError> {
        for url in &order.authorizations {
            let authorization = self.acme.authorization(account, url).await?;
            if authorization.status == STATUS_VALID {
                debug!(domain = %authorization.identifier.value, "Authorization already valid");
                continue;
            }
            let Some(challenge) = authorization
                .challenges
                .iter()
                .find(|c| c.challenge_type == DNS_01)
            else {
                return Err(AcmeError::MissingDnsChallenge {
                    domain: authorization.identifier.value.clone(),
                    available: authorization
                        .challenges
                        .iter()
                        .map(|c| c.challenge_type.clone())
                        .collect(),
                });
            };

            let digest = acme::dns_challenge_digest(&challenge.token, &account.key)?;
            let record_name = challenge_record_name(&authorization.identifier.value);
            self.publish_challenge(request, &record_name, &digest).await?;
            self.wait_for_txt(&record_name, &digest).await?;

            self.acme.trigger_challenge(account, &challenge.url).await?;
            self.wait_for_challenge(account, &challenge.url, &authorization.identifier.value)
                .await?;
        }
        Ok(())
    }

    async fn publish_challenge(
        &self,
        request: &CertificateRequest<'_>,
        record_name: &str,
        digest: &str,
    ) -> Result<(), AcmeError> {
        let entry = RawDnsEntry::new(
            record_name,
            DnsRecordType::TXT,
            digest,
            ACME_CHALLENGE_TTL_SECS,
        );
        let written = set_entry(
            request.dns,
            request.zone,
            record_name,
            DnsRecordType::TXT,
            &[entry],
        )
        .await?;
        if !written {
            return Err(AcmeError::OutsideZone {
                name: record_name.to_string(),
                zone: request.zone.name.clone(),
            });
        }
        info!(record = %record_name, "Published dns-01 challenge");
        Ok(())
    }

    async fn wait_for_txt(&self, record_name: &str, digest: &str) -> Result<(), AcmeError> {
        let started = Instant::now();
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            match self.lookup.lookup_txt(record_name).await {
                Ok(values) if values.iter().any(|v| v == digest) => {
                    info!(record = %record_name, attempt = attempt, "Challenge record visible");
                    return Ok(());
                }
                Ok(values) => {
                    debug!(record = %record_name, attempt = attempt, values = ?values, "Challenge record not visible yet");
                }
                Err(e) => {
                    warn!(record = %record_name, attempt = attempt, error = %e, "Challenge record lookup failed");
                }
            }
            if let Some(max_wait) = self.settings.dns_max_wait {
                if started.elapsed() >= max_wait {
                    return Err(AcmeError::DnsWaitTimeout {
                        name: record_name.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }
            tokio::time::sleep(self.settings.dns_poll_interval).await;
        }
    }

    async fn wait_for_challenge(
        &self,
        account: &AcmeAccount,
        url: &str,
        domain: &str,
    ) -> Result<(), AcmeError> {
        loop {
            let challenge = self.acme.challenge(account, url).await?;
            match challenge.status.as_str() {
                STATUS_VALID => {
                    info!(domain = %domain, "Challenge valid");
                    return Ok(());
                }
                STATUS_INVALID => {
                    return Err(AcmeError::ChallengeInvalid {
                        domain: domain.to_string(),
                        detail: challenge.error.map(|p| p.detail).unwrap_or_default(),
                    });
                }
                status => {
                    debug!(domain = %domain, status = %status, "Waiting for challenge validation");
                    tokio::time::sleep(self.settings.challenge_poll_interval).await;
                }
            }
        }
    }

    /// Finalize `order` with a new key; returns the PEM chain and that key.
    async fn finalize(
        &self,
        account: &AcmeAccount,
        order: &Order,
        domain: &str,
    ) -> Result<(String, PKey<Private>), AcmeError> {
        let key = certs::generate_key(self.settings.key_bits)?;
        let csr = certs::build_csr(domain, &key)?;
        let mut current = self.acme.finalize(account, order, &csr).await?;

        let attempts = self.settings.order_poll_attempts;
        for attempt in 1..=attempts {
            match current.status.as_str() {
                STATUS_VALID => break,
                STATUS_INVALID => {
                    return Err(AcmeError::OrderInvalid {
                        domain: domain.to_string(),
                        detail: current.error.map(|p| p.detail).unwrap_or_default(),
                    });
                }
                status => {
                    debug!(domain = %domain, status = %status, attempt = attempt, "Waiting for order");
                    tokio::time::sleep(self.settings.order_poll_interval).await;
                    current = self.acme.order(account, &order.url).await?;
                }
            }
        }

        if current.status == STATUS_INVALID {
            return Err(AcmeError::OrderInvalid {
                domain: domain.to_string(),
                detail: current.error.map(|p| p.detail).unwrap_or_default(),
            });
        }
        let certificate_url = match current.certificate {
            Some(url) if current.status == STATUS_VALID => url,
            _ => {
                return Err(AcmeError::FinalizeTimeout {
                    domain: domain.to_string(),
                    attempts,
                    status: current.status,
                })
            }
        };
        let chain = self.acme.certificate(account, &certificate_url).await?;
        info!(domain = %domain, "Certificate issued");
        Ok((chain, key))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
