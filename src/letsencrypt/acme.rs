// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! ACME (RFC 8555) client.
//!
//! [`AcmeConnector`] is the protocol surface the issuance flow needs;
//! [`HttpAcmeClient`] implements it over HTTPS with RS256-signed JWS
//! requests. Every request after the account lookup is authenticated with
//! the account URL (`kid`); the account lookup itself carries the public
//! key (`jwk`).

use crate::errors::{AcmeError, ProviderError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const JOSE_CONTENT_TYPE: &str = "application/jose+json";
const PEM_CHAIN_CONTENT_TYPE: &str = "application/pem-certificate-chain";
const REPLAY_NONCE: &str = "replay-nonce";
const BAD_NONCE: &str = "urn:ietf:params:acme:error:badNonce";

/// Status values shared by orders, authorizations and challenges.
pub const STATUS_VALID: &str = "valid";
pub const STATUS_INVALID: &str = "invalid";

/// Challenge type published through a TXT record.
pub const DNS_01: &str = "dns-01";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub new_nonce: String,
    pub new_account: String,
    pub new_order: String,
}

/// ACME problem document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub problem_type: String,
    #[serde(default)]
    pub detail: String,
}

/// Logged-in account: its key, its URL and the directory it belongs to.
#[derive(Debug, Clone)]
pub struct AcmeAccount {
    pub key: PKey<Private>,
    pub kid: String,
    pub directory: Directory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order URL, from the `Location` header of the creation response
    #[serde(skip)]
    pub url: String,
    pub status: String,
    #[serde(default)]
    pub authorizations: Vec<String>,
    pub finalize: String,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub error: Option<Problem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub identifier_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub identifier: Identifier,
    pub status: String,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: String,
    pub url: String,
    pub status: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub error: Option<Problem>,
}

/// ACME operations used by the issuance flow.
#[async_trait]
pub trait AcmeConnector: Send + Sync {
    /// Find or register the account of `key` on the directory at `directory_url`.
    async fn login(
        &self,
        directory_url: &str,
        key: &PKey<Private>,
        email: &str,
    ) -> Result<AcmeAccount, AcmeError>;

    async fn new_order(&self, account: &AcmeAccount, domain: &str) -> Result<Order, AcmeError>;

    async fn authorization(&self, account: &AcmeAccount, url: &str)
        -> Result<Authorization, AcmeError>;

    /// Tell the server the challenge is ready to be validated.
    async fn trigger_challenge(&self, account: &AcmeAccount, url: &str)
        -> Result<Challenge, AcmeError>;

    async fn challenge(&self, account: &AcmeAccount, url: &str) -> Result<Challenge, AcmeError>;

    /// Submit a DER CSR to the finalize URL of `order`.
    async fn finalize(
        &self,
        account: &AcmeAccount,
        order: &Order,
        csr_der: &[u8],
    ) -> Result<Order, AcmeError>;

    async fn order(&self, account: &AcmeAccount, url: &str) -> Result<Order, AcmeError>;

    /// Download the PEM certificate chain.
    async fn certificate(&self, account: &AcmeAccount, url: &str) -> Result<String, AcmeError>;
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Public JWK of an RSA key, members in lexicographic order.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the key is not RSA.
pub fn jwk(key: &PKey<Private>) -> Result<Value, AcmeError> {
    let rsa = key.rsa()?;
    Ok(json!({
        "e": b64(&rsa.e().to_vec()),
        "kty": "RSA",
        "n": b64(&rsa.n().to_vec()),
    }))
}

/// RFC 7638 thumbprint of the JWK of `key`.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the key is not RSA.
pub fn jwk_thumbprint(key: &PKey<Private>) -> Result<String, AcmeError> {
    let canonical = jwk(key)?.to_string();
    Ok(b64(&Sha256::digest(canonical.as_bytes())))
}

/// TXT value proving control of the domain for a dns-01 challenge.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the key is not RSA.
pub fn dns_challenge_digest(token: &str, key: &PKey<Private>) -> Result<String, AcmeError> {
    let key_authorization = format!("{token}.{}", jwk_thumbprint(key)?);
    Ok(b64(&Sha256::digest(key_authorization.as_bytes())))
}

/// Flattened JWS, RS256. An absent payload signs the empty string (POST-as-GET).
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if signing fails.
pub fn sign_jws(
    key: &PKey<Private>,
    protected: &Value,
    payload: Option<&Value>,
) -> Result<Value, AcmeError> {
    let protected = b64(protected.to_string().as_bytes());
    let payload = payload.map_or_else(String::new, |p| b64(p.to_string().as_bytes()));
    let mut signer = Signer::new(MessageDigest::sha256(), key)?;
    signer.update(format!("{protected}.{payload}").as_bytes())?;
    let signature = b64(&signer.sign_to_vec()?);
    Ok(json!({
        "protected": protected,
        "payload": payload,
        "signature": signature,
    }))
}

struct AcmeResponse {
    location: Option<String>,
    body: String,
}

/// Identity a request is signed with.
enum Signature<'a> {
    Jwk(&'a PKey<Private>),
    Kid(&'a AcmeAccount),
}

/// [`AcmeConnector`] over HTTPS.
pub struct HttpAcmeClient {
    http: HttpClient,
    nonce: Mutex<Option<String>>,
}

impl HttpAcmeClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            nonce: Mutex::new(None),
        }
    }

    fn connection_error(url: &str, e: &reqwest::Error) -> AcmeError {
        AcmeError::Provider(ProviderError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn directory(&self, directory_url: &str) -> Result<Directory, AcmeError> {
        let response = self
            .http
            .get(directory_url)
            .send()
            .await
            .map_err(|e| Self::connection_error(directory_url, &e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::connection_error(directory_url, &e))?;
        if !status.is_success() {
            return Err(problem(directory_url, status, &body));
        }
        parse(directory_url, &body)
    }

    async fn fresh_nonce(&self, new_nonce_url: &str) -> Result<String, AcmeError> {
        if let Some(nonce) = self.nonce.lock().await.take() {
            return Ok(nonce);
        }
        let response = self
            .http
            .head(new_nonce_url)
            .send()
            .await
            .map_err(|e| Self::connection_error(new_nonce_url, &e))?;
        header(&response, REPLAY_NONCE).ok_or_else(|| AcmeError::Protocol {
            url: new_nonce_url.to_string(),
            problem_type: "missingNonce".to_string(),
            detail: "No Replay-Nonce header".to_string(),
        })
    }

    async fn post(
        &self,
        directory: &Directory,
        signature: Signature<'_>,
        url: &str,
        payload: Option<&Value>,
        accept: Option<&str>,
    ) -> Result<AcmeResponse, AcmeError> {
        // One retry when the server rejects the nonce
        let mut retried = false;
        loop {
            let nonce = self.fresh_nonce(&directory.new_nonce).await?;
            let (key, mut protected) = match &signature {
                Signature::Jwk(key) => (*key, json!({ "alg": "RS256", "jwk": jwk(key)? })),
                Signature::Kid(account) => {
                    (&account.key, json!({ "alg": "RS256", "kid": account.kid }))
                }
            };
            protected["nonce"] = json!(nonce);
            protected["url"] = json!(url);
            let body = sign_jws(key, &protected, payload)?;

            debug!(url = %url, "ACME request");
            let mut request = self
                .http
                .post(url)
                .header(CONTENT_TYPE, JOSE_CONTENT_TYPE)
                .body(body.to_string());
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Self::connection_error(url, &e))?;

            if let Some(nonce) = header(&response, REPLAY_NONCE) {
                *self.nonce.lock().await = Some(nonce);
            }
            let status = response.status();
            let location = header(&response, LOCATION.as_str());
            let text = response
                .text()
                .await
                .map_err(|e| Self::connection_error(url, &e))?;

            if status.is_success() {
                return Ok(AcmeResponse {
                    location,
                    body: text,
                });
            }
            let error = problem(url, status, &text);
            if !retried && matches!(&error, AcmeError::Protocol { problem_type, .. } if problem_type == BAD_NONCE)
            {
                warn!(url = %url, "Nonce rejected, retrying");
                retried = true;
                continue;
            }
            return Err(error);
        }
    }
}

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn problem(url: &str, status: StatusCode, body: &str) -> AcmeError {
    let problem: Problem = serde_json::from_str(body).unwrap_or_else(|_| Problem {
        problem_type: format!("HTTP {}", status.as_u16()),
        detail: body.to_string(),
    });
    AcmeError::Protocol {
        url: url.to_string(),
        problem_type: problem.problem_type,
        detail: problem.detail,
    }
}

fn parse<T: for<'de> Deserialize<'de>>(url: &str, body: &str) -> Result<T, AcmeError> {
    serde_json::from_str(body).map_err(|e| {
        AcmeError::Provider(ProviderError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    })
}

#[async_trait]
impl AcmeConnector for HttpAcmeClient {
    async fn login(
        &self,
        directory_url: &str,
        key: &PKey<Private>,
        email: &str,
    ) -> Result<AcmeAccount, AcmeError> {
        let directory = self.directory(directory_url).await?;
        let payload = json!({
            "termsOfServiceAgreed": true,
            "contact": [format!("mailto:{email}")],
        });
        let url = directory.new_account.clone();
        let response = self
            .post(&directory, Signature::Jwk(key), &url, Some(&payload), None)
            .await?;
        let kid = response.location.ok_or_else(|| AcmeError::Protocol {
            url: url.clone(),
            problem_type: "missingLocation".to_string(),
            detail: "Account response has no Location header".to_string(),
        })?;
        info!(account = %kid, "Logged in to ACME directory");
        Ok(AcmeAccount {
            key: key.clone(),
            kid,
            directory,
        })
    }

    async fn new_order(&self, account: &AcmeAccount, domain: &str) -> Result<Order, AcmeError> {
        let payload = json!({ "identifiers": [{ "type": "dns", "value": domain }] });
        let url = account.directory.new_order.clone();
        let response = self
            .post(&account.directory, Signature::Kid(account), &url, Some(&payload), None)
            .await?;
        let mut order: Order = parse(&url, &response.body)?;
        order.url = response.location.ok_or_else(|| AcmeError::Protocol {
            url: url.clone(),
            problem_type: "missingLocation".to_string(),
            detail: "Order response has no Location header".to_string(),
        })?;
        info!(domain = %domain, order = %order.url, status = %order.status, "Created ACME order");
        Ok(order)
    }

    async fn authorization(
        &self,
        account: &AcmeAccount,
        url: &str,
    ) -> Result<Authorization, AcmeError> {
        let response = self
            .post(&account.directory, Signature::Kid(account), url, None, None)
            .await?;
        parse(url, &response.body)
    }

    async fn trigger_challenge(
        &self,
        account: &AcmeAccount,
        url: &str,
    ) -> Result<Challenge, AcmeError> {
        let response = self
            .post(&account.directory, Signature::Kid(account), url, Some(&json!({})), None)
            .await?;
        parse(url, &response.body)
    }

    async fn challenge(&self, account: &AcmeAccount, url: &str) -> Result<Challenge, AcmeError> {
        let response = self
            .post(&account.directory, Signature::Kid(account), url, None, None)
            .await?;
        parse(url, &response.body)
    }

    async fn finalize(
        &self,
        account: &AcmeAccount,
        order: &Order,
        csr_der: &[u8],
    ) -> Result<Order, AcmeError> {
        let payload = json!({ "csr": b64(csr_der) });
        let response = self
            .post(
                &account.directory,
                Signature::Kid(account),
                &order.finalize,
                Some(&payload),
                None,
            )
            .await?;
        let mut finalized: Order = parse(&order.finalize, &response.body)?;
        finalized.url.clone_from(&order.url);
        Ok(finalized)
    }

    async fn order(&self, account: &AcmeAccount, url: &str) -> Result<Order, AcmeError> {
        let response = self
            .post(&account.directory, Signature::Kid(account), url, None, None)
            .await?;
        let mut order: Order = parse(url, &response.body)?;
        order.url = url.to_string();
        Ok(order)
    }

    async fn certificate(&self, account: &AcmeAccount, url: &str) -> Result<String, AcmeError> {
        let response = self
            .post(
                &account.directory,
                Signature::Kid(account),
                url,
                None,
                Some(PEM_CHAIN_CONTENT_TYPE),
            )
            .await?;
        Ok(response.body)
    }
}

#[cfg(test)]
#[path = "acme_tests.rs"]
mod acme_tests;
