// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key, CSR and certificate handling with `openssl`.

use crate::constants::PFX_PASSWORD_BYTES;
use crate::errors::AcmeError;
use chrono::{DateTime, Utc};
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509ReqBuilder, X509};
use rand::Rng;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Generate an RSA key pair of `bits` bits.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if key generation fails.
pub fn generate_key(bits: u32) -> Result<PKey<Private>, AcmeError> {
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

/// PKCS#8 PEM of a private key.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if encoding fails.
pub fn private_key_pem(key: &PKey<Private>) -> Result<String, AcmeError> {
    pem_text(key.private_key_to_pem_pkcs8()?)
}

/// SubjectPublicKeyInfo PEM of a key pair.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if encoding fails.
pub fn public_key_pem(key: &PKey<Private>) -> Result<String, AcmeError> {
    pem_text(key.public_key_to_pem()?)
}

/// Parse a private key PEM (PKCS#1 or PKCS#8).
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the PEM is not a private key.
pub fn load_private_key(pem: &str) -> Result<PKey<Private>, AcmeError> {
    Ok(PKey::private_key_from_pem(pem.as_bytes())?)
}

fn pem_text(bytes: Vec<u8>) -> Result<String, AcmeError> {
    String::from_utf8(bytes).map_err(|e| AcmeError::Certificate(format!("PEM is not UTF-8: {e}")))
}

/// DER certificate signing request for `domain`, signed with `key`.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the request cannot be built.
pub fn build_csr(domain: &str, key: &PKey<Private>) -> Result<Vec<u8>, AcmeError> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, domain)?;
    let name = name.build();

    let mut builder = X509ReqBuilder::new()?;
    builder.set_version(0)?;
    builder.set_subject_name(&name)?;
    builder.set_pubkey(key)?;

    let san = SubjectAlternativeName::new()
        .dns(domain)
        .build(&builder.x509v3_context(None))?;
    let mut extensions = Stack::new()?;
    extensions.push(san)?;
    builder.add_extensions(&extensions)?;

    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build().to_der()?)
}

/// Expiry (`notAfter`) of the first certificate of `pem`.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the PEM is not a certificate.
pub fn certificate_expiry(pem: &str) -> Result<DateTime<Utc>, AcmeError> {
    let certificate = X509::from_pem(pem.as_bytes())?;
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(certificate.not_after())?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| AcmeError::Certificate(format!("Expiry out of range: {seconds}")))
}

/// Split a PEM chain into the leaf certificate and the CA bundle.
///
/// # Errors
///
/// Returns [`AcmeError::Certificate`] when the chain is empty.
pub fn split_chain(pem_chain: &str) -> Result<(String, String), AcmeError> {
    let mut certificates = X509::stack_from_pem(pem_chain.as_bytes())?.into_iter();
    let leaf = certificates
        .next()
        .ok_or_else(|| AcmeError::Certificate("Empty certificate chain".to_string()))?;
    let leaf = pem_text(leaf.to_pem()?)?;
    let mut ca = String::new();
    for certificate in certificates {
        ca.push_str(&pem_text(certificate.to_pem()?)?);
    }
    Ok((leaf, ca))
}

/// Random PFX password: [`PFX_PASSWORD_BYTES`] random bytes, hex encoded.
#[must_use]
pub fn generate_pfx_password() -> String {
    let bytes: [u8; PFX_PASSWORD_BYTES] = rand::rng().random();
    bytes.iter().fold(String::with_capacity(PFX_PASSWORD_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// PKCS#12 bundle of a certificate, its CA chain and its private key.
///
/// Uses the legacy algorithms App Service imports (3DES for the key, RC2-40
/// for the certificates). Builds without the OpenSSL legacy provider fall
/// back to the library defaults.
///
/// # Errors
///
/// Returns [`AcmeError::Crypto`] if the inputs do not parse or the bundle
/// cannot be built.
pub fn build_pfx(
    friendly_name: &str,
    cert_pem: &str,
    ca_pem: &str,
    private_key_pem: &str,
    password: &str,
) -> Result<Vec<u8>, AcmeError> {
    let key = load_private_key(private_key_pem)?;
    let cert = X509::from_pem(cert_pem.as_bytes())?;

    match pkcs12(friendly_name, &key, &cert, ca_pem, password, true) {
        Ok(der) => Ok(der),
        Err(e) => {
            warn!(error = %e, "Legacy PKCS#12 algorithms unavailable, using defaults");
            pkcs12(friendly_name, &key, &cert, ca_pem, password, false)
        }
    }
}

fn pkcs12(
    friendly_name: &str,
    key: &PKey<Private>,
    cert: &X509,
    ca_pem: &str,
    password: &str,
    legacy: bool,
) -> Result<Vec<u8>, AcmeError> {
    let mut ca = Stack::new()?;
    if !ca_pem.trim().is_empty() {
        for certificate in X509::stack_from_pem(ca_pem.as_bytes())? {
            ca.push(certificate)?;
        }
    }

    let mut builder = Pkcs12::builder();
    builder.name(friendly_name).pkey(key).cert(cert).ca(ca);
    if legacy {
        builder
            .key_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
            .cert_algorithm(Nid::PBE_WITHSHA1AND40BITRC2_CBC);
    }
    let der = builder.build2(password)?.to_der()?;
    debug!(name = %friendly_name, legacy = legacy, bytes = der.len(), "Built PKCS#12 bundle");
    Ok(der)
}

#[cfg(test)]
#[path = "certs_tests.rs"]
mod certs_tests;
