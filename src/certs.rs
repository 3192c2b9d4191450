// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate primitives for the webhook serving stack.
//!
//! Pure functions over PEM strings: self-signed CA issuance, leaf serving
//! certificates, renewal predicates and trust bundle maintenance. All of the
//! time-driven policy lives in [`crate::cert_rotation`]; this module never
//! reads a clock on its own, every function takes the evaluation instant as
//! an argument so the rotation invariants are unit-testable.

use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use thiserror::Error;
use ::time::{Duration, OffsetDateTime};
use x509_parser::prelude::*;

/// Fraction of total lifetime under which a certificate is due for renewal.
///
/// A certificate with less than one fifth of its validity window remaining
/// is rotated ahead of expiry.
const RENEWAL_FRACTION: i64 = 5;

/// PKI errors
#[derive(Debug, Error)]
pub enum PkiError {
    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate generation failed
    #[error("certificate generation failed: {0}")]
    CertificateGeneration(String),

    /// Certificate or key parsing error
    #[error("certificate parsing error: {0}")]
    Parse(String),
}

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, PkiError>;

/// A PEM-encoded certificate and its private key.
#[derive(Clone, Debug)]
pub struct CertKeyPair {
    /// PEM-encoded certificate
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: String,
}

/// Parsed identity and validity window of a certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject common name
    pub subject_cn: String,
    /// Issuer common name
    pub issuer_cn: String,
    /// Validity start, unix seconds
    pub not_before: i64,
    /// Validity end, unix seconds
    pub not_after: i64,
}

impl CertInfo {
    /// Whether the certificate is within its validity window at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Whether the certificate is due for renewal at `now`.
    ///
    /// True outside the validity window or once the remaining validity drops
    /// below the renewal fraction of the total lifetime.
    #[must_use]
    pub fn needs_rotation(&self, now: i64) -> bool {
        if !self.is_valid_at(now) {
            return true;
        }
        let lifetime = self.not_after - self.not_before;
        let remaining = self.not_after - now;
        remaining * RENEWAL_FRACTION < lifetime
    }
}

/// Generate a fresh self-signed signing CA.
///
/// The common name is `<prefix>@<epoch>` so every generation of the signer
/// is distinguishable in the trust bundle.
pub fn generate_signing_cert(
    prefix: &str,
    validity: std::time::Duration,
    now: OffsetDateTime,
) -> Result<CertKeyPair> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(format!("{prefix}@{}", now.unix_timestamp())),
    );
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    params.not_before = now;
    params.not_after = now + to_time_duration(validity);

    let key_pair = KeyPair::generate()
        .map_err(|e| PkiError::KeyGeneration(format!("failed to generate CA key: {e}")))?;
    let key_pem = key_pair.serialize_pem();

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| PkiError::CertificateGeneration(format!("failed to create CA cert: {e}")))?;

    Ok(CertKeyPair {
        cert_pem: cert.pem(),
        key_pem,
    })
}

/// Issue a leaf serving certificate signed by `signer`.
///
/// The leaf's validity is clamped to the signer's `NotAfter`: a serving
/// certificate must always expire no later than the CA that vouches for it.
pub fn issue_serving_cert(
    signer: &CertKeyPair,
    hosts: &[String],
    validity: std::time::Duration,
    now: OffsetDateTime,
) -> Result<CertKeyPair> {
    let Some(first_host) = hosts.first() else {
        return Err(PkiError::CertificateGeneration(
            "no hosts for serving certificate".to_string(),
        ));
    };

    let signer_info = cert_info(&signer.cert_pem)?;
    let requested_end = now + to_time_duration(validity);
    let signer_end = OffsetDateTime::from_unix_timestamp(signer_info.not_after)
        .map_err(|e| PkiError::Parse(format!("signer NotAfter out of range: {e}")))?;

    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(first_host.clone()));
    params.distinguished_name = dn;

    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.not_before = now;
    params.not_after = requested_end.min(signer_end);

    params.subject_alt_names = hosts
        .iter()
        .map(|host| {
            Ia5String::try_from(host.clone())
                .map(SanType::DnsName)
                .map_err(|e| PkiError::CertificateGeneration(format!("invalid DNS name {host}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let ca_key = KeyPair::from_pem(&signer.key_pem)
        .map_err(|e| PkiError::Parse(format!("failed to load CA key: {e}")))?;
    let issuer = Issuer::from_ca_cert_pem(&signer.cert_pem, &ca_key)
        .map_err(|e| PkiError::Parse(format!("failed to create issuer: {e}")))?;

    let key_pair = KeyPair::generate()
        .map_err(|e| PkiError::KeyGeneration(format!("failed to generate serving key: {e}")))?;
    let key_pem = key_pair.serialize_pem();

    let cert = params.signed_by(&key_pair, &issuer).map_err(|e| {
        PkiError::CertificateGeneration(format!("failed to sign serving cert: {e}"))
    })?;

    Ok(CertKeyPair {
        cert_pem: cert.pem(),
        key_pem,
    })
}

/// Parse the first certificate of a PEM string.
pub fn cert_info(cert_pem: &str) -> Result<CertInfo> {
    let (_, parsed) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| PkiError::Parse(format!("failed to parse PEM: {e}")))?;
    let cert = parsed
        .parse_x509()
        .map_err(|e| PkiError::Parse(format!("failed to parse certificate: {e}")))?;
    info_from(&cert)
}

fn info_from(cert: &X509Certificate<'_>) -> Result<CertInfo> {
    let common_name = |name: &x509_parser::x509::X509Name<'_>| -> String {
        name.iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    Ok(CertInfo {
        subject_cn: common_name(cert.subject()),
        issuer_cn: common_name(cert.issuer()),
        not_before: cert.validity().not_before.timestamp(),
        not_after: cert.validity().not_after.timestamp(),
    })
}

/// Parse every certificate of a PEM bundle, skipping undecodable blocks.
///
/// Returns each certificate as a normalized PEM block plus its parsed info.
#[must_use]
pub fn bundle_certs(bundle_pem: &str) -> Vec<(String, CertInfo)> {
    let Ok(blocks) = ::pem::parse_many(bundle_pem.as_bytes()) else {
        return Vec::new();
    };

    blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .filter_map(|block| {
            let (_, cert) = X509Certificate::from_der(block.contents()).ok()?;
            let info = info_from(&cert).ok()?;
            Some((::pem::encode(&block), info))
        })
        .collect()
}

/// Merge the current signer into a trust bundle and prune stale CAs.
///
/// A prior CA is retained while any live serving certificate still names it
/// as issuer; expired certificates are always dropped. Returns the new
/// bundle and whether its certificate set differs from the input (callers
/// republish only on change).
pub fn merge_trust_bundle(
    existing_bundle: &str,
    signer_cert_pem: &str,
    live_issuer_cns: &[String],
    now: i64,
) -> Result<(String, bool)> {
    let signer_info = cert_info(signer_cert_pem)?;
    let existing = bundle_certs(existing_bundle);

    let mut retained: Vec<(String, CertInfo)> = existing
        .iter()
        .filter(|(_, info)| {
            info.is_valid_at(now)
                && (info.subject_cn == signer_info.subject_cn
                    || live_issuer_cns.contains(&info.subject_cn))
        })
        .cloned()
        .collect();

    if !retained
        .iter()
        .any(|(_, info)| info.subject_cn == signer_info.subject_cn)
    {
        // normalize through the pem crate so comparisons stay byte-stable
        let normalized = bundle_certs(signer_cert_pem)
            .into_iter()
            .next()
            .ok_or_else(|| PkiError::Parse("signer certificate not PEM-decodable".to_string()))?;
        retained.push(normalized);
    }

    let changed = retained.iter().map(|(block, _)| block).collect::<Vec<_>>()
        != existing.iter().map(|(block, _)| block).collect::<Vec<_>>();

    let bundle = retained
        .into_iter()
        .map(|(block, _)| block)
        .collect::<String>();

    Ok((bundle, changed))
}

fn to_time_duration(duration: std::time::Duration) -> Duration {
    Duration::seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
#[path = "certs_tests.rs"]
mod certs_tests;
