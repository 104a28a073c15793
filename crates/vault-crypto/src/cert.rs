//! Minimal self-signed X.509 certificate for the client key pair
//!
//! The certificate binds the public key to a configured subject, is valid
//! for loopback addresses only, and is signed with the key itself
//! (RSASSA-PKCS1-v1_5 with SHA-256).

use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::OctetString;
use x509_cert::der::pem::LineEnding;
use x509_cert::der::EncodePem;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use x509_cert::Certificate;

use vault_core::config::CertificateConfig;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::KeyPair;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Addresses the certificate is valid for
pub const LOOPBACK: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

fn cert_err(stage: &str, e: impl std::fmt::Display) -> CryptoError {
    CryptoError::KeyGeneration(format!("certificate {stage}: {e}"))
}

/// Build the self-signed certificate and return it as PEM.
pub fn self_signed_certificate(pair: &KeyPair, config: &CertificateConfig) -> CryptoResult<String> {
    let cert = build_certificate(pair, config)?;
    cert.to_pem(LineEnding::LF).map_err(|e| cert_err("encoding", e))
}

pub fn build_certificate(pair: &KeyPair, config: &CertificateConfig) -> CryptoResult<Certificate> {
    let subject = subject_name(config)?;
    let serial = SerialNumber::from(config.serial);
    let validity = Validity::from_now(Duration::from_secs(
        u64::from(config.validity_days) * SECONDS_PER_DAY,
    ))
    .map_err(|e| cert_err("validity", e))?;
    let spki = SubjectPublicKeyInfoOwned::from_key(pair.public_key().clone())
        .map_err(|e| cert_err("public key info", e))?;

    let signer = SigningKey::<Sha256>::new(pair.private_key().clone());
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        serial,
        validity,
        subject,
        spki,
        &signer,
    )
    .map_err(|e| cert_err("builder", e))?;

    let san = LOOPBACK
        .iter()
        .map(|ip| {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            OctetString::new(octets).map(GeneralName::IpAddress)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| cert_err("subject alt name", e))?;

    let ski = OctetString::new(subject_key_id(pair)?.to_vec())
        .map_err(|e| cert_err("subject key id", e))?;

    builder
        .add_extension(&SubjectKeyIdentifier(ski))
        .map_err(|e| cert_err("extensions", e))?;
    builder
        .add_extension(&KeyUsage(KeyUsages::DigitalSignature.into()))
        .map_err(|e| cert_err("extensions", e))?;
    builder
        .add_extension(&ExtendedKeyUsage(vec![ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH]))
        .map_err(|e| cert_err("extensions", e))?;
    builder
        .add_extension(&SubjectAltName(san))
        .map_err(|e| cert_err("extensions", e))?;

    builder
        .build::<Signature>()
        .map_err(|e| cert_err("signing", e))
}

/// First 20 bytes of SHA-256 over the PKCS#1 public key
fn subject_key_id(pair: &KeyPair) -> CryptoResult<[u8; 20]> {
    let der = pair
        .public_key()
        .to_pkcs1_der()
        .map_err(|e| cert_err("subject key id", e))?;
    let digest = Sha256::digest(der.as_bytes());
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[..20]);
    Ok(id)
}

fn subject_name(config: &CertificateConfig) -> CryptoResult<Name> {
    let mut parts = Vec::new();
    if !config.organization.is_empty() {
        parts.push(format!("O={}", escape_rdn_value(&config.organization)));
    }
    if !config.country.is_empty() {
        parts.push(format!("C={}", escape_rdn_value(&config.country)));
    }
    Name::from_str(&parts.join(",")).map_err(|e| cert_err("subject", e))
}

/// RFC 4514 escaping for attribute values
fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && (c == ' ' || c == '#');
        let trailing = i == value.chars().count() - 1 && c == ' ';
        if leading || trailing || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_keys::alice;
    use x509_cert::der::{Decode, DecodePem, Encode};

    fn config() -> CertificateConfig {
        CertificateConfig::default()
    }

    #[test]
    fn test_pem_label() {
        let pem = self_signed_certificate(alice(), &config()).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(pem.trim_end().ends_with("-----END CERTIFICATE-----"));
    }

    #[test]
    fn test_certificate_fields() {
        let pem = self_signed_certificate(alice(), &config()).unwrap();
        let cert = Certificate::from_pem(pem.as_bytes()).unwrap();
        let tbs = &cert.tbs_certificate;

        assert_eq!(tbs.serial_number, SerialNumber::from(1658u64));
        assert_eq!(tbs.issuer, tbs.subject, "self-signed: issuer == subject");
        let subject = tbs.subject.to_string();
        assert!(subject.contains("O=passManager"), "{subject}");
        assert!(subject.contains("C=RU"), "{subject}");

        let spki = SubjectPublicKeyInfoOwned::from_key(alice().public_key().clone()).unwrap();
        assert_eq!(tbs.subject_public_key_info, spki);
    }

    #[test]
    fn test_validity_window() {
        let cert = build_certificate(alice(), &config()).unwrap();
        let validity = &cert.tbs_certificate.validity;
        let not_before = validity.not_before.to_unix_duration();
        let not_after = validity.not_after.to_unix_duration();

        let days = (not_after - not_before).as_secs() / SECONDS_PER_DAY;
        assert_eq!(days, 3650);
    }

    #[test]
    fn test_extensions_present() {
        let cert = build_certificate(alice(), &config()).unwrap();
        let extensions = cert.tbs_certificate.extensions.unwrap();
        let oids: Vec<_> = extensions.iter().map(|e| e.extn_id).collect();

        use const_oid::db::rfc5280::{
            ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME,
            ID_CE_SUBJECT_KEY_IDENTIFIER,
        };
        for oid in [
            ID_CE_SUBJECT_KEY_IDENTIFIER,
            ID_CE_KEY_USAGE,
            ID_CE_EXT_KEY_USAGE,
            ID_CE_SUBJECT_ALT_NAME,
        ] {
            assert!(oids.contains(&oid), "missing extension {oid}");
        }

        let san = extensions
            .iter()
            .find(|e| e.extn_id == ID_CE_SUBJECT_ALT_NAME)
            .unwrap();
        let san = SubjectAltName::from_der(san.extn_value.as_bytes()).unwrap();
        assert_eq!(san.0.len(), 2);
    }

    #[test]
    fn test_der_roundtrip() {
        let cert = build_certificate(alice(), &config()).unwrap();
        let der = cert.to_der().unwrap();
        assert_eq!(Certificate::from_der(&der).unwrap(), cert);
    }

    #[test]
    fn test_custom_subject_is_escaped() {
        let config = CertificateConfig {
            organization: "Doe, Smith & Co".into(),
            country: "US".into(),
            serial: 7,
            validity_days: 30,
        };
        let cert = build_certificate(alice(), &config).unwrap();
        assert_eq!(cert.tbs_certificate.serial_number, SerialNumber::from(7u64));
        assert!(cert.tbs_certificate.subject.to_string().contains("Smith"));
    }

    #[test]
    fn test_escape_rdn_value() {
        assert_eq!(escape_rdn_value("a,b"), "a\\,b");
        assert_eq!(escape_rdn_value("#x"), "\\#x");
        assert_eq!(escape_rdn_value("plain"), "plain");
    }
}
