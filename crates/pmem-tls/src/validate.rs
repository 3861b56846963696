//! Validation of supplied certificate/key pairs.

use crate::encoding::{decode_cert, decode_key, Certificate};
use crate::error::{Result, TlsError};
use rcgen::PublicKeyData;
use time::OffsetDateTime;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Identity and validity window of a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject common name
    pub subject: String,
    /// When the certificate becomes valid
    pub not_before: OffsetDateTime,
    /// When the certificate expires
    pub not_after: OffsetDateTime,
}

impl CertificateInfo {
    /// Read subject and validity from a certificate.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let (_, parsed) = parse(cert)?;
        Self::from_parsed(&parsed)
    }

    fn from_parsed(cert: &X509Certificate<'_>) -> Result<Self> {
        let subject = common_name(cert);
        let not_before = timestamp(cert.validity().not_before.timestamp())?;
        let not_after = timestamp(cert.validity().not_after.timestamp())?;
        Ok(Self {
            subject,
            not_before,
            not_after,
        })
    }

    /// Fail with [`TlsError::SubjectMismatch`] unless the subject is `expected`.
    pub fn ensure_subject(&self, expected: &str) -> Result<()> {
        if self.subject == expected {
            Ok(())
        } else {
            Err(TlsError::SubjectMismatch {
                expected: expected.to_string(),
                actual: self.subject.clone(),
            })
        }
    }

    /// Fail unless `at` lies within the validity window.
    pub fn ensure_valid_at(&self, at: OffsetDateTime) -> Result<()> {
        if at < self.not_before {
            return Err(TlsError::NotYetValid {
                subject: self.subject.clone(),
                not_before: self.not_before,
            });
        }
        if at > self.not_after {
            return Err(TlsError::Expired {
                subject: self.subject.clone(),
                not_after: self.not_after,
            });
        }
        Ok(())
    }
}

/// Check that a PEM certificate and key form a usable pair issued by the CA.
///
/// The checks run in a fixed order and the first failure wins: decoding,
/// key/certificate match, signature by the CA, then the validity window
/// against the current time.
pub fn validate(cert_pem: &str, key_pem: &str, ca_cert_pem: &str) -> Result<CertificateInfo> {
    validate_at(cert_pem, key_pem, ca_cert_pem, OffsetDateTime::now_utc())
}

/// [`validate`] with an explicit point in time.
pub fn validate_at(
    cert_pem: &str,
    key_pem: &str,
    ca_cert_pem: &str,
    now: OffsetDateTime,
) -> Result<CertificateInfo> {
    let cert = decode_cert(cert_pem)?;
    let key = decode_key(key_pem)?;
    let ca_cert = decode_cert(ca_cert_pem)?;

    let (_, parsed) = parse(&cert)?;
    let (_, parsed_ca) = parse(&ca_cert)?;
    let info = CertificateInfo::from_parsed(&parsed)?;

    if key.subject_public_key_info().as_slice() != parsed.public_key().raw {
        return Err(TlsError::KeyMismatch {
            subject: info.subject,
        });
    }

    if let Err(e) = parsed.verify_signature(Some(parsed_ca.public_key())) {
        return Err(TlsError::UntrustedChain {
            subject: info.subject,
            reason: e.to_string(),
        });
    }

    info.ensure_valid_at(now)?;
    Ok(info)
}

/// Check that a PEM certificate can act as a CA and is currently valid.
///
/// Only the certificate is inspected; supplied authorities may be
/// intermediates, so no self-signature is required.
pub fn validate_authority(ca_cert_pem: &str) -> Result<CertificateInfo> {
    validate_authority_at(ca_cert_pem, OffsetDateTime::now_utc())
}

/// [`validate_authority`] with an explicit point in time.
pub fn validate_authority_at(ca_cert_pem: &str, now: OffsetDateTime) -> Result<CertificateInfo> {
    let cert = decode_cert(ca_cert_pem)?;
    let (_, parsed) = parse(&cert)?;
    let info = CertificateInfo::from_parsed(&parsed)?;
    if !is_authority(&parsed) {
        return Err(TlsError::NotAuthority {
            subject: info.subject,
        });
    }
    info.ensure_valid_at(now)?;
    Ok(info)
}

pub(crate) fn is_authority(cert: &X509Certificate<'_>) -> bool {
    matches!(cert.basic_constraints(), Ok(Some(ext)) if ext.value.ca)
}

pub(crate) fn parse(cert: &Certificate) -> Result<(&[u8], X509Certificate<'_>)> {
    X509Certificate::from_der(cert.der()).map_err(|e| TlsError::Decode {
        what: "certificate",
        reason: e.to_string(),
    })
}

pub(crate) fn common_name(cert: &X509Certificate<'_>) -> String {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string()
}

fn timestamp(secs: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| TlsError::Decode {
        what: "certificate validity",
        reason: e.to_string(),
    })
}
