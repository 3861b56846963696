//! Root certificate authority for the driver's mutual-TLS material.

use crate::encoding::{decode_cert, decode_key, Certificate};
use crate::error::{Result, TlsError};
use crate::validate::{common_name, is_authority, parse};
use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, PublicKeyData, SanType,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

/// Common name of certificate authorities generated by the operator
pub const CA_COMMON_NAME: &str = "pmem-ca";

/// Organization recorded in every generated certificate
pub const ORGANIZATION: &str = "PMEM-CSI";

/// Validity of generated CA certificates (10 years)
pub const CA_VALIDITY: Duration = Duration::days(10 * 365);

/// Default validity of issued leaf certificates (1 year)
pub const CERT_VALIDITY: Duration = Duration::days(365);

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String(ORGANIZATION.to_string()),
    );
    dn
}

/// Certificate authority able to sign leaf certificates
#[derive(Clone)]
pub struct CertificateAuthority {
    /// CA key pair serialized as PEM (KeyPair isn't Clone)
    key_pem: String,
    /// PEM-encoded CA certificate
    cert_pem: String,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Create or load a CA.
    ///
    /// With neither argument a fresh self-signed root is generated. With both,
    /// the pair is decoded and checked for consistency. Anything in between is
    /// [`TlsError::IncompleteAuthority`].
    pub fn new(cert_pem: Option<&str>, key_pem: Option<&str>) -> Result<Self> {
        match (cert_pem, key_pem) {
            (None, None) => Self::generate(),
            (Some(cert_pem), Some(key_pem)) => Self::from_pem(cert_pem, key_pem),
            _ => Err(TlsError::IncompleteAuthority),
        }
    }

    fn generate() -> Result<Self> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(CA_COMMON_NAME);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + CA_VALIDITY;

        let key_pair = KeyPair::generate()
            .map_err(|e| TlsError::KeyGeneration(format!("failed to generate CA key: {e}")))?;
        let cert = params.self_signed(&key_pair).map_err(|e| {
            TlsError::CertificateGeneration(format!("failed to create CA certificate: {e}"))
        })?;
        debug!("Generated new self-signed CA \"{}\"", CA_COMMON_NAME);

        Ok(Self {
            key_pem: key_pair.serialize_pem(),
            cert_pem: cert.pem(),
        })
    }

    fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let key = decode_key(key_pem)?;
        let cert = decode_cert(cert_pem)?;
        let (_, parsed) = parse(&cert)?;
        let subject = common_name(&parsed);

        if !is_authority(&parsed) {
            return Err(TlsError::NotAuthority { subject });
        }
        if key.subject_public_key_info().as_slice() != parsed.public_key().raw {
            return Err(TlsError::KeyMismatch { subject });
        }
        if let Err(e) = parsed.verify_signature(None) {
            return Err(TlsError::UntrustedChain {
                subject,
                reason: format!("CA certificate is not self-signed: {e}"),
            });
        }

        Ok(Self {
            key_pem: key_pem.to_string(),
            cert_pem: cert_pem.to_string(),
        })
    }

    /// PEM-encoded CA certificate
    pub fn encoded_certificate(&self) -> &str {
        &self.cert_pem
    }

    /// PEM-encoded CA private key
    pub fn encoded_key(&self) -> &str {
        &self.key_pem
    }

    /// Decoded CA certificate
    pub fn certificate(&self) -> Result<Certificate> {
        decode_cert(&self.cert_pem)
    }

    /// Issue a leaf certificate for `public_key` valid for [`CERT_VALIDITY`]
    /// from now.
    pub fn generate_certificate(
        &self,
        subject: &str,
        public_key: &impl PublicKeyData,
    ) -> Result<Certificate> {
        let now = OffsetDateTime::now_utc();
        self.generate_certificate_with_duration(subject, now, now + CERT_VALIDITY, public_key)
    }

    /// Issue a leaf certificate with an explicit validity window.
    ///
    /// The certificate is usable for both client and server authentication
    /// and carries `subject` as common name and DNS name.
    pub fn generate_certificate_with_duration(
        &self,
        subject: &str,
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
        public_key: &impl PublicKeyData,
    ) -> Result<Certificate> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(subject);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let dns_name = Ia5String::try_from(subject.to_string()).map_err(|e| {
            TlsError::CertificateGeneration(format!("invalid DNS name '{subject}': {e}"))
        })?;
        params.subject_alt_names = vec![SanType::DnsName(dns_name)];
        params.not_before = not_before;
        params.not_after = not_after;

        let ca_key = KeyPair::from_pem(&self.key_pem).map_err(|e| TlsError::Decode {
            what: "CA private key",
            reason: e.to_string(),
        })?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &ca_key).map_err(|e| {
            TlsError::CertificateGeneration(format!("failed to create issuer: {e}"))
        })?;
        let cert = params.signed_by(public_key, &issuer).map_err(|e| {
            TlsError::CertificateGeneration(format!("failed to sign certificate: {e}"))
        })?;
        debug!("Issued certificate for \"{}\" valid until {}", subject, not_after);

        Certificate::from_der(cert.der().to_vec())
    }
}
