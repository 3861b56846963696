//! Embedded certificate authority for PMEM-CSI
//!
//! The driver's registry and node controllers authenticate each other with
//! mutual TLS. This crate creates or loads the root CA, issues leaf
//! certificates for the driver roles and validates material supplied by
//! users.
//!
//! # Example
//!
//! ```no_run
//! use pmem_tls::{CertificateAuthority, new_private_key, encode_cert, encode_key, validate};
//!
//! # fn example() -> Result<(), pmem_tls::TlsError> {
//! let ca = CertificateAuthority::new(None, None)?;
//! let key = new_private_key()?;
//! let cert = ca.generate_certificate("pmem-registry", &key)?;
//!
//! let info = validate(&encode_cert(&cert), &encode_key(&key), ca.encoded_certificate())?;
//! info.ensure_subject("pmem-registry")?;
//! # Ok(())
//! # }
//! ```

pub mod authority;
pub mod encoding;
pub mod error;
pub mod validate;

pub use authority::{CertificateAuthority, CA_COMMON_NAME, CA_VALIDITY, CERT_VALIDITY};
pub use encoding::{
    decode_cert, decode_key, encode_cert, encode_key, new_private_key, same_key, Certificate,
};
pub use error::{Result, TlsError};
pub use rcgen::{KeyPair, PublicKeyData};
pub use validate::{validate, validate_at, validate_authority, validate_authority_at, CertificateInfo};

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn issue(ca: &CertificateAuthority, subject: &str) -> (String, String) {
        let key = new_private_key().expect("key generation should succeed");
        let cert = ca
            .generate_certificate(subject, &key)
            .expect("signing should succeed");
        (encode_cert(&cert), encode_key(&key))
    }

    #[test]
    fn ca_can_be_created() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        assert!(ca.encoded_certificate().contains("BEGIN CERTIFICATE"));
        assert!(ca.encoded_key().contains("BEGIN PRIVATE KEY"));

        let info = CertificateInfo::from_certificate(&ca.certificate().expect("CA cert decodes"))
            .expect("CA cert parses");
        assert_eq!(info.subject, CA_COMMON_NAME);
        assert!(info.not_after - info.not_before >= CA_VALIDITY - Duration::seconds(1));
    }

    #[test]
    fn partial_ca_input_is_rejected() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        assert!(matches!(
            CertificateAuthority::new(Some(ca.encoded_certificate()), None),
            Err(TlsError::IncompleteAuthority)
        ));
        assert!(matches!(
            CertificateAuthority::new(None, Some(ca.encoded_key())),
            Err(TlsError::IncompleteAuthority)
        ));
    }

    #[test]
    fn ca_loaded_from_pem_signs_trusted_certificates() {
        let original = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let loaded = CertificateAuthority::new(
            Some(original.encoded_certificate()),
            Some(original.encoded_key()),
        )
        .expect("loading a consistent CA should succeed");

        let (cert, key) = issue(&loaded, "pmem-registry");
        let info = validate(&cert, &key, original.encoded_certificate())
            .expect("certificate from loaded CA should validate");
        assert_eq!(info.subject, "pmem-registry");
    }

    #[test]
    fn ca_with_foreign_key_is_rejected() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let other = new_private_key().expect("key generation should succeed");
        let result = CertificateAuthority::new(Some(ca.encoded_certificate()), Some(&encode_key(&other)));
        assert!(matches!(result, Err(TlsError::KeyMismatch { .. })));
    }

    #[test]
    fn leaf_certificate_is_not_a_ca() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let (cert, key) = issue(&ca, "pmem-registry");
        let result = CertificateAuthority::new(Some(&cert), Some(&key));
        assert!(matches!(result, Err(TlsError::NotAuthority { subject }) if subject == "pmem-registry"));
    }

    #[test]
    fn issued_certificate_validates() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let (cert, key) = issue(&ca, "pmem-node-controller");

        let info = validate(&cert, &key, ca.encoded_certificate()).expect("should validate");
        assert_eq!(info.subject, "pmem-node-controller");
        assert!(info.ensure_subject("pmem-node-controller").is_ok());
        assert!(info.not_after - info.not_before >= CERT_VALIDITY - Duration::seconds(1));
    }

    #[test]
    fn subject_mismatch_is_reported() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let (cert, key) = issue(&ca, "invalid-registry");

        let info = validate(&cert, &key, ca.encoded_certificate()).expect("chain is fine");
        let err = info.ensure_subject("pmem-registry").expect_err("subject differs");
        assert!(matches!(
            err,
            TlsError::SubjectMismatch { ref expected, ref actual }
                if expected == "pmem-registry" && actual == "invalid-registry"
        ));
    }

    #[test]
    fn mismatched_key_is_reported() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let (cert, _) = issue(&ca, "pmem-registry");
        let other = encode_key(&new_private_key().expect("key generation should succeed"));

        let err = validate(&cert, &other, ca.encoded_certificate()).expect_err("wrong key");
        assert!(matches!(err, TlsError::KeyMismatch { .. }));
    }

    #[test]
    fn certificate_from_other_ca_is_untrusted() {
        let ca1 = CertificateAuthority::new(None, None).expect("CA1 creation should succeed");
        let ca2 = CertificateAuthority::new(None, None).expect("CA2 creation should succeed");
        let (cert, key) = issue(&ca1, "pmem-registry");

        let err = validate(&cert, &key, ca2.encoded_certificate()).expect_err("other CA");
        assert!(matches!(err, TlsError::UntrustedChain { .. }));
    }

    #[test]
    fn expired_certificate_is_reported() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let key = new_private_key().expect("key generation should succeed");
        let now = OffsetDateTime::now_utc();
        let cert = ca
            .generate_certificate_with_duration(
                "pmem-registry",
                now - Duration::hours(24),
                now - Duration::minutes(1),
                &key,
            )
            .expect("signing should succeed");

        let err = validate(&encode_cert(&cert), &encode_key(&key), ca.encoded_certificate())
            .expect_err("certificate is expired");
        assert!(matches!(err, TlsError::Expired { .. }));
        assert!(err.is_material_error());
    }

    #[test]
    fn future_certificate_is_not_yet_valid() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let key = new_private_key().expect("key generation should succeed");
        let now = OffsetDateTime::now_utc();
        let cert = ca
            .generate_certificate_with_duration(
                "pmem-registry",
                now + Duration::hours(1),
                now + Duration::hours(2),
                &key,
            )
            .expect("signing should succeed");

        let err = validate(&encode_cert(&cert), &encode_key(&key), ca.encoded_certificate())
            .expect_err("certificate is not valid yet");
        assert!(matches!(err, TlsError::NotYetValid { .. }));

        let later = validate_at(
            &encode_cert(&cert),
            &encode_key(&key),
            ca.encoded_certificate(),
            now + Duration::minutes(90),
        );
        assert!(later.is_ok());
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let (cert, key) = issue(&ca, "pmem-registry");

        assert!(matches!(
            validate("not a certificate", &key, ca.encoded_certificate()),
            Err(TlsError::Decode { what: "certificate", .. })
        ));
        assert!(matches!(
            validate(&cert, "not a key", ca.encoded_certificate()),
            Err(TlsError::Decode { what: "private key", .. })
        ));
        // A key where a certificate is expected is rejected by its PEM tag.
        assert!(matches!(
            validate(&key, &key, ca.encoded_certificate()),
            Err(TlsError::Decode { .. })
        ));
    }

    #[test]
    fn encoding_is_reversible() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let key = new_private_key().expect("key generation should succeed");
        let cert = ca
            .generate_certificate("pmem-registry", &key)
            .expect("signing should succeed");

        let decoded_cert = decode_cert(&encode_cert(&cert)).expect("certificate decodes");
        assert_eq!(decoded_cert, cert);

        let encoded_key = encode_key(&key);
        let decoded_key = decode_key(&encoded_key).expect("key decodes");
        assert_eq!(encode_key(&decoded_key), encoded_key);
        assert!(same_key(&encoded_key, &encode_key(&decoded_key)).expect("keys decode"));
    }

    #[test]
    fn certificate_carries_the_signed_public_key() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let key = new_private_key().expect("key generation should succeed");
        let cert = ca
            .generate_certificate("pmem-registry", &key)
            .expect("signing should succeed");

        let (_, parsed) = crate::validate::parse(&cert).expect("certificate parses");
        assert_eq!(parsed.public_key().raw, key.subject_public_key_info().as_slice());

        let other = new_private_key().expect("key generation should succeed");
        assert_ne!(parsed.public_key().raw, other.subject_public_key_info().as_slice());
    }

    #[test]
    fn supplied_authority_is_checked() {
        let ca = CertificateAuthority::new(None, None).expect("CA creation should succeed");
        let info = validate_authority(ca.encoded_certificate()).expect("fresh CA is usable");
        assert_eq!(info.subject, CA_COMMON_NAME);

        let expired = validate_authority_at(
            ca.encoded_certificate(),
            OffsetDateTime::now_utc() + CA_VALIDITY + Duration::days(1),
        )
        .expect_err("CA has expired by then");
        assert!(matches!(expired, TlsError::Expired { ref subject, .. } if subject == CA_COMMON_NAME));

        let (leaf, _) = issue(&ca, "pmem-registry");
        assert!(matches!(
            validate_authority(&leaf),
            Err(TlsError::NotAuthority { subject }) if subject == "pmem-registry"
        ));
    }

    #[test]
    fn fresh_keys_differ() {
        let a = encode_key(&new_private_key().expect("key generation should succeed"));
        let b = encode_key(&new_private_key().expect("key generation should succeed"));
        assert!(!same_key(&a, &b).expect("keys decode"));
    }
}
