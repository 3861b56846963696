//! Certificate authority errors

use thiserror::Error;

/// Errors that can occur while issuing or validating TLS material
///
/// Validation failures are classified so that callers can tell which part of
/// the supplied material is wrong.
#[derive(Debug, Error)]
pub enum TlsError {
    /// PEM or DER input could not be decoded
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded ("certificate", "private key", ...)
        what: &'static str,
        /// Underlying parser message
        reason: String,
    },

    /// The private key is not the key the certificate was issued for
    #[error("private key does not match the public key in certificate \"{subject}\"")]
    KeyMismatch {
        /// Subject of the certificate
        subject: String,
    },

    /// The certificate is not signed by the governing CA
    #[error("certificate \"{subject}\" is not signed by the CA: {reason}")]
    UntrustedChain {
        /// Subject of the certificate
        subject: String,
        /// Why verification failed
        reason: String,
    },

    /// The validity window ended before the check
    #[error("certificate \"{subject}\" expired at {not_after}")]
    Expired {
        /// Subject of the certificate
        subject: String,
        /// End of the validity window
        not_after: time::OffsetDateTime,
    },

    /// The validity window starts after the check
    #[error("certificate \"{subject}\" is not valid before {not_before}")]
    NotYetValid {
        /// Subject of the certificate
        subject: String,
        /// Start of the validity window
        not_before: time::OffsetDateTime,
    },

    /// The certificate was issued for a different subject
    #[error("certificate subject \"{actual}\" does not match expected subject \"{expected}\"")]
    SubjectMismatch {
        /// Subject the role requires
        expected: String,
        /// Subject found in the certificate
        actual: String,
    },

    /// Only one of CA certificate and CA key was given
    #[error("CA certificate and CA private key must be provided together")]
    IncompleteAuthority,

    /// The supplied CA certificate cannot sign other certificates
    #[error("certificate \"{subject}\" is not a CA certificate")]
    NotAuthority {
        /// Subject of the certificate
        subject: String,
    },

    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Certificate generation or signing failed
    #[error("certificate generation failed: {0}")]
    CertificateGeneration(String),
}

impl TlsError {
    /// Whether the error describes bad input material rather than a fault
    /// while producing new material.
    pub fn is_material_error(&self) -> bool {
        match self {
            TlsError::Decode { .. }
            | TlsError::KeyMismatch { .. }
            | TlsError::UntrustedChain { .. }
            | TlsError::Expired { .. }
            | TlsError::NotYetValid { .. }
            | TlsError::SubjectMismatch { .. }
            | TlsError::IncompleteAuthority
            | TlsError::NotAuthority { .. } => true,
            TlsError::KeyGeneration(_) | TlsError::CertificateGeneration(_) => false,
        }
    }
}

/// Result type for certificate operations
pub type Result<T> = std::result::Result<T, TlsError>;
