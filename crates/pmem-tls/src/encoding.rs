//! Key generation and PEM encoding of keys and certificates.

use crate::error::{Result, TlsError};
use rcgen::{KeyPair, PublicKeyData};
use x509_parser::prelude::{FromDer, X509Certificate};

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// A DER-encoded X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wrap DER bytes after checking that they parse as a certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        X509Certificate::from_der(&der).map_err(|e| TlsError::Decode {
            what: "certificate",
            reason: e.to_string(),
        })?;
        Ok(Self { der })
    }

    /// Raw DER bytes
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// Generate a fresh ECDSA P-256 key pair from the system random source.
pub fn new_private_key() -> Result<KeyPair> {
    KeyPair::generate().map_err(|e| TlsError::KeyGeneration(e.to_string()))
}

/// PKCS#8 PEM encoding of a private key
pub fn encode_key(key: &KeyPair) -> String {
    key.serialize_pem()
}

/// Parse a PKCS#8 PEM private key.
pub fn decode_key(pem_data: &str) -> Result<KeyPair> {
    KeyPair::from_pem(pem_data).map_err(|e| TlsError::Decode {
        what: "private key",
        reason: e.to_string(),
    })
}

/// PEM encoding of a certificate
pub fn encode_cert(cert: &Certificate) -> String {
    ::pem::encode(&::pem::Pem::new(CERTIFICATE_TAG, cert.der.clone()))
}

/// Parse a PEM certificate. Only the first PEM block is read.
pub fn decode_cert(pem_data: &str) -> Result<Certificate> {
    let block = ::pem::parse(pem_data.as_bytes()).map_err(|e| TlsError::Decode {
        what: "certificate",
        reason: e.to_string(),
    })?;
    if block.tag() != CERTIFICATE_TAG {
        return Err(TlsError::Decode {
            what: "certificate",
            reason: format!("unexpected PEM block \"{}\"", block.tag()),
        });
    }
    Certificate::from_der(block.contents().to_vec())
}

/// Whether two PEM private keys share the same public half.
pub fn same_key(a: &str, b: &str) -> Result<bool> {
    Ok(decode_key(a)?.subject_public_key_info() == decode_key(b)?.subject_public_key_info())
}
