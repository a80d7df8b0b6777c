//! Signing certificates (CSIDs) issued by ZATCA.
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use k256::ecdsa::VerifyingKey;
use k256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use thiserror::Error;
use x509_cert::der::{Decode, DecodePem, Encode};

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate DER error: {0}")]
    Der(#[from] x509_cert::der::Error),
    #[error("certificate base64 error: {0}")]
    Base64(#[from] base64ct::Error),
    #[error("binary security token is not valid UTF-8")]
    TokenEncoding,
    #[error("certificate public key is not a secp256k1 key: {0}")]
    PublicKey(String),
    #[error("certificate validity time out of range")]
    ValidityRange,
}

/// A parsed X.509 signing certificate.
///
/// Shared by reference (`Arc<Certificate>`) between the signer and the results
/// it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let inner = x509_cert::Certificate::from_der(der)?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let inner = x509_cert::Certificate::from_pem(pem.as_bytes())?;
        let der = inner.to_der()?;
        Ok(Self { inner, der })
    }

    /// Certificate as plain base64 DER, the form embedded in `ds:X509Certificate`.
    pub fn from_base64_der(b64: &str) -> Result<Self, CertificateError> {
        let der = Base64::decode_vec(b64.trim())?;
        Self::from_der(&der)
    }

    /// The CSID endpoint returns base64 of the base64 DER.
    pub fn from_binary_security_token(token: &str) -> Result<Self, CertificateError> {
        let inner_b64 = Base64::decode_vec(token.trim())?;
        let inner_b64 = String::from_utf8(inner_b64).map_err(|_| CertificateError::TokenEncoding)?;
        Self::from_base64_der(&inner_b64)
    }

    pub fn inner(&self) -> &x509_cert::Certificate {
        &self.inner
    }

    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.der)
    }

    /// Issuer name as `CN=..., DC=...`, the form used in `ds:X509IssuerName`.
    pub fn issuer(&self) -> String {
        join_rdns(&self.inner.tbs_certificate.issuer.to_string())
    }

    pub fn subject(&self) -> String {
        join_rdns(&self.inner.tbs_certificate.subject.to_string())
    }

    /// Serial number in decimal.
    pub fn serial_number(&self) -> String {
        serial_bytes_to_decimal_string(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn not_before(&self) -> Result<DateTime<Utc>, CertificateError> {
        to_chrono(self.inner.tbs_certificate.validity.not_before.to_unix_duration())
    }

    pub fn not_after(&self) -> Result<DateTime<Utc>, CertificateError> {
        to_chrono(self.inner.tbs_certificate.validity.not_after.to_unix_duration())
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> Result<bool, CertificateError> {
        Ok(self.not_before()? <= at && at <= self.not_after()?)
    }

    /// `xades:CertDigest` value: base64 of the hex SHA-256 of the base64 DER.
    pub fn hash_base64(&self) -> String {
        let hash = Sha256::digest(self.to_base64().as_bytes());
        hex_digest_to_base64(&hash)
    }

    /// The issuer's signature over this certificate (QR tag 9).
    pub fn signature_base64(&self) -> String {
        Base64::encode_string(self.inner.signature.raw_bytes())
    }

    pub fn public_key_der(&self) -> Result<Vec<u8>, CertificateError> {
        Ok(self.inner.tbs_certificate.subject_public_key_info.to_der()?)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, CertificateError> {
        let spki = self.public_key_der()?;
        VerifyingKey::from_public_key_der(&spki)
            .map_err(|e| CertificateError::PublicKey(e.to_string()))
    }
}

fn to_chrono(since_epoch: std::time::Duration) -> Result<DateTime<Utc>, CertificateError> {
    let secs = i64::try_from(since_epoch.as_secs()).map_err(|_| CertificateError::ValidityRange)?;
    DateTime::from_timestamp(secs, 0).ok_or(CertificateError::ValidityRange)
}

/// Rejoins an RFC 4514 name with `", "`; escaped commas stay inside their value.
fn join_rdns(name: &str) -> String {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in name.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(name[start..idx].trim_start());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(name[start..].trim_start());
    parts.join(", ")
}

pub(crate) fn hex_digest_to_base64(hash: &[u8]) -> String {
    let mut hex_hash = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(&mut hex_hash, "{:02x}", byte);
    }
    Base64::encode_string(hex_hash.as_bytes())
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Certificate;
    use k256::ecdsa::{DerSignature, SigningKey};
    use rand_core::OsRng;
    use std::str::FromStr;
    use std::time::Duration;
    use x509_cert::builder::{Builder, CertificateBuilder, Profile};
    use x509_cert::der::Encode;
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Validity;

    /// Fresh key with a self-signed certificate for it.
    pub(crate) fn self_signed() -> (SigningKey, Certificate) {
        let key = SigningKey::random(&mut OsRng);
        let spki = SubjectPublicKeyInfoOwned::from_key(key.verifying_key().clone()).unwrap();
        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(1_234_567u32),
            Validity::from_now(Duration::from_secs(3600)).unwrap(),
            Name::from_str("CN=TST-886431145-399999999900003,O=Maximum Speed Tech Supply LTD,C=SA")
                .unwrap(),
            spki,
            &key,
        )
        .unwrap();
        let cert = builder.build::<DerSignature>().unwrap();
        let cert = Certificate::from_der(&cert.to_der().unwrap()).unwrap();
        (key, cert)
    }
}
