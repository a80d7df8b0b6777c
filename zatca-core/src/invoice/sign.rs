use base64ct::{Base64, Encoding};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::pkcs8::{DecodePrivateKey, EncodePublicKey};
use k256::SecretKey;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::hash::hash_events;
use super::qr::{QrCodeError, QrPayload};
use super::signed::SignedInvoiceResult;
use super::xml::constants::{
    CAC_SIGNATURE_TEMPLATE, QR_REFERENCE_TEMPLATE, SIGNED_PROPERTIES_TEMPLATE,
    SIGNING_TIME_FORMAT, UBL_EXTENSIONS_TEMPLATE,
};
use super::xml::{fill_template, paths, InvoiceXmlError, XmlEvents};
use crate::certificate::{hex_digest_to_base64, Certificate, CertificateError};
use crate::config::{Config, DEFAULT_QR_MAX_LEN};

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invoice XML error: {0}")]
    Xml(#[from] InvoiceXmlError),
    #[error("QR code error: {0}")]
    Qr(#[from] QrCodeError),
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("private key parse error: {0}")]
    PrivateKey(String),
    #[error("private key does not match the certificate's public key")]
    KeyMismatch,
    #[error("failed to sign invoice hash: {0}")]
    Crypto(String),
    #[error("invalid issue date/time '{value}'")]
    IssueDateTime { value: String },
}

/// Signs UBL invoices with a CSID certificate and its private key.
///
/// Signing is deterministic in its inputs: the signing time comes from the
/// invoice's `IssueDate`/`IssueTime`, and ECDSA nonces are derived per RFC 6979.
pub struct InvoiceSigner {
    certificate: Arc<Certificate>,
    private_key: SigningKey,
    qr_max_len: usize,
}

impl std::fmt::Debug for InvoiceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceSigner")
            .field("certificate", &self.certificate.subject())
            .field("qr_max_len", &self.qr_max_len)
            .finish_non_exhaustive()
    }
}

impl InvoiceSigner {
    /// Fails with [`SigningError::KeyMismatch`] unless `private_key` belongs to
    /// the certificate.
    pub fn new(certificate: Arc<Certificate>, private_key: SigningKey) -> Result<Self, SigningError> {
        if &certificate.verifying_key()? != private_key.verifying_key() {
            return Err(SigningError::KeyMismatch);
        }
        Ok(Self {
            certificate,
            private_key,
            qr_max_len: DEFAULT_QR_MAX_LEN,
        })
    }

    /// Certificate DER plus a DER private key (PKCS#8 or SEC1).
    pub fn from_der(cert_der: &[u8], private_key_der: &[u8]) -> Result<Self, SigningError> {
        let certificate = Certificate::from_der(cert_der)?;
        Self::new(Arc::new(certificate), parse_private_key(private_key_der)?)
    }

    /// Certificate PEM plus a private key in PKCS#8 (`PRIVATE KEY`) or SEC1
    /// (`EC PRIVATE KEY`) PEM.
    pub fn from_pem(cert_pem: &str, private_key_pem: &str) -> Result<Self, SigningError> {
        let certificate = Certificate::from_pem(cert_pem)?;
        Self::new(Arc::new(certificate), parse_private_key(private_key_pem.as_bytes())?)
    }

    pub fn with_qr_max_len(mut self, qr_max_len: usize) -> Self {
        self.qr_max_len = qr_max_len;
        self
    }

    pub fn with_config(self, config: &Config) -> Self {
        self.with_qr_max_len(config.qr_max_len())
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Signs an invoice, replacing any signature it already carries.
    #[instrument(skip_all, fields(serial = %self.certificate.serial_number()))]
    pub fn sign_xml(&self, xml: &str) -> Result<SignedInvoiceResult, SigningError> {
        let unsigned = XmlEvents::parse(xml)?.without_signature_elements();

        let invoice_hash = hash_events(&unsigned)?;
        debug!(%invoice_hash, "computed invoice hash");
        let signature = sign_hash(&self.private_key, &invoice_hash)?;

        let signing_time = signing_time(&unsigned)?;
        let signed_properties = fill_template(
            SIGNED_PROPERTIES_TEMPLATE,
            &[
                ("SIGNING_TIME", signing_time.as_str()),
                ("CERT_HASH", self.certificate.hash_base64().as_str()),
                ("ISSUER", self.certificate.issuer().as_str()),
                ("SERIAL", self.certificate.serial_number().as_str()),
            ],
        );
        let signed_properties_hash =
            hex_digest_to_base64(&Sha256::digest(signed_properties.as_bytes()));

        let public_key = self
            .private_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| SigningError::Crypto(e.to_string()))?;
        let certificate_signature = self.certificate.inner().signature.raw_bytes();
        let qr_code = QrPayload::from_events(&unsigned)?
            .with_signing_parts(
                &invoice_hash,
                &signature,
                public_key.as_bytes(),
                Some(certificate_signature),
            )
            .encode(self.qr_max_len)?;

        let extensions = fill_template(
            UBL_EXTENSIONS_TEMPLATE,
            &[
                ("INVOICE_HASH", invoice_hash.as_str()),
                ("SIGNED_PROPERTIES_HASH", signed_properties_hash.as_str()),
                ("SIGNATURE_VALUE", signature.as_str()),
                ("CERTIFICATE", self.certificate.to_base64().as_str()),
            ],
        )
        .replace("{{SIGNED_PROPERTIES}}", &signed_properties);
        let mut references = fill_template(QR_REFERENCE_TEMPLATE, &[("QR_CODE", qr_code.as_str())]);
        references.push_str(CAC_SIGNATURE_TEMPLATE.trim());

        let signed = unsigned.with_signature_elements(
            &XmlEvents::parse_fragment(&extensions)?,
            &XmlEvents::parse_fragment(&references)?,
        )?;
        let signed_xml = signed.to_xml_string()?;

        info!(qr_len = qr_code.len(), "invoice signed");
        Ok(SignedInvoiceResult::new(
            signed_xml,
            invoice_hash,
            qr_code,
            Arc::clone(&self.certificate),
        ))
    }
}

/// secp256k1 private key in PKCS#8 or SEC1 form, PEM or DER.
pub fn parse_private_key(bytes: &[u8]) -> Result<SigningKey, SigningError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if text.contains("-----BEGIN") {
            return SigningKey::from_pkcs8_pem(text).or_else(|e| {
                SecretKey::from_sec1_pem(text)
                    .map(SigningKey::from)
                    .map_err(|_| SigningError::PrivateKey(e.to_string()))
            });
        }
    }
    SigningKey::from_pkcs8_der(bytes).or_else(|e| {
        SecretKey::from_sec1_der(bytes)
            .map(SigningKey::from)
            .map_err(|_| SigningError::PrivateKey(e.to_string()))
    })
}

/// ECDSA over the decoded hash bytes, DER encoded then base64.
fn sign_hash(key: &SigningKey, hash_b64: &str) -> Result<String, SigningError> {
    let hash_bytes =
        Base64::decode_vec(hash_b64).map_err(|e| SigningError::Crypto(e.to_string()))?;
    let signature: Signature = key
        .try_sign(&hash_bytes)
        .map_err(|e| SigningError::Crypto(e.to_string()))?;
    Ok(Base64::encode_string(signature.to_der().as_bytes()))
}

fn signing_time(doc: &XmlEvents) -> Result<String, SigningError> {
    let issue_date = doc.required_text(paths::ISSUE_DATE, "issue date")?;
    let issue_time = doc.required_text(paths::ISSUE_TIME, "issue time")?;
    let value = format!("{issue_date}T{}", issue_time.trim_end_matches('Z'));
    let parsed = chrono::NaiveDateTime::parse_from_str(&value, SIGNING_TIME_FORMAT)
        .map_err(|_| SigningError::IssueDateTime { value })?;
    Ok(parsed.format(SIGNING_TIME_FORMAT).to_string())
}
