//! Consistency checks for signed invoices.
use base64ct::{Base64, Encoding};
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::Signature;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::hash::hash_events;
use super::qr::{self, QrCodeError, QrPayload};
use super::signed::SignedInvoiceResult;
use super::xml::{paths, InvoiceXmlError, XmlEvents};
use crate::certificate::{Certificate, CertificateError};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invoice XML error: {0}")]
    Xml(#[from] InvoiceXmlError),
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("QR code error: {0}")]
    Qr(#[from] QrCodeError),
    #[error("invoice hash mismatch: stored {stored}, recomputed {recomputed}")]
    HashMismatch { stored: String, recomputed: String },
    #[error("embedded invoice digest does not match the stored hash")]
    DigestMismatch,
    #[error("embedded certificate does not match the signing certificate")]
    CertificateMismatch,
    #[error("embedded QR code does not match the stored QR code")]
    QrMismatch,
    #[error("QR tag {tag} does not match the signed invoice")]
    QrTagMismatch { tag: u8 },
    #[error("QR code is missing tag {tag}")]
    QrTagMissing { tag: u8 },
    #[error("invoice signature is invalid: {0}")]
    InvalidSignature(String),
}

/// Checks that the hash, signature, QR payload and certificate of `result` all
/// describe its invoice.
pub fn verify_signed_invoice(result: &SignedInvoiceResult) -> Result<(), VerificationError> {
    let doc = XmlEvents::parse(result.invoice())?;

    let unsigned = doc.without_signature_elements();
    let recomputed = hash_events(&unsigned)?;
    if recomputed != result.hash() {
        warn!(stored = result.hash(), %recomputed, "invoice hash mismatch");
        return Err(VerificationError::HashMismatch {
            stored: result.hash().to_string(),
            recomputed,
        });
    }

    let digest = doc.required_text(paths::INVOICE_DIGEST, "ds:DigestValue")?;
    if digest != result.hash() {
        warn!("embedded digest mismatch");
        return Err(VerificationError::DigestMismatch);
    }

    let embedded_cert = doc.required_text(paths::X509_CERTIFICATE, "ds:X509Certificate")?;
    if embedded_cert != result.certificate().to_base64() {
        warn!("embedded certificate mismatch");
        return Err(VerificationError::CertificateMismatch);
    }

    let signature_b64 = doc.required_text(paths::SIGNATURE_VALUE, "ds:SignatureValue")?;
    verify_signature(result.certificate(), result.hash(), &signature_b64)?;

    let embedded_qr = doc
        .qr_value()?
        .ok_or(InvoiceXmlError::MissingElement("QR AdditionalDocumentReference"))?;
    if embedded_qr != result.qr_code() {
        warn!("embedded QR mismatch");
        return Err(VerificationError::QrMismatch);
    }
    verify_qr_tags(&unsigned, result, &signature_b64)?;

    debug!("signed invoice verified");
    Ok(())
}

/// Rebuilds a result from a signed invoice document.
///
/// The hash, QR payload and certificate are read from the document; run
/// [`verify_signed_invoice`] on the outcome before trusting it.
pub fn load_signed_invoice(xml: &str) -> Result<SignedInvoiceResult, VerificationError> {
    let doc = XmlEvents::parse(xml)?;
    let hash = doc.required_text(paths::INVOICE_DIGEST, "ds:DigestValue")?;
    let certificate = Certificate::from_base64_der(
        &doc.required_text(paths::X509_CERTIFICATE, "ds:X509Certificate")?,
    )?;
    let qr_code = doc
        .qr_value()?
        .ok_or(InvoiceXmlError::MissingElement("QR AdditionalDocumentReference"))?;
    Ok(SignedInvoiceResult::new(
        xml,
        hash,
        qr_code,
        Arc::new(certificate),
    ))
}

/// Tags 1-7 must be present and match the invoice; 8 and 9, when present,
/// must match the certificate.
fn verify_qr_tags(
    unsigned: &XmlEvents,
    result: &SignedInvoiceResult,
    signature_b64: &str,
) -> Result<(), VerificationError> {
    let from_invoice = QrPayload::from_events(unsigned)?;
    let certificate = result.certificate();
    let public_key = certificate.public_key_der()?;

    let mut seen = [false; 10];
    for (tag, value) in qr::decode(result.qr_code())? {
        let expected: &[u8] = match tag {
            1 => from_invoice.seller_name().as_bytes(),
            2 => from_invoice.seller_vat().as_bytes(),
            3 => from_invoice.timestamp().as_bytes(),
            4 => from_invoice.total_with_vat().as_bytes(),
            5 => from_invoice.total_vat().as_bytes(),
            6 => result.hash().as_bytes(),
            7 => signature_b64.as_bytes(),
            8 => &public_key,
            9 => certificate.inner().signature.raw_bytes(),
            _ => return Err(VerificationError::QrTagMismatch { tag }),
        };
        let slot = &mut seen[usize::from(tag)];
        if *slot || value != expected {
            warn!(tag, "QR tag mismatch");
            return Err(VerificationError::QrTagMismatch { tag });
        }
        *slot = true;
    }

    match (1u8..=7).find(|&tag| !seen[usize::from(tag)]) {
        Some(tag) => {
            warn!(tag, "QR tag missing");
            Err(VerificationError::QrTagMissing { tag })
        }
        None => Ok(()),
    }
}

fn verify_signature(
    certificate: &Certificate,
    hash_b64: &str,
    signature_b64: &str,
) -> Result<(), VerificationError> {
    let hash = Base64::decode_vec(hash_b64)
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
    let der = Base64::decode_vec(signature_b64)
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
    let signature =
        Signature::from_der(&der).map_err(|e| VerificationError::InvalidSignature(e.to_string()))?;
    certificate
        .verifying_key()?
        .verify(&hash, &signature)
        .map_err(|e| VerificationError::InvalidSignature(e.to_string()))
}
