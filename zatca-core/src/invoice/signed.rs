use base64ct::{Base64, Encoding};
use std::sync::Arc;

use crate::certificate::Certificate;

/// A signed invoice together with the values derived from it.
///
/// Produced by [`InvoiceSigner`](super::sign::InvoiceSigner). All fields are set
/// at construction and never change; the hash and QR payload always describe the
/// invoice held alongside them.
#[derive(Debug, Clone)]
pub struct SignedInvoiceResult {
    invoice: String,
    hash: String,
    qr_code: String,
    certificate: Arc<Certificate>,
}

impl SignedInvoiceResult {
    /// Bundles an already signed invoice.
    ///
    /// Inputs are taken as given. An empty invoice is a caller bug and only
    /// trips a debug assertion.
    pub fn new(
        invoice: impl Into<String>,
        hash: impl Into<String>,
        qr_code: impl Into<String>,
        certificate: Arc<Certificate>,
    ) -> Self {
        let invoice = invoice.into();
        debug_assert!(!invoice.is_empty(), "signed invoice must not be empty");
        Self {
            invoice,
            hash: hash.into(),
            qr_code: qr_code.into(),
            certificate,
        }
    }

    /// The signed invoice XML, exactly as produced.
    pub fn invoice(&self) -> &str {
        &self.invoice
    }

    /// Base64 SHA-256 of the invoice's hash input.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn qr_code(&self) -> &str {
        &self.qr_code
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_arc(&self) -> Arc<Certificate> {
        Arc::clone(&self.certificate)
    }

    /// Standard base64 of the invoice, recomputed on each call.
    pub fn encoded_signed_xml(&self) -> String {
        Base64::encode_string(self.invoice.as_bytes())
    }
}
