use base64ct::{Base64, Encoding};
use thiserror::Error;

use super::xml::{paths, InvoiceXmlError, XmlEvents};

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("TLV field {tag} exceeds 255 bytes (len={len})")]
    ValueTooLong { tag: u8, len: usize },
    #[error("QR code payload exceeds {max} characters once base64 encoded (len={len})")]
    EncodedTooLong { len: usize, max: usize },
    #[error("QR code is not valid base64: {0}")]
    Base64(#[from] base64ct::Error),
    #[error("QR code TLV data is truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("QR XML error: {0}")]
    Xml(#[from] InvoiceXmlError),
}

pub type QrResult<T> = std::result::Result<T, QrCodeError>;

/// Phase 2 QR contents, TLV tags 1 through 9.
#[derive(Debug, Clone)]
pub struct QrPayload {
    seller_name: String,
    seller_vat: String,
    timestamp: String,
    total_with_vat: String,
    total_vat: String,
    invoice_hash: Option<String>,
    signature: Option<String>,
    public_key: Option<Vec<u8>>,
    certificate_signature: Option<Vec<u8>>,
}

impl QrPayload {
    pub(crate) fn from_events(doc: &XmlEvents) -> QrResult<Self> {
        let seller_name = doc.required_text(paths::SELLER_NAME, "seller name")?;
        let seller_vat = doc.required_text(paths::SELLER_VAT, "seller VAT")?;
        let issue_date = doc.required_text(paths::ISSUE_DATE, "issue date")?;
        let issue_time = doc.required_text(paths::ISSUE_TIME, "issue time")?;
        let total_with_vat = doc.required_text(paths::TOTAL_WITH_VAT, "total with VAT")?;
        let total_vat = doc.required_text(paths::TOTAL_VAT, "total VAT")?;

        let issue_time = issue_time.trim_end_matches('Z');
        Ok(Self {
            seller_name,
            seller_vat,
            timestamp: format!("{issue_date}T{issue_time}Z"),
            total_with_vat,
            total_vat,
            invoice_hash: None,
            signature: None,
            public_key: None,
            certificate_signature: None,
        })
    }

    /// Reads tags 1-5 from an invoice document.
    pub fn from_invoice_xml(xml: &str) -> QrResult<Self> {
        Self::from_events(&XmlEvents::parse(xml)?)
    }

    pub fn with_signing_parts(
        mut self,
        invoice_hash: &str,
        signature: &str,
        public_key_der: &[u8],
        certificate_signature: Option<&[u8]>,
    ) -> Self {
        self.invoice_hash = Some(invoice_hash.to_string());
        self.signature = Some(signature.to_string());
        self.public_key = Some(public_key_der.to_vec());
        self.certificate_signature = certificate_signature.map(<[u8]>::to_vec);
        self
    }

    pub fn seller_name(&self) -> &str {
        &self.seller_name
    }

    pub fn seller_vat(&self) -> &str {
        &self.seller_vat
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn total_with_vat(&self) -> &str {
        &self.total_with_vat
    }

    pub fn total_vat(&self) -> &str {
        &self.total_vat
    }

    /// Base64 TLV payload, rejected when longer than `max_len` characters.
    pub fn encode(&self, max_len: usize) -> QrResult<String> {
        let mut tlv = TlvBuilder::new();
        tlv.push_str(1, &self.seller_name)?;
        tlv.push_str(2, &self.seller_vat)?;
        tlv.push_str(3, &self.timestamp)?;
        tlv.push_str(4, &self.total_with_vat)?;
        tlv.push_str(5, &self.total_vat)?;

        if let Some(hash) = self.invoice_hash.as_deref() {
            tlv.push_str(6, hash)?;
        }
        if let Some(sig) = self.signature.as_deref() {
            tlv.push_str(7, sig)?;
        }
        if let Some(pk) = self.public_key.as_deref() {
            tlv.push_bytes(8, pk)?;
        }
        if let Some(stamp_sig) = self.certificate_signature.as_deref() {
            tlv.push_bytes(9, stamp_sig)?;
        }

        tlv.finish(max_len)
    }
}

/// The QR payload embedded in an invoice, if it carries one.
pub fn embedded_qr(xml: &str) -> QrResult<Option<String>> {
    Ok(XmlEvents::parse(xml)?.qr_value()?)
}

/// Splits a base64 QR payload into `(tag, value)` pairs.
pub fn decode(encoded: &str) -> QrResult<Vec<(u8, Vec<u8>)>> {
    let bytes = Base64::decode_vec(encoded.trim())?;
    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        let (tag, len) = match (bytes.get(idx), bytes.get(idx + 1)) {
            (Some(&tag), Some(&len)) => (tag, len as usize),
            _ => return Err(QrCodeError::Truncated { offset: idx }),
        };
        let start = idx + 2;
        let end = start + len;
        let value = bytes
            .get(start..end)
            .ok_or(QrCodeError::Truncated { offset: idx })?;
        entries.push((tag, value.to_vec()));
        idx = end;
    }
    Ok(entries)
}

struct TlvBuilder {
    bytes: Vec<u8>,
}

impl TlvBuilder {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn push_str(&mut self, tag: u8, value: &str) -> QrResult<()> {
        self.push_bytes(tag, value.as_bytes())
    }

    fn push_bytes(&mut self, tag: u8, value: &[u8]) -> QrResult<()> {
        if value.len() > u8::MAX as usize {
            return Err(QrCodeError::ValueTooLong {
                tag,
                len: value.len(),
            });
        }
        self.bytes.push(tag);
        self.bytes.push(value.len() as u8);
        self.bytes.extend_from_slice(value);
        Ok(())
    }

    fn finish(self, max_len: usize) -> QrResult<String> {
        let encoded = Base64::encode_string(&self.bytes);
        if encoded.len() > max_len {
            return Err(QrCodeError::EncodedTooLong {
                len: encoded.len(),
                max: max_len,
            });
        }
        Ok(encoded)
    }
}
