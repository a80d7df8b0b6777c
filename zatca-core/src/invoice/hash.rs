//! Invoice hash over the signature-free document.
use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};

use super::xml::{XmlEvents, XmlResult};

/// Base64 SHA-256 of the invoice with `UBLExtensions`, `cac:Signature` and the
/// QR reference removed.
///
/// Signing only adds those elements, so the hash of a signed document equals
/// the hash of the invoice it was produced from.
///
/// # Examples
/// ```rust
/// use zatca_core::invoice::hash::invoice_hash_base64;
///
/// let unsigned = "<Invoice><ID>1</ID></Invoice>";
/// let signed = "<Invoice><UBLExtensions/><ID>1</ID><Signature/></Invoice>";
/// assert_eq!(invoice_hash_base64(unsigned)?, invoice_hash_base64(signed)?);
/// # Ok::<(), zatca_core::invoice::xml::InvoiceXmlError>(())
/// ```
pub fn invoice_hash_base64(xml: &str) -> XmlResult<String> {
    let events = XmlEvents::parse(xml)?;
    hash_events(&events.without_signature_elements())
}

/// The exact text that [`invoice_hash_base64`] digests.
pub fn hash_input(xml: &str) -> XmlResult<String> {
    XmlEvents::parse(xml)?
        .without_signature_elements()
        .to_hash_input()
}

/// Hash of events that are already signature-free.
pub(crate) fn hash_events(stripped: &XmlEvents) -> XmlResult<String> {
    let input = stripped.to_hash_input()?;
    Ok(Base64::encode_string(&Sha256::digest(input.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_is_not_hashed() {
        let with_decl = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Invoice><ID>1</ID></Invoice>";
        let without = "<Invoice><ID>1</ID></Invoice>";
        assert_eq!(
            invoice_hash_base64(with_decl).unwrap(),
            invoice_hash_base64(without).unwrap()
        );
        assert_eq!(hash_input(with_decl).unwrap(), without);
    }

    #[test]
    fn content_changes_change_the_hash() {
        let a = invoice_hash_base64("<Invoice><ID>1</ID></Invoice>").unwrap();
        let b = invoice_hash_base64("<Invoice><ID>2</ID></Invoice>").unwrap();
        assert_ne!(a, b);
        assert_eq!(Base64::decode_vec(&a).unwrap().len(), 32);
    }

    #[test]
    fn non_qr_references_stay_in_the_hash() {
        let base = "<Invoice><ID>1</ID></Invoice>";
        let pih = "<Invoice><ID>1</ID><AdditionalDocumentReference><ID>PIH</ID></AdditionalDocumentReference></Invoice>";
        let qr = "<Invoice><ID>1</ID><AdditionalDocumentReference><ID>QR</ID></AdditionalDocumentReference></Invoice>";
        let base_hash = invoice_hash_base64(base).unwrap();
        assert_ne!(invoice_hash_base64(pih).unwrap(), base_hash);
        assert_eq!(invoice_hash_base64(qr).unwrap(), base_hash);
    }
}
