mod common;

use base64ct::{Base64, Encoding};
use common::{sample_invoice_xml, TestCsid};
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::Signature;
use k256::pkcs8::EncodePrivateKey;
use std::sync::Arc;
use zatca_core::invoice::hash::{hash_input, invoice_hash_base64};
use zatca_core::invoice::qr::{self, QrPayload};
use zatca_core::invoice::request::SubmissionRequest;
use zatca_core::invoice::sign::{InvoiceSigner, SigningError};
use zatca_core::invoice::verify::{load_signed_invoice, verify_signed_invoice, VerificationError};
use zatca_core::SignedInvoiceResult;

#[test]
fn hash_is_recomputable_from_signed_invoice() {
    let csid = TestCsid::generate();
    let unsigned = sample_invoice_xml();
    let result = csid.signer().sign_xml(&unsigned).unwrap();

    assert_eq!(invoice_hash_base64(result.invoice()).unwrap(), result.hash());
    assert_eq!(invoice_hash_base64(&unsigned).unwrap(), result.hash());
    assert_eq!(
        hash_input(result.invoice()).unwrap(),
        hash_input(&unsigned).unwrap()
    );
}

#[test]
fn signed_invoice_has_the_signature_structure() {
    let csid = TestCsid::generate();
    let result = csid.signer().sign_xml(&sample_invoice_xml()).unwrap();
    let xml = result.invoice();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<ext:UBLExtensions"));
    assert!(xml.contains("<ds:SignatureValue>"));
    assert!(xml.contains("<cbc:ID>QR</cbc:ID>"));
    assert!(xml.contains("<cac:Signature>"));
    assert!(xml.contains(&format!(
        "<ds:X509SerialNumber xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">{}</ds:X509SerialNumber>",
        csid.certificate.serial_number()
    )));

    let qr_ref = xml.find("<cbc:ID>QR</cbc:ID>").unwrap();
    let pih_ref = xml.find("<cbc:ID>PIH</cbc:ID>").unwrap();
    let supplier = xml.find("<cac:AccountingSupplierParty>").unwrap();
    assert!(pih_ref < qr_ref && qr_ref < supplier);
}

#[test]
fn qr_code_carries_invoice_and_signature_values() {
    let csid = TestCsid::generate();
    let result = csid.signer().sign_xml(&sample_invoice_xml()).unwrap();
    assert!(result.qr_code().len() <= 700);

    let fields = qr::decode(result.qr_code()).unwrap();
    let tags: Vec<u8> = fields.iter().map(|(tag, _)| *tag).collect();
    assert_eq!(tags, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);

    let value = |tag: u8| fields.iter().find(|(t, _)| *t == tag).unwrap().1.clone();
    assert_eq!(
        String::from_utf8(value(1)).unwrap(),
        "شركة توريد التكنولوجيا بأقصى سرعة المحدودة | Maximum Speed Tech Supply LTD"
    );
    assert_eq!(value(2), b"399999999900003");
    assert_eq!(value(3), b"2022-08-17T17:41:08Z");
    assert_eq!(value(4), b"4.60");
    assert_eq!(value(5), b"0.60");
    assert_eq!(value(6), result.hash().as_bytes());
    assert_eq!(value(8), csid.certificate.public_key_der().unwrap());
    assert_eq!(
        Base64::encode_string(&value(9)),
        csid.certificate.signature_base64()
    );

    let signature_b64 = String::from_utf8(value(7)).unwrap();
    let signature = Signature::from_der(&Base64::decode_vec(&signature_b64).unwrap()).unwrap();
    let hash = Base64::decode_vec(result.hash()).unwrap();
    csid.key.verifying_key().verify(&hash, &signature).unwrap();
}

#[test]
fn unsigned_qr_payload_matches_signed_prefix() {
    let csid = TestCsid::generate();
    let unsigned = sample_invoice_xml();
    let result = csid.signer().sign_xml(&unsigned).unwrap();

    let payload = QrPayload::from_invoice_xml(&unsigned).unwrap();
    assert_eq!(payload.seller_vat(), "399999999900003");
    let five_tags = qr::decode(&payload.encode(700).unwrap()).unwrap();
    let signed_tags = qr::decode(result.qr_code()).unwrap();
    assert_eq!(five_tags[..], signed_tags[..5]);
}

#[test]
fn signed_invoice_verifies_and_reloads() {
    let csid = TestCsid::generate();
    let result = csid.signer().sign_xml(&sample_invoice_xml()).unwrap();
    verify_signed_invoice(&result).unwrap();

    let loaded = load_signed_invoice(result.invoice()).unwrap();
    assert_eq!(loaded.hash(), result.hash());
    assert_eq!(loaded.qr_code(), result.qr_code());
    assert_eq!(loaded.certificate(), &csid.certificate);
    verify_signed_invoice(&loaded).unwrap();
}

#[test]
fn tampered_invoice_fails_verification() {
    let csid = TestCsid::generate();
    let result = csid.signer().sign_xml(&sample_invoice_xml()).unwrap();
    let tampered_xml = result
        .invoice()
        .replace("<cbc:PayableAmount currencyID=\"SAR\">4.60", "<cbc:PayableAmount currencyID=\"SAR\">0.01");
    assert_ne!(tampered_xml, result.invoice());

    let tampered = load_signed_invoice(&tampered_xml).unwrap();
    assert!(matches!(
        verify_signed_invoice(&tampered),
        Err(VerificationError::HashMismatch { .. })
    ));

    let wrong_hash = SignedInvoiceResult::new(
        result.invoice(),
        invoice_hash_base64(&tampered_xml).unwrap(),
        result.qr_code(),
        result.certificate_arc(),
    );
    assert!(matches!(
        verify_signed_invoice(&wrong_hash),
        Err(VerificationError::HashMismatch { .. })
    ));
}

#[test]
fn signer_loads_from_pem_and_der() {
    let csid = TestCsid::generate();
    let from_pem = InvoiceSigner::from_pem(&csid.certificate_pem(), &csid.key_pem()).unwrap();
    assert_eq!(from_pem.certificate(), &csid.certificate);

    let key_der = csid.key.to_pkcs8_der().unwrap();
    let from_der = InvoiceSigner::from_der(csid.certificate.to_der(), key_der.as_bytes()).unwrap();

    let unsigned = sample_invoice_xml();
    assert_eq!(
        from_pem.sign_xml(&unsigned).unwrap().invoice(),
        from_der.sign_xml(&unsigned).unwrap().invoice()
    );

    assert!(matches!(
        InvoiceSigner::from_pem(&csid.certificate_pem(), "not a key"),
        Err(SigningError::PrivateKey(_))
    ));
}

#[test]
fn mismatched_key_is_rejected() {
    let csid = TestCsid::generate();
    let other = TestCsid::generate();
    assert!(matches!(
        InvoiceSigner::new(Arc::new(csid.certificate.clone()), other.key.clone()),
        Err(SigningError::KeyMismatch)
    ));
}

#[test]
fn submission_request_wraps_the_signed_invoice() {
    let csid = TestCsid::generate();
    let result = csid.signer().sign_xml(&sample_invoice_xml()).unwrap();
    let request = SubmissionRequest::from_result(&result).unwrap();
    assert_eq!(request.uuid, "8e6000cf-1a98-4174-b3e7-b5d5954bc10d");
    assert_eq!(request.invoice_hash, result.hash());

    let decoded = Base64::decode_vec(&request.invoice).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), result.invoice());
}
