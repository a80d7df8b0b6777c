use k256::ecdsa::{DerSignature, SigningKey};
use k256::pkcs8::{EncodePrivateKey, LineEnding};
use rand_core::OsRng;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::EncodePem;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use zatca_core::certificate::Certificate;
use zatca_core::invoice::sign::InvoiceSigner;

#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

#[allow(dead_code)]
pub fn sample_invoice_xml() -> String {
    std::fs::read_to_string(fixture_path("invoices/sample-simplified-invoice.xml"))
        .expect("read sample invoice")
}

/// Key pair with a self-signed certificate standing in for a CSID.
#[allow(dead_code)]
pub struct TestCsid {
    pub key: SigningKey,
    pub certificate: Certificate,
}

#[allow(dead_code)]
impl TestCsid {
    pub fn generate() -> Self {
        let key = SigningKey::random(&mut OsRng);
        let spki = SubjectPublicKeyInfoOwned::from_key(key.verifying_key().clone())
            .expect("spki");
        let subject = Name::from_str("CN=PRZEINVOICESCA4-CA,DC=extgazt,DC=gov,DC=local")
            .expect("subject");
        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(1_234_567_890u64),
            Validity::from_now(Duration::from_secs(24 * 3600)).expect("validity"),
            subject,
            spki,
            &key,
        )
        .expect("certificate builder");
        let cert = builder.build::<DerSignature>().expect("certificate");
        let pem = cert.to_pem(LineEnding::LF).expect("certificate pem");
        let certificate = Certificate::from_pem(&pem).expect("parse certificate");
        Self { key, certificate }
    }

    pub fn signer(&self) -> InvoiceSigner {
        InvoiceSigner::new(Arc::new(self.certificate.clone()), self.key.clone()).expect("signer")
    }

    pub fn key_pem(&self) -> String {
        self.key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("key pem")
            .to_string()
    }

    pub fn certificate_pem(&self) -> String {
        use x509_cert::der::Decode;
        x509_cert::Certificate::from_der(self.certificate.to_der())
            .expect("decode certificate")
            .to_pem(LineEnding::LF)
            .expect("certificate pem")
    }
}
