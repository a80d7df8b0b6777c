//! Rust toolkit for ZATCA Phase 2 e-invoicing: CSR validation, invoice signing
//! and the signed-invoice result bundle.
//!
//! # Examples
//! ```rust
//! use zatca_core::config::{Config, EnvironmentType};
//!
//! let config = Config::new(EnvironmentType::NonProduction);
//! # let _ = config;
//! ```
pub mod certificate;
pub mod config;
pub mod csr;
pub mod invoice;
pub mod validation;

use thiserror::Error;

pub use invoice::SignedInvoiceResult;
pub use validation::ValidationError;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] validation::ValidationError),
    #[error(transparent)]
    Csr(#[from] csr::CsrError),
    #[error(transparent)]
    Certificate(#[from] certificate::CertificateError),
    #[error(transparent)]
    Xml(#[from] invoice::xml::InvoiceXmlError),
    #[error(transparent)]
    Qr(#[from] invoice::qr::QrCodeError),
    #[error(transparent)]
    Signing(#[from] invoice::sign::SigningError),
    #[error(transparent)]
    Verification(#[from] invoice::verify::VerificationError),
    #[error(transparent)]
    Config(#[from] config::EnvironmentParseError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::certificate::CertificateError;
    use crate::config::EnvironmentParseError;
    use crate::csr::CsrError;
    use crate::invoice::qr::QrCodeError;
    use crate::invoice::sign::SigningError;
    use crate::invoice::verify::VerificationError;
    use crate::invoice::xml::InvoiceXmlError;
    use crate::validation::{codes, ValidationError};

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = ValidationError::new("missing subject CN", codes::EMPTY_FIELD).into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "The given data was invalid::missing subject CN");

        let err: Error = CsrError::RequestBuild {
            message: "csr".into(),
        }
        .into();
        assert!(matches!(err, Error::Csr(_)));

        let err: Error = CertificateError::TokenEncoding.into();
        assert!(matches!(err, Error::Certificate(_)));

        let err: Error = InvoiceXmlError::Empty.into();
        assert!(matches!(err, Error::Xml(_)));

        let err: Error = QrCodeError::Truncated { offset: 0 }.into();
        assert!(matches!(err, Error::Qr(_)));

        let err: Error = SigningError::KeyMismatch.into();
        assert!(matches!(err, Error::Signing(_)));

        let err: Error = VerificationError::DigestMismatch.into();
        assert!(matches!(err, Error::Verification(_)));

        let err: Error = EnvironmentParseError::Invalid {
            input: "staging".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn csr_validation_failures_keep_their_code() {
        let err: CsrError = ValidationError::new("bad", codes::INVALID_SAN).into();
        assert_eq!(err.validation_code(), Some(codes::INVALID_SAN));
        assert_eq!(err.to_string(), "The given data was invalid::bad");
    }
}
