//! Invoice signing pipeline.
//!
//! An unsigned UBL invoice goes through [`sign::InvoiceSigner`] and comes out
//! as a [`SignedInvoiceResult`]: the signed XML, its hash, the QR payload and
//! the certificate that signed it.
pub mod hash;
pub mod qr;
pub mod request;
pub mod sign;
mod signed;
pub mod verify;
pub mod xml;

pub use signed::SignedInvoiceResult;
