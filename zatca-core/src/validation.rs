//! CSR and structural validation failures.
use thiserror::Error;

/// Prefix carried by every [`ValidationError`] message.
///
/// Downstream systems match on this text, keep it byte-for-byte stable.
pub const MESSAGE_PREFIX: &str = "The given data was invalid::";

/// A CSR or structural input check failed.
///
/// The displayed message is always [`MESSAGE_PREFIX`] followed by the cause.
/// `code` is opaque here; its meaning is owned by the caller (see [`codes`]).
///
/// # Examples
/// ```rust
/// use zatca_core::ValidationError;
///
/// let err = ValidationError::new("missing subject CN", 4001);
/// assert_eq!(err.to_string(), "The given data was invalid::missing subject CN");
/// assert_eq!(err.code(), 4001);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{prefix}{cause}", prefix = MESSAGE_PREFIX)]
pub struct ValidationError {
    cause: String,
    code: i32,
}

impl ValidationError {
    pub fn new(cause: impl Into<String>, code: i32) -> Self {
        Self {
            cause: cause.into(),
            code,
        }
    }

    /// The full, displayable message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// What was invalid, without the prefix.
    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

/// Code registry for CSR validation failures.
///
/// The rule codes (`EMPTY_FIELD` .. `INVALID_EGS_SERIAL`) are the ones emitted by
/// `#[derive(Validate)]`.
pub mod codes {
    pub const EMPTY_FIELD: i32 = 4001;
    pub const SPECIAL_CHARACTERS: i32 = 4002;
    pub const INVALID_COUNTRY_CODE: i32 = 4003;
    pub const MISSING_PROPERTY: i32 = 4004;
    pub const INVALID_SUBJECT: i32 = 4005;
    pub const INVALID_SAN: i32 = 4006;
    pub const INVALID_VAT_NUMBER: i32 = 4007;
    pub const INVALID_INVOICE_TYPE: i32 = 4008;
    pub const INVALID_EGS_SERIAL: i32 = 4009;
}
