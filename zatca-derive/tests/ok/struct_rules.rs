use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
#[validate(non_empty, no_special_chars)]
pub struct Csr {
    pub common_name: String,
    pub organization_name: String,
}

#[derive(Debug)]
pub struct Invalid {
    pub cause: String,
    pub code: i32,
}

impl Invalid {
    pub fn new(cause: impl Into<String>, code: i32) -> Self {
        Self {
            cause: cause.into(),
            code,
        }
    }
}

fn main() {
    let c = Csr::new("ACME".into(), "Acme Trading".into());
    assert!(c.is_ok());

    let err = Csr::new("  ".into(), "Acme".into()).err().unwrap();
    assert_eq!(err.code, 4001);
    assert_eq!(err.cause, "common_name must be non-empty");

    let err = Csr::new("ACME".into(), "Acme & Sons".into()).err().unwrap();
    assert_eq!(err.code, 4002);
    assert_eq!(err.cause, "organization_name must not contain special characters");
}
