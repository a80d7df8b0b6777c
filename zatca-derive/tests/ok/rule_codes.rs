use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
pub struct Egs {
    #[validate(non_empty, is_vat_number)]
    pub vat: String,
    #[validate(is_invoice_type)]
    pub invoice_type: String,
    #[validate(is_egs_serial)]
    pub serial: String,
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
    let ok = Egs::new(
        "399999999900003".into(),
        "1100".into(),
        "1-TST|2-TST|3-ed22f1d8".into(),
    );
    assert!(ok.is_ok());

    let err = Egs::new("".into(), "1100".into(), "1-a|2-b|3-c".into())
        .err()
        .unwrap();
    assert_eq!(err.code, 4001);

    let err = Egs::new("123".into(), "1100".into(), "1-a|2-b|3-c".into())
        .err()
        .unwrap();
    assert_eq!(err.code, 4007);

    let err = Egs::new("399999999900003".into(), "0000".into(), "1-a|2-b|3-c".into())
        .err()
        .unwrap();
    assert_eq!(err.code, 4008);

    let err = Egs::new("399999999900003".into(), "0100".into(), "1-a|3-b|2-c".into())
        .err()
        .unwrap();
    assert_eq!(err.code, 4009);
    assert!(err.cause.starts_with("serial "));
}
