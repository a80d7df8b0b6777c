use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
pub struct Person {
    pub name: String,
    #[validate(is_country_code)]
    pub country: String,
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
    let p = Person::new("Mohamad".into(), "SA".into());
    assert!(p.is_ok());

    let err = Person::new("Mohamad".into(), "XX".into()).err().unwrap();
    assert_eq!(err.code, 4003);
    assert_eq!(err.cause, "country must be a valid country code");
}
