use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
#[validate(non_empty)]
pub struct Sample {
    pub name: String,

    #[validate(skip)]
    pub internal: i32,
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
    let s = Sample::new("test".into(), 10);
    assert!(s.is_ok());
    assert_eq!(s.unwrap().internal, 10);
}
