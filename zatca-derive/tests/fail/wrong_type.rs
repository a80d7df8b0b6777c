#![allow(dead_code)]
use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
pub struct Sample {
    #[validate(non_empty)]
    pub count: u32,
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

fn main() {}
