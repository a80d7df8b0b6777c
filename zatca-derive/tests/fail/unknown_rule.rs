#![allow(dead_code)]
use zatca_derive::Validate;

#[derive(Validate)]
#[validate_error(Invalid)]
#[validate(not_a_rule)]
pub struct Person {
    pub name: String,
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
