#![allow(dead_code)]
use zatca_derive::Validate;

#[derive(Validate)]
#[validate(non_empty)]
pub struct Sample {
    pub name: String,
}

fn main() {}
