#![allow(dead_code)]

pub mod fake_api;
pub mod fixtures;

pub use fake_api::*;
pub use fixtures::*;
