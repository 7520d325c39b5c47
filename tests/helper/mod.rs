//! Shared fixtures for integration tests

#![allow(dead_code)]

mod fixtures;
mod remote;

pub use fixtures::*;
pub use remote::*;
