//! In-process fixtures for ledger and overlay tests

pub mod test_utils;

pub use test_utils::*;
