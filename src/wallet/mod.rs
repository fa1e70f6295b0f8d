//! Signing capability
//!
//! The `Signer` trait is what transaction authors implement; `Wallet` is
//! the in-process P-384 key holder used by the binary and the tests.

pub mod wallet;

pub use wallet::{Signer, Wallet};
