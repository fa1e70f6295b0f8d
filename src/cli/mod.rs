//! Command-line interface
//!
//! Argument parsing for the `floodchain` binary.

pub mod commands;

pub use commands::{Command, Opt};
