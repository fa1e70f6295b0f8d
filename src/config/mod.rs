//! Node configuration
//!
//! Defaults, an optional TOML file and environment overrides, read through
//! typed getters on the process-wide [`GLOBAL_CONFIG`].

pub mod settings;

pub use settings::{Config, CONFIG_FILE_ENV, GLOBAL_CONFIG};
