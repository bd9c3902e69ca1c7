//! Application configuration
//!
//! Turns the TOML file and command line overrides into the components a run
//! is built from.

mod config;

pub use config::Config;
