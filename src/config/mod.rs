//! Configuration management module
//!
//! Provides YAML-based configuration following Wings patterns.

mod config;

pub use config::*;
