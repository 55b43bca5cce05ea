//! Configuration module for Chan-Archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! with a small set of pacing knobs that can be overridden from the environment.
//!
//! # Example
//!
//! ```no_run
//! use chan_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Workers per board: {}", config.scraper.max_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BoardEntry, Config, OutputConfig, RemoteConfig, ScraperConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
