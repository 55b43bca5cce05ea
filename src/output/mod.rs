//! Output module for reporting crawl results
//!
//! This module handles printing the run history recorded in the archive.

mod history;

pub use history::{format_run_line, load_history, print_history, RunHistory};
