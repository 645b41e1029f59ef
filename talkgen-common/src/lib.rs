//! # talkgen Common Library
//!
//! Shared code for the talkgen worker and launcher:
//! - Configuration loading (TOML file, environment, command line)
//! - Common error type
//! - Tracing subscriber setup
//! - Deadline-bounded readiness polling

pub mod config;
pub mod error;
pub mod logging;
pub mod poll;

pub use error::{Error, Result};
