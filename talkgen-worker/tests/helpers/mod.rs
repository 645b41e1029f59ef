//! Test Helper Utilities
//!
//! Shared utilities for testing talkgen-worker against a stub engine

pub mod stub_engine;

pub use stub_engine::{StubEngine, unused_engine_url};
