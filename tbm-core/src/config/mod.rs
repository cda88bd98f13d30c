//! Configuration module for tbm.
//!
//! Manages runtime settings stored as JSON.

mod settings;

pub use settings::{Settings, CONCURRENCY, DEFAULT_ARCHITECTURE, DEFAULT_USER_AGENT};
