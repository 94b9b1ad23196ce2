// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod thread;

// Re-export all public types
pub use config::{Config, EmailConfig, NotifyChannel};
pub use thread::{Classification, ThreadRecord};
