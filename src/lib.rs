// src/lib.rs

//! watchwatch: forum listing change watcher

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
