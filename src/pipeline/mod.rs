//! Change-detection pipeline.
//!
//! - `process_cycle`: classify fetched threads against the baseline
//! - `PollLoop`: run fetch → diff → notify → persist forever with jitter

pub mod diff;
pub mod poll;

pub use diff::{DiffResult, classify, process_cycle};
pub use poll::{CycleReport, PollDelay, PollLoop};
