//! Persistence of the thread baseline.
//!
//! The baseline maps each thread id to the post count observed on the
//! previous cycle. It is read before it is written and only becomes
//! durable when [`StateStore::flush`] returns.
//!
//! ```text
//! watch.json
//! {
//!   "thread-1201": 3,
//!   "thread-1187": 14
//! }
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStateStore;

/// Trait for baseline storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last observed post count for a thread, if any.
    fn get(&self, thread_id: &str) -> Option<u32>;

    /// Record the observed post count for a thread (in memory only).
    fn set(&mut self, thread_id: &str, post_count: u32);

    /// Number of tracked threads.
    fn len(&self) -> usize;

    /// Whether no thread is tracked yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the in-memory baseline to durable storage.
    async fn flush(&mut self) -> Result<()>;
}
