//! Diff calculation against the persisted baseline.
//!
//! Each fetched thread is classified as new, updated or unchanged by
//! comparing its post count with the baseline, and the baseline is then
//! brought up to date in memory. Flushing is left to the caller.

use crate::models::{Classification, ThreadRecord};
use crate::storage::StateStore;

/// Classified threads of one cycle, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub entries: Vec<(ThreadRecord, Classification)>,
}

impl DiffResult {
    /// Check if there are any new or updated threads.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|(_, c)| c.is_change())
    }

    /// Number of threads with the given classification.
    pub fn count(&self, classification: Classification) -> usize {
        self.entries
            .iter()
            .filter(|(_, c)| *c == classification)
            .count()
    }

    /// New and updated threads, in fetch order.
    pub fn changes(&self) -> impl Iterator<Item = &(ThreadRecord, Classification)> {
        self.entries.iter().filter(|(_, c)| c.is_change())
    }
}

/// Classify an observed post count against the baseline value.
///
/// Any difference counts as an update, including a count that went down.
pub fn classify(baseline: Option<u32>, post_count: u32) -> Classification {
    match baseline {
        None => Classification::New,
        Some(seen) if seen != post_count => Classification::Updated,
        Some(_) => Classification::Unchanged,
    }
}

/// Classify `threads` and record their post counts in `store`.
///
/// Every classification is computed against the baseline as it was before
/// this call; a thread id appearing twice is classified the same way both
/// times and the later post count wins.
pub fn process_cycle(threads: &[ThreadRecord], store: &mut dyn StateStore) -> DiffResult {
    let classifications: Vec<Classification> = threads
        .iter()
        .map(|t| classify(store.get(&t.id), t.post_count))
        .collect();

    // Unchanged threads are written too; the set is idempotent.
    for thread in threads {
        store.set(&thread.id, thread.post_count);
    }

    DiffResult {
        entries: threads.iter().cloned().zip(classifications).collect(),
    }
}
