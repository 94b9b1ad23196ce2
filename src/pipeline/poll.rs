// src/pipeline/poll.rs

//! The poll loop: fetch, diff, notify, persist, sleep, repeat.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::{Classification, Config};
use crate::pipeline::diff::process_cycle;
use crate::services::{Notifier, ThreadSource};
use crate::storage::StateStore;

/// Uniformly random delay between cycles, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDelay {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl PollDelay {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: max_secs.max(min_secs),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.min_delay_secs, config.max_delay_secs)
    }

    /// Draw a fresh delay.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }
}

impl Default for PollDelay {
    fn default() -> Self {
        Self::new(60, 600)
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub notify_failures: usize,
}

/// Drives the fetch → diff → notify → persist cycle.
///
/// The baseline is held for the lifetime of the loop and flushed once per
/// completed cycle. Only persistence failures end the loop; any other
/// cycle error is logged and the next cycle runs after the usual delay.
pub struct PollLoop {
    source: Box<dyn ThreadSource>,
    notifier: Box<dyn Notifier>,
    store: Box<dyn StateStore>,
    delay: PollDelay,
}

impl PollLoop {
    pub fn new(
        source: Box<dyn ThreadSource>,
        notifier: Box<dyn Notifier>,
        store: Box<dyn StateStore>,
        delay: PollDelay,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            delay,
        }
    }

    /// The baseline as currently held in memory.
    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Run a single cycle without sleeping.
    ///
    /// A failed notification is logged and does not stop the baseline from
    /// being updated and flushed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();

        let threads = self.source.fetch_threads().await?;
        let diff = process_cycle(&threads, self.store.as_mut());

        let mut notify_failures = 0;
        if diff.has_changes() {
            for (thread, classification) in diff.changes() {
                if let Err(e) = self.notifier.notify(thread, *classification).await {
                    notify_failures += 1;
                    log::warn!("Notification for {} failed: {}", thread, e);
                }
            }
        } else {
            log::debug!("No changes in {} threads", threads.len());
        }

        self.store.flush().await?;

        Ok(CycleReport {
            started_at,
            finished_at: Utc::now(),
            fetched: threads.len(),
            new: diff.count(Classification::New),
            updated: diff.count(Classification::Updated),
            unchanged: diff.count(Classification::Unchanged),
            notify_failures,
        })
    }

    /// Run exactly one cycle, logging the outcome either way.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        match self.run_cycle().await {
            Ok(report) => {
                log::info!(
                    "Single cycle done: {} threads, {} new, {} updated",
                    report.fetched,
                    report.new,
                    report.updated
                );
                Ok(report)
            }
            Err(e) => {
                log::error!("Cycle failed: {}", e);
                Err(e)
            }
        }
    }

    /// Run cycles until `shutdown` turns true.
    ///
    /// Shutdown is observed between cycles and while sleeping; an in-flight
    /// cycle always completes first.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => log::info!(
                    "Cycle done: {} threads, {} new, {} updated ({} ms)",
                    report.fetched,
                    report.new,
                    report.updated,
                    (report.finished_at - report.started_at).num_milliseconds()
                ),
                Err(e) if e.is_fatal() => {
                    log::error!("Stopping: {}", e);
                    return Err(e);
                }
                Err(e) => log::warn!("Cycle abandoned: {}", e),
            }

            if *shutdown.borrow() {
                break;
            }

            let delay = self.delay.sample(&mut rand::thread_rng());
            log::info!("sleeping {} seconds", delay.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_requested(&mut shutdown) => break,
            }
        }

        log::info!("Shutdown requested, stopping");
        Ok(())
    }
}

/// Resolves once a stop is requested; never resolves if the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::AppError;
    use crate::models::ThreadRecord;

    fn make_thread(id: &str, post_count: u32) -> ThreadRecord {
        ThreadRecord {
            id: id.to_string(),
            title: Some(format!("Thread {id}")),
            link: Some(format!("threads/{id}/")),
            post_count,
            is_sticky: false,
        }
    }

    fn timeout_error() -> AppError {
        AppError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "listing fetch timed out",
        ))
    }

    /// Serves queued pages; requests shutdown on the `stop_on`-th fetch.
    struct FakeSource {
        pages: Mutex<VecDeque<Result<Vec<ThreadRecord>>>>,
        calls: Arc<AtomicUsize>,
        stop_on: Option<(usize, watch::Sender<bool>)>,
    }

    impl FakeSource {
        fn new(pages: Vec<Result<Vec<ThreadRecord>>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: Arc::new(AtomicUsize::new(0)),
                stop_on: None,
            }
        }

        fn stopping_on(mut self, call: usize, tx: watch::Sender<bool>) -> Self {
            self.stop_on = Some((call, tx));
            self
        }
    }

    #[async_trait]
    impl ThreadSource for FakeSource {
        async fn fetch_threads(&self) -> Result<Vec<ThreadRecord>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((stop_on, tx)) = &self.stop_on {
                if call == *stop_on {
                    tx.send_replace(true);
                }
            }
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Clone, Default)]
    struct FakeNotifier {
        seen: Arc<Mutex<Vec<(String, Classification)>>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, thread: &ThreadRecord, classification: Classification) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((thread.id.clone(), classification));
            if self.fail {
                return Err(AppError::notify("smtp unavailable"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        entries: HashMap<String, u32>,
        flushes: Arc<AtomicUsize>,
        fail_flush: bool,
    }

    #[async_trait]
    impl StateStore for FakeStore {
        fn get(&self, thread_id: &str) -> Option<u32> {
            self.entries.get(thread_id).copied()
        }
        fn set(&mut self, thread_id: &str, post_count: u32) {
            self.entries.insert(thread_id.to_string(), post_count);
        }
        fn len(&self) -> usize {
            self.entries.len()
        }
        async fn flush(&mut self) -> Result<()> {
            if self.fail_flush {
                return Err(AppError::persistence("watch.json", "read-only file system"));
            }
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn no_delay() -> PollDelay {
        PollDelay::new(0, 0)
    }

    #[test]
    fn test_delay_stays_in_bounds() {
        let delay = PollDelay::default();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let secs = delay.sample(&mut rng).as_secs();
            assert!((60..=600).contains(&secs), "{secs} out of range");
        }
    }

    #[test]
    fn test_delay_bounds_are_ordered() {
        let delay = PollDelay::new(30, 10);
        assert_eq!(delay, PollDelay { min_secs: 10, max_secs: 30 });
        let fixed = PollDelay::new(5, 5);
        assert_eq!(fixed.sample(&mut rand::thread_rng()), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cycle_reports_new_then_unchanged() {
        let page = vec![make_thread("t1", 5), make_thread("t2", 0)];
        let source = FakeSource::new(vec![Ok(page.clone()), Ok(page)]);
        let notifier = FakeNotifier::default();
        let store = FakeStore::default();
        let flushes = Arc::clone(&store.flushes);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier.clone()),
            Box::new(store),
            no_delay(),
        );

        let first = poll.run_cycle().await.unwrap();
        assert_eq!((first.fetched, first.new, first.updated), (2, 2, 0));

        let second = poll.run_cycle().await.unwrap();
        assert_eq!((second.new, second.unchanged), (0, 2));

        assert_eq!(notifier.seen.lock().unwrap().len(), 2);
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
        assert_eq!(poll.store().get("t1"), Some(5));
    }

    #[tokio::test]
    async fn test_updated_thread_is_notified() {
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 8)])]);
        let notifier = FakeNotifier::default();
        let mut store = FakeStore::default();
        store.set("t1", 5);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier.clone()),
            Box::new(store),
            no_delay(),
        );
        let report = poll.run_cycle().await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(
            *notifier.seen.lock().unwrap(),
            vec![("t1".to_string(), Classification::Updated)]
        );
        assert_eq!(poll.store().get("t1"), Some(8));
    }

    #[tokio::test]
    async fn test_notify_failure_still_persists() {
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 1)])]);
        let notifier = FakeNotifier {
            fail: true,
            ..FakeNotifier::default()
        };
        let store = FakeStore::default();
        let flushes = Arc::clone(&store.flushes);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier),
            Box::new(store),
            no_delay(),
        );
        let report = poll.run_cycle().await.unwrap();

        assert_eq!(report.notify_failures, 1);
        assert_eq!(poll.store().get("t1"), Some(1));
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_skips_cycle_and_continues() {
        let (tx, rx) = watch::channel(false);
        let source = FakeSource::new(vec![Err(timeout_error()), Ok(vec![make_thread("t1", 3)])])
            .stopping_on(2, tx);
        let calls = Arc::clone(&source.calls);
        let notifier = FakeNotifier::default();
        let store = FakeStore::default();
        let flushes = Arc::clone(&store.flushes);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier.clone()),
            Box::new(store),
            no_delay(),
        );
        poll.run(rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *notifier.seen.lock().unwrap(),
            vec![("t1".to_string(), Classification::New)]
        );
    }

    #[tokio::test]
    async fn test_persistence_error_stops_loop() {
        let (_tx, rx) = watch::channel(false);
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 1)])]);
        let calls = Arc::clone(&source.calls);
        let store = FakeStore {
            fail_flush: true,
            ..FakeStore::default()
        };

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(FakeNotifier::default()),
            Box::new(store),
            no_delay(),
        );
        let err = poll.run(rx).await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_once_returns_flush_failure() {
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 1)])]);
        let notifier = FakeNotifier::default();
        let store = FakeStore {
            fail_flush: true,
            ..FakeStore::default()
        };

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier.clone()),
            Box::new(store),
            no_delay(),
        );
        let err = poll.run_once().await.unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, AppError::Persistence { .. }));
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_returns_fetch_failure() {
        let source = FakeSource::new(vec![Err(timeout_error())]);
        let store = FakeStore::default();
        let flushes = Arc::clone(&store.flushes);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(FakeNotifier::default()),
            Box::new(store),
            no_delay(),
        );
        let err = poll.run_once().await.unwrap_err();

        assert!(!err.is_fatal());
        assert_eq!(flushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unchanged_cycle_sends_nothing() {
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 4)])]);
        let notifier = FakeNotifier::default();
        let mut store = FakeStore::default();
        store.set("t1", 4);
        let flushes = Arc::clone(&store.flushes);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(notifier.clone()),
            Box::new(store),
            no_delay(),
        );
        let report = poll.run_once().await.unwrap();

        assert_eq!((report.fetched, report.unchanged), (1, 1));
        assert!(notifier.seen.lock().unwrap().is_empty());
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_cycle() {
        let (tx, rx) = watch::channel(false);
        tx.send_replace(true);
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 1)])]);
        let calls = Arc::clone(&source.calls);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(FakeNotifier::default()),
            Box::new(FakeStore::default()),
            no_delay(),
        );
        poll.run(rx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(poll.store().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (tx, rx) = watch::channel(false);
        let source = FakeSource::new(vec![Ok(vec![make_thread("t1", 1)])]);
        let calls = Arc::clone(&source.calls);

        let mut poll = PollLoop::new(
            Box::new(source),
            Box::new(FakeNotifier::default()),
            Box::new(FakeStore::default()),
            PollDelay::new(3600, 3600),
        );

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(true);
        });

        tokio::time::timeout(Duration::from_secs(5), poll.run(rx))
            .await
            .expect("loop should stop during sleep")
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
