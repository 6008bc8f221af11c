//! Progress monitoring for long-running batches.
//!
//! The monitor polls a [`ProgressSource`] at a fixed cadence and reports
//! `(completed, total)` whenever the fill level moves. If it stops moving for
//! longer than the stall timeout the monitor gives up with
//! [`Error::Stalled`]. It never touches the producing tasks; the only shared
//! state is the source itself.
//!
//! # Usage
//!
//! ```ignore
//! let collector = ResultCollector::new(total);
//! let monitor = ProgressMonitor::new(Duration::from_millis(200), Duration::from_secs(30));
//! let (fetched, watched) = tokio::join!(
//!     fetcher.fetch_all(&query, total, &collector),
//!     monitor.watch(&collector, total, |p| println!("{}/{}", p.completed, p.total)),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::collector::ProgressSource;
use crate::config::ProgressSettings;
use crate::Error;

/// A `(completed, total)` snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Completion ratio in `0.0..=1.0`; zero totals count as done
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Events sent by a spawned monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The fill level changed
    Update(Progress),
    /// The source reached a terminal state
    Finished(Progress),
    /// No change within the stall timeout
    Stalled(Progress),
}

/// Polls a progress source and detects stalled batches
#[derive(Debug, Clone, Copy)]
pub struct ProgressMonitor {
    interval: Duration,
    stall_timeout: Duration,
}

impl ProgressMonitor {
    pub fn new(interval: Duration, stall_timeout: Duration) -> Self {
        Self {
            interval,
            stall_timeout,
        }
    }

    pub fn from_settings(settings: &ProgressSettings) -> Self {
        Self::new(settings.interval(), settings.stall_timeout())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stall_timeout(&self) -> Duration {
        self.stall_timeout
    }

    /// Poll `source` until it is done, calling `on_update` on every change.
    ///
    /// The first poll always reports. Returns the final snapshot, or
    /// [`Error::Stalled`] when the fill level did not move for the stall
    /// timeout while the source was still open.
    pub async fn watch<S, F>(&self, source: &S, total: usize, mut on_update: F) -> Result<Progress, Error>
    where
        S: ProgressSource + ?Sized,
        F: FnMut(Progress),
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<usize> = None;
        let mut last_change = Instant::now();

        loop {
            ticker.tick().await;

            let progress = Progress::new(source.completed(), total);
            if last != Some(progress.completed) {
                on_update(progress);
                last = Some(progress.completed);
                last_change = Instant::now();
            }

            if source.is_done() {
                debug!(completed = progress.completed, total, "Progress source finished");
                return Ok(progress);
            }

            let waited = last_change.elapsed();
            if waited >= self.stall_timeout {
                warn!(
                    completed = progress.completed,
                    total,
                    ?waited,
                    "No progress within stall timeout"
                );
                return Err(Error::Stalled {
                    completed: progress.completed,
                    total,
                    waited,
                });
            }
        }
    }

    /// Run [`watch`](Self::watch) on its own task, reporting through a channel.
    ///
    /// Cancelling `cancel` stops only the monitor; the task then resolves to
    /// [`Error::Cancelled`]. A dropped receiver does not stop polling.
    pub fn spawn<S>(
        &self,
        source: Arc<S>,
        total: usize,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Progress, Error>>
    where
        S: ProgressSource + 'static,
    {
        let monitor = *self;
        tokio::spawn(async move {
            let watched = monitor.watch(source.as_ref(), total, |progress| {
                let _ = events.send(ProgressEvent::Update(progress));
            });

            tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = watched => {
                    match &result {
                        Ok(progress) => {
                            let _ = events.send(ProgressEvent::Finished(*progress));
                        }
                        Err(Error::Stalled { completed, total, .. }) => {
                            let _ = events.send(ProgressEvent::Stalled(Progress::new(*completed, *total)));
                        }
                        Err(_) => {}
                    }
                    result
                }
            }
        })
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::from_settings(&ProgressSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ResultCollector;

    fn monitor() -> ProgressMonitor {
        ProgressMonitor::new(Duration::from_millis(200), Duration::from_secs(1))
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress::new(1, 4).fraction(), 0.25);
        assert_eq!(Progress::new(0, 0).fraction(), 1.0);
        assert_eq!(Progress::new(5, 4).fraction(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_finishes_when_full() {
        let collector = Arc::new(ResultCollector::new(3));

        let producer = {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move {
                for rank in 0..3 {
                    time::sleep(Duration::from_millis(300)).await;
                    collector.put(rank, rank);
                }
            })
        };

        let mut updates = Vec::new();
        let result = monitor()
            .watch(collector.as_ref(), 3, |p| updates.push(p.completed))
            .await;
        producer.await.unwrap();

        assert_eq!(result.unwrap(), Progress::new(3, 3));
        assert_eq!(updates.first(), Some(&0));
        assert_eq!(updates.last(), Some(&3));
        assert!(updates.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_finishes_when_closed_short() {
        let collector = ResultCollector::new(10);
        collector.put(0, ());
        collector.close();

        let result = monitor().watch(&collector, 10, |_| {}).await;
        assert_eq!(result.unwrap(), Progress::new(1, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_detects_stall_within_one_interval() {
        let collector = ResultCollector::new(3);
        collector.put(0, ());

        let start = Instant::now();
        let result = monitor().watch(&collector, 3, |_| {}).await;
        let elapsed = start.elapsed();

        match result {
            Err(Error::Stalled { completed, total, .. }) => {
                assert_eq!(completed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected stall, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed <= Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_resets_stall_timer() {
        let collector = Arc::new(ResultCollector::new(2));

        let producer = {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(800)).await;
                collector.put(0, ());
                time::sleep(Duration::from_millis(800)).await;
                collector.put(1, ());
            })
        };

        // Total wait exceeds the stall timeout, but no single gap does.
        let result = monitor().watch(collector.as_ref(), 2, |_| {}).await;
        producer.await.unwrap();
        assert_eq!(result.unwrap(), Progress::new(2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_monitor_sends_events() {
        let collector = Arc::new(ResultCollector::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = monitor().spawn(Arc::clone(&collector), 1, tx, CancellationToken::new());
        time::sleep(Duration::from_millis(250)).await;
        collector.put(0, ());

        let result = handle.await.unwrap();
        assert_eq!(result.unwrap(), Progress::new(1, 1));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.first(), Some(&ProgressEvent::Update(Progress::new(0, 1))));
        assert_eq!(events.last(), Some(&ProgressEvent::Finished(Progress::new(1, 1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_monitor_reports_stall() {
        let collector = Arc::new(ResultCollector::<()>::new(2));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = monitor().spawn(collector, 2, tx, CancellationToken::new());
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Stalled { .. })));

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(ProgressEvent::Stalled(Progress::new(0, 2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_monitor_leaves_source_alone() {
        let collector = Arc::new(ResultCollector::new(2));
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = monitor().spawn(Arc::clone(&collector), 2, tx, cancel.clone());
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));

        // Producers keep writing after the monitor is gone.
        assert!(collector.put(0, ()));
        assert!(collector.put(1, ()));
        assert!(collector.is_full());
    }
}
