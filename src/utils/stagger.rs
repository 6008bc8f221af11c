//! Rank-proportional dispatch delays.
//!
//! Concurrently scheduled requests are spread out by waiting
//! `offset × delay` measured from the start of the batch. This is not a rate
//! limiter: each task computes its own deadline and no state is shared.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct Stagger {
    start: Instant,
    delay: Duration,
}

impl Stagger {
    /// Start a stagger schedule now
    pub fn new(delay: Duration) -> Self {
        Self {
            start: Instant::now(),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Earliest dispatch time for the item at `offset`
    pub fn deadline(&self, offset: usize) -> Instant {
        let offset = u32::try_from(offset).unwrap_or(u32::MAX);
        self.start + self.delay.saturating_mul(offset)
    }

    /// Wait until the item at `offset` may be dispatched.
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn wait(&self, offset: usize, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep_until(self.deadline(offset)) => !cancel.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_proportional_to_offset() {
        let stagger = Stagger::new(Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        assert!(stagger.wait(0, &cancel).await);
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert!(stagger.wait(5, &cancel).await);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_from_batch_start() {
        let stagger = Stagger::new(Duration::from_millis(50));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        // A late starter does not add its own delay on top.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(stagger.wait(3, &cancel).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(170));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_dispatch_order() {
        let stagger = Stagger::new(Duration::from_millis(10));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let waits = (0..20usize).rev().map(|rank| {
            let cancel = cancel.clone();
            async move {
                stagger.wait(rank, &cancel).await;
                (rank, start.elapsed())
            }
        });
        let dispatched = futures_util::future::join_all(waits).await;

        for (rank, elapsed) in dispatched {
            assert!(elapsed >= stagger.delay() * rank as u32);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let stagger = Stagger::new(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        assert!(!stagger.wait(3, &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
