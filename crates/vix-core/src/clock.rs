//! Time source for the polling loops
//!
//! Settle delays, the manifest poll loop and the pause between episodes all
//! go through [`Clock`] so tests can run them against a fake clock instead
//! of waiting in real time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Monotonic clock with an async sleep
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Shared handle to a clock
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_clock_sleep_advances_now() {
        let clock = SystemClock;
        let start = clock.now();
        clock.sleep(Duration::from_millis(20)).await;
        assert!(clock.now() - start >= Duration::from_millis(20));
    }
}
