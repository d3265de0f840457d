//! Millisecond clocks for lease arithmetic.

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock. Lease expiries are compared across processes, so tabs in
/// different processes must use this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Epoch-anchored clock that advances with tokio's timer, so it follows
/// paused and auto-advanced time in tests. Share one instance between
/// all tabs of a process.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_instant: tokio::time::Instant,
    base_ms: u64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base_instant: tokio::time::Instant::now(),
            base_ms: SystemClock.now_ms(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.base_instant.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.base_ms.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now_ms();
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        assert_eq!(clock.now_ms() - start, 7_500);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
