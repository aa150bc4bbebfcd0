//! Spacing between consecutive print jobs.

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Enforces a minimum gap between the end of one submission and the start
/// of the next. A zero gap disables pacing.
#[derive(Debug)]
pub struct Pacer {
    min_gap: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last: None }
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Time still to wait before the next submission may start.
    pub fn remaining(&self) -> Duration {
        match self.last {
            Some(last) if !self.min_gap.is_zero() => self.min_gap.saturating_sub(last.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Block until the gap since the last submission has elapsed.
    pub fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            trace!(?remaining, "pacing");
            thread::sleep(remaining);
        }
    }

    /// Record that a submission just finished.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_submission_not_delayed() {
        let pacer = Pacer::new(Duration::from_secs(10));
        assert_eq!(pacer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_gap_after_mark() {
        let mut pacer = Pacer::new(Duration::from_secs(10));
        pacer.mark();
        assert!(pacer.remaining() > Duration::from_secs(9));
    }

    #[test]
    fn test_zero_gap_disabled() {
        let mut pacer = Pacer::new(Duration::ZERO);
        pacer.mark();
        assert_eq!(pacer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_wait_enforces_gap() {
        let mut pacer = Pacer::new(Duration::from_millis(30));
        pacer.mark();
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
