/**
 * Command Rate Limiter
 *
 * The control loop recomputes every 10 ms but the link runs at 9600 baud, so
 * only one command per interval is handed to the writer.
 */

use std::time::{Duration, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// True once strictly more than `min_interval` has passed since `last_sent`.
pub fn should_send(now: Instant, last_sent: Instant, min_interval: Duration) -> bool {
    now.saturating_duration_since(last_sent) > min_interval
}

#[derive(Debug, Clone)]
pub struct CommandRateLimiter {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl CommandRateLimiter {
    /// Nothing has been sent yet, so the first acquire always succeeds.
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_sent: None }
    }

    /// Whether a hand-off at `now` would be allowed. Does not move the clock.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_sent
            .map_or(true, |last| should_send(now, last, self.min_interval))
    }

    /// Records an actual hand-off.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// `is_due` and `mark_sent` in one step, for callers whose hand-off
    /// cannot fail.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let due = self.is_due(now);
        if due {
            self.mark_sent(now);
        }
        due
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_exclusive() {
        let t0 = Instant::now();
        assert!(!should_send(t0 + DEFAULT_MIN_INTERVAL, t0, DEFAULT_MIN_INTERVAL));
        assert!(should_send(t0 + DEFAULT_MIN_INTERVAL + Duration::from_nanos(1), t0, DEFAULT_MIN_INTERVAL));
        assert!(!should_send(t0, t0 + Duration::from_secs(1), DEFAULT_MIN_INTERVAL));
    }

    #[test]
    fn test_two_seconds_of_ticks_sends_four_times() {
        let t0 = Instant::now();
        let mut limiter = CommandRateLimiter::default();
        let sent: Vec<u64> = (1..=200u64)
            .filter(|k| limiter.try_acquire(t0 + Duration::from_millis(10 * k)))
            .collect();
        assert_eq!(sent, vec![1, 52, 103, 154]);
        assert_eq!(limiter.last_sent(), Some(t0 + Duration::from_millis(1540)));
    }

    #[test]
    fn test_failed_acquire_does_not_move_clock() {
        let t0 = Instant::now();
        let mut limiter = CommandRateLimiter::new(Duration::from_millis(100));
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_millis(50)));
        assert_eq!(limiter.last_sent(), Some(t0));
        assert!(limiter.try_acquire(t0 + Duration::from_millis(101)));
    }

    #[test]
    fn test_is_due_leaves_clock_alone() {
        let t0 = Instant::now();
        let mut limiter = CommandRateLimiter::default();
        assert!(limiter.is_due(t0));
        assert!(limiter.is_due(t0));
        assert_eq!(limiter.last_sent(), None);

        limiter.mark_sent(t0 + Duration::from_millis(10));
        assert!(!limiter.is_due(t0 + Duration::from_millis(510)));
        assert!(limiter.is_due(t0 + Duration::from_millis(511)));
    }
}
