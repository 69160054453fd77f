//! Minimum-interval gate between accepted frames

use std::thread;
use std::time::{Duration, Instant};

/// Sleep granularity while waiting for the interval to pass
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    interval: Duration,
    poll: Duration,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            poll: POLL_INTERVAL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Block until `interval` has passed since `last_accepted`, then move
    /// `last_accepted` to now. Returns how long it slept.
    pub fn throttle(&self, last_accepted: &mut Instant) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }

        let start = Instant::now();
        while last_accepted.elapsed() < self.interval {
            thread::sleep(self.poll);
        }
        *last_accepted = Instant::now();
        start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_never_sleeps() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let mut last = Instant::now();
        let before = last;

        assert_eq!(limiter.throttle(&mut last), Duration::ZERO);
        assert_eq!(last, before);
    }

    #[test]
    fn accepted_frames_are_spaced_by_interval() {
        let interval = Duration::from_millis(30);
        let limiter = RateLimiter::new(interval);
        let mut last = Instant::now();

        let mut stamps = Vec::new();
        for _ in 0..3 {
            limiter.throttle(&mut last);
            stamps.push(last);
        }

        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }

    #[test]
    fn elapsed_interval_passes_immediately() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        let mut last = Instant::now() - Duration::from_millis(50);

        let slept = limiter.throttle(&mut last);
        assert!(slept < POLL_INTERVAL);
    }
}
