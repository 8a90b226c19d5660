//! Limiter for outbound key-set fetches.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(60);

/// Allows at most `max_per_minute` acquisitions in any rolling 60 second window.
///
/// The quota holds `max_per_minute` cells and regains one cell per window, so
/// a full burst is followed by one slot per window until the tenant goes
/// quiet. No 60 second span ever sees more than the limit.
///
/// One limiter is owned by each tenant's key resolver, so accounting is shared
/// by every concurrent caller resolving keys for that issuer.
pub struct FetchRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl FetchRateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self::with_window(max_per_minute, WINDOW)
    }

    pub(crate) fn with_window(max_per_window: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_per_window).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Try to take one fetch slot. Returns `false` when the window is full.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = FetchRateLimiter::new(3);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_window_never_exceeds_limit_after_burst() {
        let window = Duration::from_millis(200);
        let limiter = FetchRateLimiter::with_window(3, window);

        for _ in 0..3 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());

        // One window later a single slot has come back, not a fresh burst
        std::thread::sleep(window + Duration::from_millis(20));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_denied_attempts_do_not_consume_slots() {
        let window = Duration::from_millis(100);
        let limiter = FetchRateLimiter::with_window(1, window);

        assert!(limiter.try_acquire());
        for _ in 0..10 {
            assert!(!limiter.try_acquire());
        }

        std::thread::sleep(window + Duration::from_millis(20));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_shared_across_threads() {
        let limiter = std::sync::Arc::new(FetchRateLimiter::new(10));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.try_acquire())
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();

        assert_eq!(granted, 10);
    }
}
