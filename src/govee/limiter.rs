//! Sliding-window admission control for outgoing device commands
//!
//! The vendor allows 10 requests per 60 seconds per account. `admit()`
//! either returns immediately or suspends until a slot frees up. When the
//! window is full, the caller records the future slot time -- not its real
//! wake-up time -- so a burst of simultaneous waiters serializes into
//! spaced slots instead of all waking together and overshooting the budget.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Vendor budget: requests per window.
pub const DEFAULT_MAX_REQUESTS: usize = 10;
/// Vendor budget: window length in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 60;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    /// Admission timestamps, oldest first; the only mutation point.
    admissions: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        assert!(max_requests > 0, "rate limiter needs a positive budget");
        Self {
            max_requests,
            window,
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    /// Admit one request, suspending until a slot is available.
    ///
    /// Each admitted caller consumes exactly one slot; admission order among
    /// concurrent waiters is unspecified.
    pub async fn admit(&self) {
        let slot = {
            let mut admissions = self.admissions.lock().await;
            let now = Instant::now();

            while admissions
                .front()
                .is_some_and(|&t| t + self.window <= now)
            {
                admissions.pop_front();
            }

            if admissions.len() < self.max_requests {
                admissions.push_back(now);
                return;
            }

            // Full. The slot opens when the entry `max_requests` back from
            // the tail expires; recording it keeps later waiters behind us.
            let basis = admissions[admissions.len() - self.max_requests];
            let slot = basis + self.window;
            admissions.push_back(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
