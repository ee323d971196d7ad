//! Sliding-window request limiter.
//!
//! Keeps the send instants of the most recent `max_requests` requests. A new
//! request may go out only once the oldest of those is at least `window` old,
//! so no rolling window ever contains more than `max_requests` sends. The
//! caller's thread sleeps until then.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// A limiter allowing `max_requests` sends per rolling `window`.
    /// A limit of zero is treated as one.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_requests = max_requests.max(1) as usize;
        Self {
            max_requests,
            window,
            sent: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Two requests per five seconds.
    pub fn default_provider() -> Self {
        Self::new(2, Duration::from_secs(5))
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Block until one more request fits in the window, then claim the slot.
    ///
    /// Returns how long the caller was held back.
    pub fn acquire(&self) -> Duration {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        let mut waited = Duration::ZERO;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = sent.front() {
                if now.duration_since(oldest) >= self.window {
                    sent.pop_front();
                } else {
                    break;
                }
            }

            if sent.len() < self.max_requests {
                sent.push_back(now);
                if !waited.is_zero() {
                    tracing::debug!(waited_ms = waited.as_millis() as u64, "rate limiter released request");
                }
                return waited;
            }

            let Some(&oldest) = sent.front() else {
                continue;
            };
            let pause = self.window.saturating_sub(now.duration_since(oldest));
            std::thread::sleep(pause);
            waited += pause;
        }
    }
}
