//! Fixed-window rate limiter.
//!
//! Count resets at the start of every fixed-length window; acquirers that
//! overflow the window sleep until the next one starts and retry. No
//! fairness guarantee is made between concurrent waiters.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

struct Window {
    start: Option<Instant>,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    period: Duration,
    state: Mutex<Window>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> anyhow::Result<Self> {
        if limit == 0 || period.is_zero() {
            anyhow::bail!("rate limiter limit and period must both be non-zero");
        }
        Ok(Self {
            limit,
            period,
            state: Mutex::new(Window {
                start: None,
                count: 0,
            }),
            enabled: true,
        })
    }

    /// A disabled limiter is a no-op acquire.
    pub fn disabled() -> Self {
        Self {
            limit: 1,
            period: Duration::from_secs(1),
            state: Mutex::new(Window {
                start: None,
                count: 0,
            }),
            enabled: false,
        }
    }

    pub async fn acquire(&self, n: u32) {
        if !self.enabled {
            return;
        }
        assert!(
            n <= self.limit,
            "rate limiter acquire(n={n}) exceeds limit={}",
            self.limit
        );
        loop {
            let wait = {
                let mut guard = self.state.lock().await;
                let now = Instant::now();
                let window_expired = match guard.start {
                    None => true,
                    Some(start) => now >= start + self.period,
                };
                if window_expired {
                    guard.start = Some(now);
                    guard.count = 0;
                }
                if guard.count + n <= self.limit {
                    guard.count += n;
                    None
                } else {
                    let start = guard.start.expect("window start set above");
                    Some((start + self.period).saturating_duration_since(now))
                }
            };
            match wait {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn grants_up_to_limit_then_waits_for_next_window() {
        let limiter = Arc::new(RateLimiter::new(2, StdDuration::from_secs(1)).unwrap());

        limiter.acquire(1).await;
        limiter.acquire(1).await;

        let limiter2 = limiter.clone();
        let waiter = tokio::spawn(async move {
            limiter2.acquire(1).await;
        });

        tokio::time::advance(StdDuration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        tokio::time::advance(StdDuration::from_secs(1)).await;
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn disabled_limiter_never_blocks() {
        let limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            limiter.acquire(1).await;
        }
    }

    #[test]
    #[should_panic(expected = "exceeds limit")]
    fn acquire_more_than_limit_panics() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let limiter = RateLimiter::new(2, StdDuration::from_secs(1)).unwrap();
        rt.block_on(limiter.acquire(3));
    }

    #[test]
    fn zero_limit_is_a_startup_error() {
        assert!(RateLimiter::new(0, StdDuration::from_secs(1)).is_err());
        assert!(RateLimiter::new(5, StdDuration::ZERO).is_err());
    }
}
