use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Fixed window limiter guarding outgoing provider requests.
#[derive(Debug)]
pub struct RateLimit {
    // The number of requests that can be made in the time period.
    capacity: u64,
    // Milliseconds of fixed window period.
    period: u64,

    epoch: Instant,
    // Used requests in current window.
    used: AtomicU64,
    // End of the current window in milliseconds since `epoch`.
    reset: AtomicU64,
}

impl RateLimit {
    pub fn new(num: u64, per: Duration) -> Self {
        let period = u64::try_from(per.as_millis()).unwrap_or(u64::MAX);

        Self {
            capacity: num,
            period,
            epoch: Instant::now(),
            used: AtomicU64::new(0),
            reset: AtomicU64::new(period),
        }
    }

    pub fn capacity(&self) -> u64 { self.capacity }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn try_ready(&self) -> bool {
        let now = self.now();
        if now >= self.reset.load(Ordering::Acquire) {
            // The period has elapsed, open a new window starting now.
            self.used.store(0, Ordering::Release);
            self.reset.store(now.saturating_add(self.period), Ordering::Release);
        }

        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.capacity).then_some(used + 1)
            })
            .is_ok()
    }

    pub async fn ready(&self) {
        while !self.try_ready() {
            // Unable to get a token, sleep until the next reset.
            let wait = self.reset.load(Ordering::Acquire).saturating_sub(self.now());
            sleep(Duration::from_millis(wait.max(1))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_capacity_per_window() {
        let limit = RateLimit::new(2, Duration::from_secs(60));

        assert!(limit.try_ready());
        assert!(limit.try_ready());
        assert!(!limit.try_ready());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!limit.try_ready());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limit.try_ready());
        assert!(limit.try_ready());
        assert!(!limit.try_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_waits_for_next_window() {
        let limit = RateLimit::new(1, Duration::from_secs(60));
        let start = Instant::now();

        limit.ready().await;
        assert!(start.elapsed() < Duration::from_secs(1));

        limit.ready().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[test]
    fn zero_capacity_never_admits() {
        let limit = RateLimit::new(0, Duration::from_secs(1));
        assert!(!limit.try_ready());
    }
}
