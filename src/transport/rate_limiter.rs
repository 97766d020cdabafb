use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spaces out requests so that no more than `requests_per_second` are started
/// in any one-second span, shared by all in-flight page fetches.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

// A single-slot bucket: idle time never adds up to a burst
struct Bucket {
    request_interval: Duration, // 1 / RPS
    ready: bool,
    last_update: Instant,
}

impl Bucket {
    fn update(&mut self, now: Instant) {
        let intervals = now.saturating_duration_since(self.last_update).as_nanos()
            / self.request_interval.as_nanos();
        if intervals > 0 {
            // Advance in whole intervals so requests stay on a regular grid
            self.last_update += self.request_interval * intervals.min(u32::MAX as u128) as u32;
            self.ready = true;
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.ready)
    }

    fn until_next_token(&self, now: Instant) -> Duration {
        (self.last_update + self.request_interval).saturating_duration_since(now)
    }
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let request_interval = Duration::from_secs(1) / requests_per_second.max(1);
        Self {
            bucket: Mutex::new(Bucket {
                request_interval,
                ready: true,
                last_update: Instant::now(),
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                let now = Instant::now();
                bucket.update(now);
                if bucket.take() {
                    return;
                }
                bucket.until_next_token(now)
            };
            tracing::trace!("Throttling request for {wait:?}");
            tokio::time::sleep(wait).await;
        }
    }
}
