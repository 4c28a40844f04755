use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, sleep};

/// Interval gate pacing one task's outbound sends.
///
/// Concurrent callers each claim the next free slot under the lock, then
/// sleep outside it until their slot arrives: the first caller proceeds,
/// later callers wait their turn, and nothing queues unboundedly.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait until this caller's send slot. Safe to call concurrently.
    pub async fn acquire(&self) {
        let wait = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            if *slot <= now {
                *slot = now + self.interval;
                Duration::ZERO
            } else {
                let wait = *slot - now;
                *slot += self.interval;
                wait
            }
        };

        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}
