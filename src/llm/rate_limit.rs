use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter gating outbound provider calls
///
/// Tokens refill continuously at `requests_per_minute / 60` per second, up
/// to a cap of one minute's worth. `acquire` waits (it never spins) until a
/// token is available, so callers queue up behind the bucket under load.
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            rate: capacity / 60.0,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until the bucket refills if it is empty.
    /// Holding the lock across the sleep keeps waiters in FIFO order.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }

            let wait = (1.0 - state.tokens) / self.rate;
            sleep(Duration::from_secs_f64(wait)).await;
        }
    }
}
