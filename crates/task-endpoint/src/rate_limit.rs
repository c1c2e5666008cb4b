//! Token-bucket admission control shared by every endpoint

use std::sync::Mutex;
use std::time::Instant;

/// Default steady-state refill rate in tokens per second
pub const DEFAULT_STEADY_STATE_RATE: f64 = 40.0;

/// Default bucket capacity
pub const DEFAULT_BURST: u32 = 60;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket. Starts full.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(steady_state_rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate: steady_state_rate.max(0.0),
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn steady_state_rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.capacity as u32
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        state.last_refill = now.max(state.last_refill);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_STEADY_STATE_RATE, DEFAULT_BURST)
    }
}
