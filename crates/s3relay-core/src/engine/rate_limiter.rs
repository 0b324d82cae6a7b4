//! Byte-rate limiter for the download and upload channels
//!
//! Two pacing styles share one limiter:
//! - `acquire` is a token bucket holding at most one second of allowance.
//!   Spending more than the balance sleeps for the deficit.
//! - `with_scope` counts the bytes moved inside a body and, once the body
//!   has finished, sleeps `bytes / rate`. It paces between scopes only and
//!   does not smooth bursts inside the body.

use crate::error::RelayError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Rate limiter for one logical channel.
///
/// Cloning shares the underlying bucket.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    bytes_per_second: u64,
    state: Arc<Mutex<RateLimiterState>>,
}

#[derive(Debug)]
struct RateLimiterState {
    /// Current available tokens, never above `bytes_per_second`
    tokens: f64,
    /// Last token refill time; may sit in the future while a deficit is paid off
    last_refill: Instant,
}

/// Byte counter handed to the body of a scope
#[derive(Clone, Debug, Default)]
pub struct ScopeMeter {
    bytes: Arc<AtomicU64>,
}

impl ScopeMeter {
    /// Charge `bytes` to the enclosing scope
    pub fn record(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Bytes charged so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }
}

impl RateLimiter {
    /// Create a limiter with the given ceiling.
    ///
    /// A zero ceiling would mean an infinite wait and is rejected.
    pub fn new(bytes_per_second: u64) -> Result<Self, RelayError> {
        if bytes_per_second == 0 {
            return Err(RelayError::Configuration(
                "rate limit must be greater than zero".into(),
            ));
        }

        Ok(Self {
            bytes_per_second,
            state: Arc::new(Mutex::new(RateLimiterState {
                tokens: bytes_per_second as f64, // Start with full bucket
                last_refill: Instant::now(),
            })),
        })
    }

    /// Wait until `bytes` can be spent without exceeding the ceiling
    pub async fn acquire(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }

        let wait = {
            let mut state = self.state.lock().await;
            self.refill_tokens(&mut state);

            let needed = bytes as f64;
            if state.tokens >= needed {
                state.tokens -= needed;
                Duration::ZERO
            } else {
                let deficit = needed - state.tokens;
                let wait = Duration::from_secs_f64(deficit / self.bytes_per_second as f64);
                // The sleep pays off the deficit; nothing refills until it ends
                state.tokens = 0.0;
                state.last_refill = Instant::now() + wait;
                wait
            }
        };

        // Sleep outside the lock
        if !wait.is_zero() {
            debug!("Rate limiter waiting {:?} for {} bytes", wait, bytes);
            tokio::time::sleep(wait).await;
        }
    }

    /// Delay owed for moving `bytes` through this channel
    pub fn scope_delay(&self, bytes: u64) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.bytes_per_second as f64)
    }

    /// Run `body`, then sleep for the bytes it recorded on its meter.
    ///
    /// The delay applies whatever `body` returns, errors included, so a
    /// failed transfer is still paced for the bytes it moved.
    pub async fn with_scope<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce(ScopeMeter) -> Fut,
        Fut: Future<Output = T>,
    {
        let meter = ScopeMeter::default();
        let output = body(meter.clone()).await;

        let bytes = meter.bytes();
        let delay = self.scope_delay(bytes);
        if !delay.is_zero() {
            debug!("Scope moved {} bytes, pacing for {:?}", bytes, delay);
            tokio::time::sleep(delay).await;
        }

        output
    }

    /// Refill tokens based on elapsed time
    fn refill_tokens(&self, state: &mut RateLimiterState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }

        let new_tokens = elapsed.as_secs_f64() * self.bytes_per_second as f64;
        state.tokens = (state.tokens + new_tokens).min(self.bytes_per_second as f64);
        state.last_refill = now;
    }
}
