//! Rate Limiter (Token Bucket Algorithm)
//!
//! Guards the mutating RPC methods so a runaway client cannot flood the
//! queue store with writes. Lock-free: bucket state lives in one atomic word.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Default burst size for mutating methods
pub const DEFAULT_BURST: u32 = 200;

/// Default sustained rate (tokens per second)
pub const DEFAULT_RATE: u32 = 100;

/// Token bucket with atomic state
pub struct RateLimiter {
    // Upper 32 bits: tokens, lower 32 bits: last refill (ms since creation)
    packed: AtomicU64,
    created: Instant,
    max_tokens: u32,
    refill_rate: u32,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_RATE)
    }
}

impl RateLimiter {
    /// `max_tokens` is the burst size, `refill_rate` the tokens added per second
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            packed: AtomicU64::new((max_tokens as u64) << 32),
            created: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Consume one token; false if the caller is rate limited
    pub fn try_acquire(&self) -> bool {
        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let tokens = (packed >> 32) as u32;
            let last_refill_ms = (packed & 0xFFFF_FFFF) as u32;

            let elapsed_ms = self.created.elapsed().as_millis() as u32;
            let refill = (elapsed_ms.saturating_sub(last_refill_ms) as u64
                * self.refill_rate as u64)
                / 1000;
            let available = (tokens as u64 + refill).min(self.max_tokens as u64) as u32;

            // Only advance the refill clock when at least one token was earned
            let stamp = if refill > 0 { elapsed_ms } else { last_refill_ms };

            if available == 0 {
                let _ = self.packed.compare_exchange(
                    packed,
                    (stamp as u64) & 0xFFFF_FFFF,
                    Ordering::Release,
                    Ordering::Acquire,
                );
                return false;
            }

            let next = (((available - 1) as u64) << 32) | stamp as u64;
            if self
                .packed
                .compare_exchange(packed, next, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Tokens currently in the bucket (without refill)
    pub fn remaining(&self) -> u32 {
        (self.packed.load(Ordering::Acquire) >> 32) as u32
    }
}
