// SPDX-FileCopyrightText: 2026 Proplink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry with exponential backoff for outbound sends.
//!
//! Only timeout-class transport errors are retried; connection-state and
//! validation failures surface immediately. Device-sync stalls double the
//! computed backoff because the remote device needs time to catch up, not a
//! faster hammer.

use std::time::Duration;

use rand::Rng;

use proplink_config::model::TransportConfig;

/// Retry policy for outbound delivery.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum delivery attempts, the first included.
    pub max_attempts: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_attempts: config.max_send_attempts,
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Compute the delay before the retry following attempt `attempt` (0-based).
///
/// Follows exponential backoff: `min(base_delay * 2^attempt + jitter,
/// max_delay)`, with jitter drawn uniformly from 0-25% of the computed base.
/// A device-sync stall doubles the base before jitter.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32, stall: bool) -> Duration {
    let mut base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    if stall {
        base = base.saturating_mul(2);
    }
    let base = base.min(policy.max_delay);

    let jitter_fraction = rand::thread_rng().gen_range(0.0..0.25);
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}
