//! Reconnect delay calculation.

use std::time::Duration;

use crate::Config;

/// Delay before reconnect attempt `attempt`, counted from 1.
///
/// `min(reconnect_interval * multiplier ^ (attempt - 1), max_reconnect_backoff)`,
/// attempt 0 is treated as 1.
pub fn reconnect_delay(config: &Config, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;

    let base = config.reconnect_interval.as_secs_f64()
        * config.reconnect_backoff_multiplier.powi(exponent);
    let capped = base.min(config.max_reconnect_backoff.as_secs_f64());

    let delay = if config.reconnect_jitter {
        rand::random::<f64>() * capped
    } else {
        capped
    };

    Duration::from_secs_f64(delay)
}
