//! Relay configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Time a signaled consumer may go without consuming before it is evicted
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(5);

/// Time without any `get_frame` call after which the producer shuts down
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames kept per consumer; 1 means the freshest frame always wins
pub const DEFAULT_BUFFER_DEPTH: usize = 1;

/// Relay configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Minimum spacing between consecutive broadcasts
    pub delay: Duration,

    /// Signaled-but-unconsumed age after which a consumer is evicted
    pub stale_threshold: Duration,

    /// Inactivity window after which the producer stops
    pub idle_timeout: Duration,

    /// Per-consumer buffer depth (at least 1)
    pub buffer_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            buffer_depth: DEFAULT_BUFFER_DEPTH,
        }
    }
}

impl RelayConfig {
    /// Set the broadcast throttle interval
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the stale-consumer eviction threshold
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Set the producer idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set per-consumer buffer depth
    pub fn buffer_depth(mut self, depth: usize) -> Self {
        self.buffer_depth = depth.max(1);
        self
    }
}

/// Coerce a textual millisecond count into a throttle delay
///
/// Accepts surrounding whitespace and an optional leading `+`. Negative
/// values and non-integers are rejected.
pub fn parse_delay_ms(raw: &str) -> Result<Duration> {
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::InvalidDelay(raw.to_string()))?;

    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| Error::InvalidDelay(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.stale_threshold, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert_eq!(config.buffer_depth, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .delay(Duration::from_millis(40))
            .stale_threshold(Duration::from_secs(2))
            .idle_timeout(Duration::from_secs(30))
            .buffer_depth(4);

        assert_eq!(config.delay, Duration::from_millis(40));
        assert_eq!(config.stale_threshold, Duration::from_secs(2));
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.buffer_depth, 4);
    }

    #[test]
    fn test_buffer_depth_floor() {
        let config = RelayConfig::default().buffer_depth(0);
        assert_eq!(config.buffer_depth, 1);
    }

    #[test]
    fn test_parse_delay_ms() {
        assert_eq!(parse_delay_ms("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_delay_ms(" 250 ").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_delay_ms("+15").unwrap(), Duration::from_millis(15));
    }

    #[test]
    fn test_parse_delay_rejects_garbage() {
        assert!(matches!(parse_delay_ms("-1"), Err(Error::InvalidDelay(_))));
        assert!(matches!(parse_delay_ms("1.5"), Err(Error::InvalidDelay(_))));
        assert!(matches!(parse_delay_ms("fast"), Err(Error::InvalidDelay(_))));
        assert!(matches!(parse_delay_ms(""), Err(Error::InvalidDelay(_))));
    }
}
