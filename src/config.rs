//! Connection manager configuration.

use std::time::Duration;

use snafu::prelude::*;
use url::Url;

/// Error when build a [Config]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConfigError {
    /// the str is not a valid url
    #[snafu(display("{s} is an invalid url: {source}"))]
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidSchema {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },

    /// backoff multiplier is not a finite number no less than 1
    #[snafu(display("reconnect backoff multiplier {multiplier} must be finite and >= 1"))]
    InvalidMultiplier {
        /// configured multiplier
        multiplier: f64,
    },

    /// max backoff is shorter than the base reconnect interval
    #[snafu(display("max reconnect backoff {max:?} is shorter than reconnect interval {base:?}"))]
    BackoffBelowInterval {
        /// configured base interval
        base: Duration,
        /// configured max backoff
        max: Duration,
    },

    /// heartbeat interval is zero
    #[snafu(display("heartbeat interval must not be zero"))]
    ZeroHeartbeat,
}

/// Connection manager configuration.
///
/// Use [Config::builder] to construct a validated value, all fields except `url` have defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// backend websocket url, `ws` or `wss`
    pub url: Url,
    /// base delay before the first reconnect attempt
    pub reconnect_interval: Duration,
    /// reconnect attempts allowed after an unexpected close before giving up
    pub max_reconnect_attempts: u32,
    /// period of outbound heartbeat messages while connected
    pub heartbeat_interval: Duration,
    /// growth factor of reconnect delay per attempt
    pub reconnect_backoff_multiplier: f64,
    /// upper bound of reconnect delay
    pub max_reconnect_backoff: Duration,
    /// give up an open attempt that did not finish in this time, `None` waits forever
    pub open_timeout: Option<Duration>,
    /// randomize reconnect delay in `[0, delay]`
    pub reconnect_jitter: bool,
}

impl Config {
    /// Default base reconnect interval
    pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);
    /// Default reconnect attempt limit
    pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
    /// Default heartbeat interval
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30000);
    /// Default backoff multiplier
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
    /// Default max reconnect backoff
    pub const DEFAULT_MAX_RECONNECT_BACKOFF: Duration = Duration::from_millis(30000);

    /// Create a builder for the backend at `url`
    pub fn builder<S: AsRef<str> + ?Sized>(url: &S) -> ConfigBuilder {
        ConfigBuilder {
            url: url.as_ref().to_string(),
            reconnect_interval: Self::DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: Self::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_backoff_multiplier: Self::DEFAULT_BACKOFF_MULTIPLIER,
            max_reconnect_backoff: Self::DEFAULT_MAX_RECONNECT_BACKOFF,
            open_timeout: None,
            reconnect_jitter: false,
        }
    }
}

/// Builder for [Config]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    url: String,
    reconnect_interval: Duration,
    max_reconnect_attempts: u32,
    heartbeat_interval: Duration,
    reconnect_backoff_multiplier: f64,
    max_reconnect_backoff: Duration,
    open_timeout: Option<Duration>,
    reconnect_jitter: bool,
}

impl ConfigBuilder {
    /// Set base reconnect interval
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set reconnect attempt limit
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set backoff multiplier
    pub fn reconnect_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.reconnect_backoff_multiplier = multiplier;
        self
    }

    /// Set max reconnect backoff
    pub fn max_reconnect_backoff(mut self, max: Duration) -> Self {
        self.max_reconnect_backoff = max;
        self
    }

    /// Set open timeout
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    /// Enable or disable reconnect jitter
    pub fn reconnect_jitter(mut self, enabled: bool) -> Self {
        self.reconnect_jitter = enabled;
        self
    }

    /// Validate and build the config
    pub fn build(self) -> Result<Config, ConfigError> {
        let url = Url::parse(&self.url).context(error::InvalidURL { s: &self.url })?;

        ensure!(
            matches!(url.scheme(), "ws" | "wss"),
            error::InvalidSchema {
                s: &self.url,
                schema: url.scheme(),
            }
        );
        ensure!(url.has_host(), error::NoHost { s: &self.url });

        let multiplier = self.reconnect_backoff_multiplier;
        ensure!(
            multiplier.is_finite() && multiplier >= 1.0,
            error::InvalidMultiplier { multiplier }
        );

        ensure!(
            self.max_reconnect_backoff >= self.reconnect_interval,
            error::BackoffBelowInterval {
                base: self.reconnect_interval,
                max: self.max_reconnect_backoff,
            }
        );

        ensure!(!self.heartbeat_interval.is_zero(), error::ZeroHeartbeat);

        Ok(Config {
            url,
            reconnect_interval: self.reconnect_interval,
            max_reconnect_attempts: self.max_reconnect_attempts,
            heartbeat_interval: self.heartbeat_interval,
            reconnect_backoff_multiplier: multiplier,
            max_reconnect_backoff: self.max_reconnect_backoff,
            open_timeout: self.open_timeout,
            reconnect_jitter: self.reconnect_jitter,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::builder("ws://localhost:8080/ws").build().unwrap();

        assert_eq!(config.url.as_str(), "ws://localhost:8080/ws");
        assert_eq!(config.reconnect_interval, Duration::from_millis(1000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(30000));
        assert_eq!(config.reconnect_backoff_multiplier, 1.5);
        assert_eq!(config.max_reconnect_backoff, Duration::from_millis(30000));
        assert_eq!(config.open_timeout, None);
        assert!(!config.reconnect_jitter);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::builder("wss://example.com/tasks")
            .max_reconnect_attempts(2)
            .open_timeout(Duration::from_secs(3))
            .reconnect_jitter(true)
            .build()
            .unwrap();

        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.open_timeout, Some(Duration::from_secs(3)));
        assert!(config.reconnect_jitter);
    }

    #[test]
    fn test_config_rejects_http_schema() {
        let err = Config::builder("http://example.com").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema { ref schema, .. } if schema == "http"));
    }

    #[test]
    fn test_config_rejects_garbage_url() {
        let err = Config::builder("not a url").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidURL { .. }));
    }

    #[test]
    fn test_config_rejects_shrinking_backoff() {
        let err = Config::builder("ws://localhost")
            .reconnect_backoff_multiplier(0.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMultiplier { .. }));

        let err = Config::builder("ws://localhost")
            .reconnect_interval(Duration::from_secs(10))
            .max_reconnect_backoff(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::BackoffBelowInterval { .. }));
    }

    #[test]
    fn test_config_rejects_zero_heartbeat() {
        let err = Config::builder("ws://localhost")
            .heartbeat_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroHeartbeat));
    }
}
