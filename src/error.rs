//! crate error types

use snafu::prelude::*;

use super::config::ConfigError;
use super::manager::ConnectError;

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Configuration is invalid
    #[snafu(display("invalid config: {source}"))]
    InvalidConfig {
        /// source error
        source: ConfigError,
    },

    /// Connect to backend failed
    #[snafu(display("connect failed: {source}"))]
    ConnectFailed {
        /// source error
        source: ConnectError,
    },
}
