//! Error types for configuration and token handling.

use thiserror::Error;

/// Errors raised while loading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{0} must be formatted as key=value e.g. terminate=2s")]
    SpotActionFormat(String),

    #[error("{0} is not a supported spot action expecting (terminate, stop or hibernate)")]
    UnsupportedSpotAction(String),

    #[error("{0} is not a supported duration format e.g. 10m30s, see: https://docs.rs/humantime/latest/humantime/fn.parse_duration.html")]
    UnsupportedDuration(String),
}

/// Errors raised by the session token service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("ttl of {0} seconds is outside the supported range")]
    InvalidTtl(i64),

    #[error("failed to encode session token: {0}")]
    Encode(String),
}
