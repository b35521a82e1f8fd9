//! Policy configuration shared by the token crate, the account service and
//! the server.

use thiserror::Error;

pub mod keys;
pub mod tokens;

pub use keys::KeyConfig;
pub use tokens::TokenConfig;

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration string could not be parsed.
    #[error("invalid duration for {field}: {message}")]
    InvalidDuration { field: &'static str, message: String },

    /// A value is outside the accepted range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Parse a human-readable duration ("72h", "30d", "1h 30m") into a chrono duration.
pub(crate) fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<chrono::Duration, ConfigError> {
    let parsed = humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::InvalidDuration {
        field,
        message: e.to_string(),
    })?;
    if parsed.is_zero() {
        return Err(ConfigError::InvalidDuration {
            field,
            message: "duration must be positive".to_string(),
        });
    }
    chrono::Duration::from_std(parsed).map_err(|e| ConfigError::InvalidDuration {
        field,
        message: e.to_string(),
    })
}
