//! Key material configuration.

use super::{ConfigError, parse_duration};
use serde::{Deserialize, Serialize};

/// Smallest RSA modulus accepted for signing keys.
pub const MIN_KEY_BITS: usize = 2048;

/// Configuration for per-principal RSA key pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    /// RSA modulus size in bits.
    #[serde(default = "default_bits")]
    pub bits: usize,

    /// Expiration horizon recorded on new key pairs (e.g., "30d").
    #[serde(default = "default_horizon")]
    pub horizon: String,
}

fn default_bits() -> usize {
    MIN_KEY_BITS
}

fn default_horizon() -> String {
    "30d".to_string()
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            bits: default_bits(),
            horizon: default_horizon(),
        }
    }
}

impl KeyConfig {
    /// The configured modulus size, validated.
    pub fn bits(&self) -> Result<usize, ConfigError> {
        if self.bits < MIN_KEY_BITS {
            return Err(ConfigError::InvalidValue {
                field: "keys.bits",
                message: format!("must be at least {MIN_KEY_BITS}, got {}", self.bits),
            });
        }
        Ok(self.bits)
    }

    /// The configured key horizon as a duration.
    pub fn horizon(&self) -> Result<chrono::Duration, ConfigError> {
        parse_duration("keys.horizon", &self.horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = KeyConfig::default();
        assert_eq!(cfg.bits().unwrap(), 2048);
        assert_eq!(cfg.horizon().unwrap(), chrono::Duration::days(30));
    }

    #[test]
    fn test_rejects_small_modulus() {
        let cfg = KeyConfig {
            bits: 1024,
            ..KeyConfig::default()
        };
        assert!(matches!(cfg.bits(), Err(ConfigError::InvalidValue { .. })));
    }
}
