//! Token issuance configuration.

use super::{ConfigError, parse_duration};
use serde::{Deserialize, Serialize};

/// Configuration for issued bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Lifetime of newly issued tokens (e.g., "72h").
    #[serde(default = "default_lifetime")]
    pub lifetime: String,
}

fn default_lifetime() -> String {
    "72h".to_string()
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime: default_lifetime(),
        }
    }
}

impl TokenConfig {
    /// The configured lifetime as a duration.
    pub fn lifetime(&self) -> Result<chrono::Duration, ConfigError> {
        parse_duration("tokens.lifetime", &self.lifetime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lifetime_is_72_hours() {
        let cfg = TokenConfig::default();
        assert_eq!(cfg.lifetime().unwrap(), chrono::Duration::hours(72));
    }

    #[test]
    fn test_rejects_garbage_lifetime() {
        let cfg = TokenConfig {
            lifetime: "forever".into(),
        };
        assert!(matches!(
            cfg.lifetime(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_deserializes_from_toml_with_defaults() {
        let cfg: TokenConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.lifetime, "72h");

        let cfg: TokenConfig = toml::from_str(r#"lifetime = "15m""#).unwrap();
        assert_eq!(cfg.lifetime().unwrap(), chrono::Duration::minutes(15));
    }
}
