use keyward_core::{KeyConfig, TokenConfig};
use serde::{Deserialize, Serialize};
use std::{env, fs, io, path::PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "KEYWARD_CONFIG";

/// Environment variable overriding the bootstrap admin password.
pub const ADMIN_PASSWORD_ENV: &str = "KEYWARD_ADMIN_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> String {
    "data/keyward.sqlite".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: default_database_path(),
        }
    }
}

/// Records seeded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_well_known")]
    pub roles: Vec<String>,

    #[serde(default = "default_well_known")]
    pub groups: Vec<String>,

    #[serde(default = "default_admin_name")]
    pub admin_name: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    /// No admin is created while this is empty. Prefer setting
    /// `KEYWARD_ADMIN_PASSWORD`.
    #[serde(default)]
    pub admin_password: String,
}

fn default_well_known() -> Vec<String> {
    vec!["admin".to_string(), "user".to_string()]
}

fn default_admin_name() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@localhost".to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            roles: default_well_known(),
            groups: default_well_known(),
            admin_name: default_admin_name(),
            admin_email: default_admin_email(),
            admin_password: String::new(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(password) = env::var(ADMIN_PASSWORD_ENV) {
            if !password.trim().is_empty() {
                self.bootstrap.admin_password = password;
            }
        }
        self
    }
}

/// Load the config from `KEYWARD_CONFIG` (default `keyward.toml`).
///
/// A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = config_path();
    let cfg = match fs::read_to_string(&path) {
        Ok(raw) => AppConfig::from_toml(&raw)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    Ok(cfg.with_env_overrides())
}

fn config_path() -> PathBuf {
    if let Ok(p) = env::var(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from("keyward.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.tokens.lifetime, "72h");
        assert_eq!(cfg.keys.bits, 2048);
        assert_eq!(cfg.bootstrap.roles, vec!["admin", "user"]);
        assert!(cfg.bootstrap.admin_password.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            database_path = "/var/lib/keyward.db"

            [tokens]
            lifetime = "1h"

            [bootstrap]
            roles = ["admin", "user", "auditor"]
            admin_password = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.server.database_path, "/var/lib/keyward.db");
        assert_eq!(cfg.tokens.lifetime().unwrap(), chrono::Duration::hours(1));
        assert_eq!(cfg.bootstrap.roles.len(), 3);
        assert_eq!(cfg.bootstrap.groups, vec!["admin", "user"]);
        assert_eq!(cfg.bootstrap.admin_password, "s3cret");
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(AppConfig::from_toml("[keys]\nbits = \"lots\"").is_err());
    }
}
