use crate::bootstrap::bootstrap;
use crate::config::AppConfig;
use keyward_auth::{AccessGate, AccountService};
use keyward_store::{SharedStore, SqliteStore};
use keyward_token::{KeyGenerator, TokenIssuer};
use std::{fs, path::Path, sync::Arc};

/// Shared application state.
///
/// Every service holds the same injected store handle.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<AppConfig>,
    pub store: SharedStore,
    pub gate: AccessGate,
    pub accounts: AccountService,
}

impl AppState {
    /// Open the SQLite database named in `cfg` and seed it.
    pub async fn init(cfg: AppConfig) -> anyhow::Result<Self> {
        ensure_parent_dir(&cfg.server.database_path)?;
        let store = SqliteStore::open(&cfg.server.database_path).await?;
        tracing::info!(path = %cfg.server.database_path, "opened sqlite store");

        let state = Self::with_store(cfg, Arc::new(store))?;
        bootstrap(&state.store, &state.accounts, &state.cfg.bootstrap).await?;
        Ok(state)
    }

    /// Build services over an existing store without seeding it.
    pub fn with_store(cfg: AppConfig, store: SharedStore) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::from_config(&cfg.tokens)?;
        let keys = KeyGenerator::from_config(&cfg.keys)?;

        Ok(Self {
            gate: AccessGate::new(store.clone()),
            accounts: AccountService::new(store.clone(), issuer, keys),
            store,
            cfg: Arc::new(cfg),
        })
    }
}

fn ensure_parent_dir(file_path: &str) -> anyhow::Result<()> {
    let p = Path::new(file_path);
    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
