use crate::config::BootstrapConfig;
use crate::middleware::auth::ADMIN_ROLE;
use keyward_auth::{AccountService, Registration};
use keyward_store::{CredentialStore, DirectoryStore, SharedStore};

/// Seed well-known roles and groups, then create the admin principal if it
/// doesn't exist yet and a password is configured.
pub async fn bootstrap(
    store: &SharedStore,
    accounts: &AccountService,
    cfg: &BootstrapConfig,
) -> anyhow::Result<()> {
    for role in &cfg.roles {
        store.ensure_role(role).await?;
    }
    for group in &cfg.groups {
        store.ensure_group(group).await?;
    }
    tracing::debug!(roles = ?cfg.roles, groups = ?cfg.groups, "seeded roles and groups");

    if cfg.admin_password.trim().is_empty() {
        tracing::info!("no admin password configured; skipping admin bootstrap");
        return Ok(());
    }
    if store
        .find_principal_by_email(&cfg.admin_email)
        .await?
        .is_some()
    {
        return Ok(());
    }

    store.ensure_role(ADMIN_ROLE).await?;
    let groups = cfg
        .groups
        .iter()
        .filter(|g| *g == ADMIN_ROLE)
        .cloned()
        .collect();

    let admin = accounts
        .register(Registration {
            name: cfg.admin_name.clone(),
            email: cfg.admin_email.clone(),
            password: cfg.admin_password.clone(),
            roles: vec![ADMIN_ROLE.to_string()],
            groups,
        })
        .await?;

    tracing::warn!(
        principal_id = admin.id,
        email = %admin.email,
        "bootstrapped admin principal (password taken from env/config)"
    );
    Ok(())
}
