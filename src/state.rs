use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::PasswordHasher,
        repo::{PgUserStore, UserStore},
        services::CredentialService,
    },
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Builds every collaborator once; nothing downstream reaches for globals.
    pub fn init(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let users = Arc::new(PgUserStore::new(db, config.database.timeout)) as Arc<dyn UserStore>;
        let hasher = PasswordHasher::new(config.hashing).context("configure password hasher")?;
        let keys = JwtKeys::from_config(&config.jwt).context("configure jwt keys")?;
        Ok(Self::from_parts(users, hasher, keys))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        let credentials = Arc::new(CredentialService::new(users.clone(), hasher, keys));
        Self { credentials, users }
    }
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(crate::auth::memory::MemoryUserStore::new()))
    }

    pub fn fake_with(users: Arc<dyn UserStore>) -> Self {
        Self::from_parts(
            users,
            crate::auth::password::test_hasher(),
            crate::auth::jwt::test_keys("test-secret"),
        )
    }
}
