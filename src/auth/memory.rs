use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{bounded, StoreError, UserStore},
    repo_types::User,
};

/// In-process store keyed by email, mirroring the unique constraint of `users.email`.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    offline: bool,
    stall: Option<Duration>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails, for exercising storage error paths.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// A store whose every call hangs until `limit` elapses, then times out.
    pub fn stalled(limit: Duration) -> Self {
        Self {
            stall: Some(limit),
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    async fn check_online(&self, op: &'static str) -> Result<(), StoreError> {
        if let Some(limit) = self.stall {
            return bounded(op, limit, std::future::pending::<Result<(), StoreError>>()).await;
        }
        if self.offline {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        self.check_online("create").await?;
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(StoreError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_online("get_by_email").await?;
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online("ping").await
    }
}
