use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use tracing::{debug, error};

use crate::auth::repo_types::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    Duplicate,
    #[error("store call `{0}` timed out")]
    Timeout(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence capability the credential service depends on.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. A taken email yields [`StoreError::Duplicate`].
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Runs `fut` under `limit`; an elapsed limit becomes [`StoreError::Timeout`].
pub(crate) async fn bounded<T, E, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StoreError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(Into::into),
        Err(_) => {
            error!(op, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StoreError::Timeout(op))
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        bounded(op, self.timeout, fut).await
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let query = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db);

        match self.bounded("create", query).await {
            Ok(user) => {
                debug!(user_id = %user.id, "user row inserted");
                Ok(user)
            }
            Err(StoreError::Database(sqlx::Error::Database(db_err)))
                if db_err.is_unique_violation() =>
            {
                Err(StoreError::Duplicate)
            }
            Err(e) => {
                error!(error = %e, "insert user failed");
                Err(e)
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db);

        self.bounded("get_by_email", query).await.map_err(|e| {
            error!(error = %e, "fetch user by email failed");
            e
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let db = self.db.clone();
        self.bounded("ping", async move {
            let mut conn = db.acquire().await?;
            conn.ping().await
        })
        .await
    }
}
