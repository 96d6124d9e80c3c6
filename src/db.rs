use anyhow::Context;
use secrecy::ExposeSecret;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

use crate::config::DatabaseConfig;

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(cfg.password.expose_secret())
        .database(&cfg.name);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .max_lifetime(cfg.max_lifetime)
        .acquire_timeout(cfg.timeout)
        .connect_with(options)
        .await
        .with_context(|| format!("connect to database {}@{}:{}", cfg.name, cfg.host, cfg.port))?;

    tracing::info!(host = %cfg.host, database = %cfg.name, "database connected");
    Ok(pool)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run database migrations")?;
    tracing::info!("migrations applied");
    Ok(())
}
