mod app;
mod auth;
mod config;
mod db;
mod health;
mod state;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "auth_service=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("starting auth service");

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;

    let state = AppState::init(&config, pool.clone())?;
    let app = app::build_app(state, config.server.request_timeout);
    app::serve(app, &config.server).await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
