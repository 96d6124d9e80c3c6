use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: BTreeMap<String, String>,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = BTreeMap::new();

    let database_ok = match state.users.ping().await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "database health check failed");
            false
        }
    };
    services.insert("database".to_string(), status_label(database_ok).to_string());
    debug!(database_ok, "health checked");

    let code = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthResponse {
            status: status_label(database_ok).to_string(),
            services,
        }),
    )
}

fn status_label(ok: bool) -> &'static str {
    if ok {
        "healthy"
    } else {
        "unhealthy"
    }
}
