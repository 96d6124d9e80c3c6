use std::{future::IntoFuture, net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::{signal, sync::watch};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{auth, config::ServerConfig, health::health, state::AppState};

/// Requests still running after `request_timeout` are answered with `408`.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", auth::router())
        .route("/health", get(health))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        let latency_ms = latency.as_millis() as u64;
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Serves until SIGINT/SIGTERM, then gives in-flight requests `shutdown_timeout` to finish.
pub async fn serve(app: Router, cfg: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("parse listen address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    info!("listening on {}", addr);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();

    let timeout = cfg.shutdown_timeout;
    let deadline = async move {
        if stop_rx.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(timeout).await;
    };

    tokio::select! {
        res = server => res.context("http server")?,
        () = deadline => warn!(timeout_secs = timeout.as_secs(), "graceful shutdown timed out; forcing exit"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        auth::{
            dto::{ErrorResponse, LoginResponse, MeResponse, SignupResponse},
            memory::MemoryUserStore,
        },
        health::HealthResponse,
    };

    fn test_app(state: AppState) -> Router {
        build_app(state, Duration::from_secs(10))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: DeserializeOwned>(res: Response) -> T {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn signup(app: &Router, email: &str, password: &str) -> Response {
        app.clone()
            .oneshot(post_json(
                "/api/v1/auth/signup",
                json!({ "email": email, "password": password }),
            ))
            .await
            .unwrap()
    }

    async fn login(app: &Router, email: &str, password: &str) -> Response {
        app.clone()
            .oneshot(post_json(
                "/api/v1/auth/login",
                json!({ "email": email, "password": password }),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signup_returns_created_user() {
        let app = test_app(AppState::fake());
        let res = signup(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: SignupResponse = read_json(res).await;
        assert_eq!(body.email, "a@example.com");
        assert!(!body.id.is_nil());
    }

    #[tokio::test]
    async fn signup_response_never_contains_password_material() {
        let app = test_app(AppState::fake());
        let res = signup(&app, "a@example.com", "password123").await;
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("password"));
        assert!(!text.contains("argon2"));
    }

    #[tokio::test]
    async fn signup_validation_and_duplicates() {
        let app = test_app(AppState::fake());

        let res = signup(&app, "bad-email", "password123").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = read_json(res).await;
        assert_eq!(body.error, "invalid email");

        let res = signup(&app, "a@example.com", "short").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        assert_eq!(signup(&app, "a@example.com", "password123").await.status(), StatusCode::CREATED);
        let res = signup(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = read_json(res).await;
        assert_eq!(body.error, "email already registered");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_with_error_field() {
        let app = test_app(AppState::fake());
        let res = app
            .clone()
            .oneshot(post_json("/api/v1/auth/signup", json!({ "email": "a@example.com" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = read_json(res).await;
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn login_issues_token_usable_on_me() {
        let app = test_app(AppState::fake());
        let created: SignupResponse = read_json(signup(&app, "a@example.com", "password123").await).await;

        let res = login(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::OK);
        let LoginResponse { token } = read_json(res).await;
        assert_eq!(token.split('.').count(), 3);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let me: MeResponse = read_json(res).await;
        assert_eq!(me.id, created.id);
        assert_eq!(me.email, "a@example.com");
    }

    #[tokio::test]
    async fn login_failures_are_uniform() {
        let app = test_app(AppState::fake());
        signup(&app, "a@example.com", "password123").await;

        let wrong = login(&app, "a@example.com", "wrong-password").await;
        let unknown = login(&app, "ghost@example.com", "password123").await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let wrong: ErrorResponse = read_json(wrong).await;
        let unknown: ErrorResponse = read_json(unknown).await;
        assert_eq!(wrong.error, "invalid credentials");
        assert_eq!(wrong.error, unknown.error);
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer_token() {
        let app = test_app(AppState::fake());

        let missing = app
            .clone()
            .oneshot(Request::builder().uri("/api/v1/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let garbage = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/me")
                    .header(header::AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = read_json(garbage).await;
        assert_eq!(body.error, "invalid or expired token");
    }

    #[tokio::test]
    async fn health_reports_store_connectivity() {
        let app = test_app(AppState::fake());
        let res = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: HealthResponse = read_json(res).await;
        assert_eq!(body.status, "healthy");
        assert_eq!(body.services.get("database").map(String::as_str), Some("healthy"));

        let app = test_app(AppState::fake_with(Arc::new(MemoryUserStore::offline())));
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: HealthResponse = read_json(res).await;
        assert_eq!(body.status, "unhealthy");
    }

    #[tokio::test]
    async fn slow_requests_are_cut_off() {
        let state = AppState::fake_with(Arc::new(MemoryUserStore::stalled(Duration::from_secs(5))));
        let app = build_app(state, Duration::from_millis(50));
        let res = signup(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn storage_outage_is_service_unavailable() {
        let app = test_app(AppState::fake_with(Arc::new(MemoryUserStore::offline())));
        let res = signup(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let res = login(&app, "a@example.com", "password123").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
