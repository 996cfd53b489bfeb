use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::cli::build_router;
use crate::config::config;
use crate::database::router::TenantRouter;
use crate::services::health::HealthService;

#[derive(Clone)]
pub struct AppState {
    router: Arc<TenantRouter>,
    health: Arc<HealthService>,
}

pub async fn handle() -> anyhow::Result<()> {
    let config = config();
    let router = build_router()?;

    // Fail-fast: the process does not bind until the router is Ready
    router.bootstrap().await?;

    let health = Arc::new(HealthService::new(
        router.registry(),
        Duration::from_secs(config.database.probe_timeout_secs),
    ));
    let app = app(AppState { router, health });

    let port = std::env::var("STRATUM_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Stratum listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Stratum",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant database connection manager",
            "endpoints": {
                "health": "/health",
                "ready": "/ready",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.health.check_all().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "success": report.healthy,
            "data": report,
        })),
    )
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let ready = state.router.is_ready().await;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "success": ready,
            "data": { "state": state.router.state().await }
        })),
    )
}
