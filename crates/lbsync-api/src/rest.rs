//! REST API handlers

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use lbsync_core::{CommittedConfig, FrontendDeclaration, FrontendEntry, LbsyncError};
use lbsync_reconciler::ReconcilerHandle;
use lbsync_store::DeclarationStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{require_admin, Credentials};

/// Application state shared across handlers
pub struct AppState {
    pub reconciler: ReconcilerHandle,
    pub store: Arc<DeclarationStore>,
}

/// Create the API router
pub fn create_router(
    reconciler: ReconcilerHandle,
    store: Arc<DeclarationStore>,
    credentials: Credentials,
) -> Router {
    let state = Arc::new(AppState { reconciler, store });

    let admin = Router::new()
        .route("/", post(replace_frontends))
        .route(
            "/api/v1/frontends",
            get(get_frontends).post(replace_frontends),
        )
        .route("/api/v1/declarations", get(get_declarations))
        .route("/api/v1/status", get(get_status))
        .route_layer(middleware::from_fn_with_state(credentials, require_admin));

    Router::new()
        .merge(admin)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: LbsyncError) -> (StatusCode, String) {
    let status = match &e {
        e if e.is_discovery() => StatusCode::BAD_GATEWAY,
        LbsyncError::ReconcilerStopped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Replace the frontend declarations
///
/// The list is persisted first, then committed; the response is the resulting configuration.
async fn replace_frontends(
    State(state): State<Arc<AppState>>,
    Json(declarations): Json<Vec<FrontendDeclaration>>,
) -> Result<Json<Vec<FrontendEntry>>, (StatusCode, String)> {
    info!(frontends = declarations.len(), "Replacing frontend declarations");

    state
        .store
        .save(&declarations)
        .await
        .map_err(error_response)?;

    let config = state
        .reconciler
        .replace(declarations)
        .await
        .map_err(|e| {
            warn!(error = %e, "Saved declarations could not be applied");
            error_response(e)
        })?;

    Ok(Json(config.entries))
}

/// Get the committed configuration
async fn get_frontends(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommittedConfig>, (StatusCode, String)> {
    state
        .reconciler
        .committed()
        .await
        .map_err(error_response)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No configuration committed yet".to_string(),
            )
        })
}

/// Get the stored declarations
async fn get_declarations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FrontendDeclaration>>, (StatusCode, String)> {
    let declarations = state.store.load().await.map_err(error_response)?;
    Ok(Json(declarations))
}

/// Reconciler status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub polling: bool,
    pub cycles: u64,
    pub skipped: u64,
    pub commits: u64,
    pub failures: u64,
    pub fingerprint: Option<String>,
}

/// Get reconciler status
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let stats = state.reconciler.stats().await.map_err(error_response)?;
    let committed = state.reconciler.committed().await.map_err(error_response)?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        polling: state.reconciler.is_armed(),
        cycles: stats.cycles,
        skipped: stats.skipped,
        commits: stats.commits,
        failures: stats.failures,
        fingerprint: committed.map(|c| c.fingerprint().to_string()),
    }))
}

async fn health() -> &'static str {
    "ok"
}
