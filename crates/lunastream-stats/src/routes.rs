use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::limit::{self, client_ip};
use crate::state::AppState;

#[derive(Serialize)]
struct TotalResponse {
    success: bool,
    total: u64,
}

#[derive(Serialize)]
struct VisitResponse {
    success: bool,
    new_visitor: bool,
    total: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    // Permissive CORS: the counters are public vanity metrics and the web app
    // calls them cross-origin. The CORS layer also answers preflights.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/watch-stats", get(watch_total).post(record_watch))
        .route("/api/unique", get(unique_total).post(record_visit))
        .layer(middleware::from_fn_with_state(state.clone(), limit::rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn record_watch(State(state): State<Arc<AppState>>) -> Json<TotalResponse> {
    let total = state.record_watch();
    debug!("Watch event recorded, total {}", total);
    Json(TotalResponse {
        success: true,
        total,
    })
}

async fn watch_total(State(state): State<Arc<AppState>>) -> Json<TotalResponse> {
    Json(TotalResponse {
        success: true,
        total: state.watch_total(),
    })
}

async fn record_visit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<VisitResponse> {
    let ip = client_ip(&headers, addr);
    let (new_visitor, total) = state.record_visit(&ip);
    if new_visitor {
        debug!("New visitor, total {}", total);
    }
    Json(VisitResponse {
        success: true,
        new_visitor,
        total,
    })
}

async fn unique_total(State(state): State<Arc<AppState>>) -> Json<TotalResponse> {
    Json(TotalResponse {
        success: true,
        total: state.unique_total(),
    })
}
