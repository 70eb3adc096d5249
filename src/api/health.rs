use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    products: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let products = state
        .trading_service
        .products(None)
        .map(|p| p.len())
        .unwrap_or(0);

    Json(HealthResponse {
        status: if products > 0 { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        products,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
