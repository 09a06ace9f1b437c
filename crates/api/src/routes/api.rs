use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use common::{Error, OrderDirection, OrderFilter, OrderStatus, Pair};

use crate::AppState;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(get_orders))
        .route("/api/runs", get(get_runs))
        .route("/api/runs/:id", get(get_run))
}

fn error_response(e: Error) -> (StatusCode, Json<Value>) {
    let status = match &e {
        Error::PluginNotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidPair(_) => StatusCode::BAD_REQUEST,
        _ => {
            warn!(error = %e, "API request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string() })))
}

// ─── Orders ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OrdersQuery {
    market: String,
    pair: String,
    storage: Option<String>,
    status: Option<OrderStatus>,
    direction: Option<OrderDirection>,
}

async fn get_orders(State(state): State<AppState>, Query(q): Query<OrdersQuery>) -> ApiResult {
    let pair: Pair = q.pair.parse().map_err(error_response)?;
    let storage_name = q.storage.as_deref().unwrap_or("memory");
    let storage = state.launcher.storages().orders(storage_name).map_err(error_response)?;

    let filter = OrderFilter {
        status: q.status,
        direction: q.direction,
        ..OrderFilter::default()
    };
    let orders = storage
        .find_by(&q.market, &pair, &filter)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "storage": storage_name,
        "total": orders.len(),
        "orders": orders,
    })))
}

// ─── Strategy runs ───────────────────────────────────────────────────────────

async fn get_runs(State(state): State<AppState>) -> ApiResult {
    let runs = state
        .launcher
        .storages()
        .runs()
        .find_all()
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "total": runs.len(), "runs": runs })))
}

async fn get_run(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult {
    let run = state
        .launcher
        .storages()
        .runs()
        .find_by_id(id)
        .await
        .map_err(error_response)?;
    match run {
        Some(run) => Ok(Json(json!(run))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no strategy run {id}") })),
        )),
    }
}
