mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{BroadcastEmitter, Error, Result, TradingMode};
use engine::Launcher;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Storages are resolved by name through the launcher's registry.
    pub launcher: Arc<Launcher>,
    pub events: BroadcastEmitter,
    pub trading_mode: TradingMode,
    pub dashboard_token: String,
}

/// Full application router: public health check, bearer-protected JSON API
/// and the token-authenticated event stream.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let protected = routes::api_router()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .merge(protected)
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Bind and serve the dashboard API until the listener fails.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard API listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Other(format!("dashboard server stopped: {e}")))
}
