//! Axum router wiring (§6): `GET /healthz` and the `GET /ws` upgrade, with
//! `tower_http` CORS and trace layers.

use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::EngineHandle;

use super::ws::handle_socket;

pub fn build_router(engine: EngineHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(engine): State<EngineHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, engine))
}
