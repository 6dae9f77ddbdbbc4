//! HTTP surface (§2.1, §6): the axum `Router` exposing the WebSocket upgrade route
//! and the optional liveness route. Grounded on the teacher's `api::router(..) -> Router`
//! shape, minus the database pool — persistence is a stated non-goal here.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::registry::Registry;
use crate::ws::ws_handler;

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/ws", get(ws_handler))
        .with_state(registry)
}

async fn liveness() -> &'static str {
    "ok"
}
