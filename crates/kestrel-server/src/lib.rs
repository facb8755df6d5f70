//! kestrel server library logic: configuration, the storing federating
//! actor, and the HTTP surface exposing worker health.

pub mod config;
pub mod outbox;

use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use kestrel_workers::{Processor, StreamHub};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
    pub streams: Arc<StreamHub>,
}

/// Health check handler.
///
/// Reports queue depths and open streams alongside the version, so a
/// stalled worker pool shows up as a growing queue.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let processor = &state.processor;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "instance": processor.config().host,
        "queues": {
            "client": processor.client_queue().len(),
            "federator": processor.fedi_queue().len(),
        },
        "streams": state.streams.connected_accounts(),
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
