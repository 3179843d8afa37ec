// Route table for the Verdict API

use crate::{handlers, ws, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/submissions/create", post(handlers::create_submission))
        .route("/api/submissions/user", get(handlers::list_user_submissions))
        .route("/api/submissions/:id", get(handlers::get_submission))
        .route("/internal/push", post(handlers::internal_push))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_export))
}
