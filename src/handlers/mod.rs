//! 제어 API 핸들러 모듈

pub mod actions;
pub mod pool;

use crate::state::AppState;
use axum::{
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 제어 API 라우터
pub fn router(state: Arc<AppState>) -> Router {
    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route(
            "/connections",
            get(pool::list_connections).post(pool::create_connections),
        )
        .route("/activity", get(pool::activity))
        .route("/broadcast/message", post(actions::broadcast_message))
        .route("/broadcast/gift", post(actions::broadcast_gift))
        .route("/connections/:index/message", post(actions::send_message))
        .route("/connections/:index/gift", post(actions::send_gift))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Livestream Swarm</h1><p>Pool snapshot: /connections</p>")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "livestream-swarm",
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }))
}
