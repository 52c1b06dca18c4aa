//! 풀 생성 / 스냅샷 / 활동 로그 핸들러

use crate::pool::ConnectionSnapshot;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct CreatePoolRequest {
    pub size: Option<usize>,
}

/// 풀 스냅샷
#[derive(Debug, Serialize)]
pub struct PoolView {
    pub run_id: String,
    pub room: String,
    pub loading: bool,
    pub connections: Vec<ConnectionSnapshot>,
}

pub async fn list_connections(State(state): State<Arc<AppState>>) -> Json<PoolView> {
    Json(PoolView {
        run_id: state.pool.run_id().to_string(),
        room: state.pool.channel().to_string(),
        loading: state.is_loading(),
        connections: state.pool.snapshot(),
    })
}

/// 풀 생성 시작 (기본 크기는 설정의 POOL_SIZE, 상한은 MAX_POOL_SIZE)
pub async fn create_connections(
    State(state): State<Arc<AppState>>,
    request: Option<Json<CreatePoolRequest>>,
) -> impl IntoResponse {
    let size = request
        .and_then(|Json(request)| request.size)
        .unwrap_or(state.config.pool.size);

    let max_size = state.config.pool.max_size;
    if size > max_size {
        tracing::warn!(size, max_size, "Rejected pool creation above configured maximum");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": format!("size {} exceeds maximum pool size {}", size, max_size)
            })),
        );
    }

    if !state.start_pool(size) {
        tracing::warn!(size, "Rejected pool creation while another operation is loading");
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "pool operation already in progress" })),
        );
    }

    tracing::info!(size, "Pool creation requested");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true, "size": size })),
    )
}

pub async fn activity(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "entries": state.activity.recent() }))
}
