//! 브로드캐스트 / 단일 커넥션 액션 핸들러

use crate::error::{DispatchError, PoolError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

impl IntoResponse for PoolError {
    fn into_response(self) -> Response {
        let status = match &self {
            PoolError::UnknownConnection(_) => StatusCode::NOT_FOUND,
            PoolError::InvalidSize(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PoolError::Busy(_) | PoolError::Dispatch(DispatchError::NotConnected { .. }) => {
                StatusCode::CONFLICT
            }
            PoolError::Dispatch(DispatchError::Transport(_)) | PoolError::Backend(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn broadcast_message(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.broadcast_message() {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "pool operation already in progress" })),
        );
    }
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
}

pub async fn broadcast_gift(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.broadcast_gift();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<serde_json::Value>, PoolError> {
    let text = state.pool.send_message(index).await?;
    state.activity.push(text.clone());
    Ok(Json(serde_json::json!({ "result": text })))
}

pub async fn send_gift(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<serde_json::Value>, PoolError> {
    state.pool.send_gift_at(index).await?;
    state
        .activity
        .push(format!("CONNECTION {} gift sent", index));
    Ok(Json(serde_json::json!({ "status": "sent" })))
}
