//! 양방향 스트리밍 전송 계층 경계
//!
//! `Transport::open` 은 핸드셰이크 완료를 기다리지 않고 즉시 반환하며,
//! 연결/해제는 `TransportEvent` 로 비동기 통지된다.

pub mod socketio;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::TransportError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub use socketio::SocketIoTransport;

/// 세션 오픈 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub address: String,
    pub channel: String,
    pub application_id: String,
    pub user_id: String,
    pub connect_timeout: Duration,
}

/// 전송 세션 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { id: String },
    Disconnected { reason: String },
    /// 연결 상태에 도달하지 못함
    ConnectFailed { error: TransportError },
}

/// emit 확인 응답 (ack 의 data 인자)
pub type AckFuture = BoxFuture<'static, Result<Value, TransportError>>;

/// 열린 세션에 대한 핸들
pub trait ConnectionHandle: Send + Sync {
    /// 프레임은 호출 시점에 큐잉되고, 반환된 future 는 ack 도착 시 완료된다.
    fn emit(&self, event: &str, resource: &str, payload: Value) -> AckFuture;

    fn close(&self);
}

pub struct TransportSession {
    pub handle: Arc<dyn ConnectionHandle>,
    pub events: UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, TransportError>;
}
