//! 에러 타입 정의

use thiserror::Error;

/// 세션 컨텍스트 검증 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

/// 전송 계층 에러 (연결 수립 실패, emit ack 실패)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid transport address: {0}")]
    InvalidAddress(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connection closed")]
    Closed,

    #[error("emit rejected: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// 액션 전송 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("connection {index} is not connected")]
    NotConnected { index: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// HTTP 백엔드 호출 에러
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// 단일 커넥션 조작 에러
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no connection at index {0}")]
    UnknownConnection(usize),

    #[error("cannot reserve {0} more connections")]
    InvalidSize(usize),

    #[error("connection {0} already has a gift in flight")]
    Busy(usize),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
