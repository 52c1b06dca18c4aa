//! Engine.IO v4 / Socket.IO v5 텍스트 패킷 코덱 (기본 네임스페이스만 지원)

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine.IO open 패킷 페이로드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

/// 전송 계층에서 주고받는 패킷
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect { sid: Option<String> },
    Disconnect,
    Event { ack_id: Option<u64>, data: Vec<Value> },
    Ack { ack_id: u64, data: Vec<Value> },
    ConnectError { message: String },
}

impl Packet {
    /// 텍스트 프레임 디코딩
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        let mut chars = text.chars();
        let engine_type = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty packet".to_string()))?;
        let rest = chars.as_str();

        match engine_type {
            '0' => serde_json::from_str(rest)
                .map(Packet::Open)
                .map_err(|e| TransportError::Protocol(format!("bad open packet: {}", e))),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '6' => Ok(Packet::Noop),
            '4' => Self::decode_message(rest),
            other => Err(TransportError::Protocol(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }

    fn decode_message(text: &str) -> Result<Self, TransportError> {
        let mut chars = text.chars();
        let socket_type = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty message packet".to_string()))?;
        let mut rest = chars.as_str();

        // "/admin," 형태의 네임스페이스 접두사는 무시
        if rest.starts_with('/') {
            rest = rest.find(',').map(|i| &rest[i + 1..]).unwrap_or("");
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| TransportError::Protocol(format!("bad ack id: {}", e)))?,
            )
        } else {
            None
        };
        let body = &rest[digits..];

        match socket_type {
            '0' => {
                let sid = if body.is_empty() {
                    None
                } else {
                    parse_json(body)?
                        .get("sid")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                Ok(Packet::Connect { sid })
            }
            '1' => Ok(Packet::Disconnect),
            '2' => Ok(Packet::Event {
                ack_id,
                data: parse_array(body)?,
            }),
            '3' => Ok(Packet::Ack {
                ack_id: ack_id
                    .ok_or_else(|| TransportError::Protocol("ack without id".to_string()))?,
                data: parse_array(body)?,
            }),
            '4' => {
                let value = if body.is_empty() {
                    Value::Null
                } else {
                    parse_json(body)?
                };
                Ok(Packet::ConnectError {
                    message: error_message(&value),
                })
            }
            other => Err(TransportError::Protocol(format!(
                "unknown socket packet type '{}'",
                other
            ))),
        }
    }

    /// 텍스트 프레임 인코딩
    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => format!(
                "0{}",
                serde_json::to_string(handshake).unwrap_or_else(|_| "{}".to_string())
            ),
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect { sid: None } => "40".to_string(),
            Packet::Connect { sid: Some(sid) } => {
                format!("40{}", serde_json::json!({ "sid": sid }))
            }
            Packet::Disconnect => "41".to_string(),
            Packet::Event { ack_id, data } => format!(
                "42{}{}",
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                Value::Array(data.clone())
            ),
            Packet::Ack { ack_id, data } => {
                format!("43{}{}", ack_id, Value::Array(data.clone()))
            }
            Packet::ConnectError { message } => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
        }
    }
}

/// feathers 스타일 에러 값에서 사람이 읽을 메시지 추출
pub fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}

fn parse_json(body: &str) -> Result<Value, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::Protocol(format!("bad payload: {}", e)))
}

fn parse_array(body: &str) -> Result<Vec<Value>, TransportError> {
    match parse_json(body)? {
        Value::Array(items) => Ok(items),
        other => Err(TransportError::Protocol(format!(
            "expected array payload, got {}",
            other
        ))),
    }
}
