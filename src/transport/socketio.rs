//! Socket.IO (EIO=4, websocket 전용) 클라이언트 전송 구현

use super::{AckFuture, ConnectionHandle, OpenRequest, Transport, TransportEvent, TransportSession};
use crate::error::TransportError;
use crate::protocol::socketio::{error_message, Packet};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{future, FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

type AckTable = DashMap<u64, oneshot::Sender<Result<Value, TransportError>>>;

/// 송신 태스크로 전달되는 명령
enum Outgoing {
    Frame(String),
    Close,
}

/// Socket.IO websocket 전송
#[derive(Debug, Default, Clone)]
pub struct SocketIoTransport;

impl SocketIoTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for SocketIoTransport {
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, TransportError> {
        let ws_request = build_request(&request)?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let acks: Arc<AckTable> = Arc::new(DashMap::new());

        tokio::spawn(run_session(
            ws_request,
            request,
            outgoing_rx,
            acks.clone(),
            events_tx,
        ));

        Ok(TransportSession {
            handle: Arc::new(SocketIoHandle {
                outgoing: outgoing_tx,
                acks,
                next_ack: AtomicU64::new(0),
            }),
            events: events_rx,
        })
    }
}

/// `{ws|wss}://host/socket.io/?EIO=4&transport=websocket&channel=..&appId=..`
pub fn socket_url(request: &OpenRequest) -> Result<String, TransportError> {
    let mut url = reqwest::Url::parse(&request.address)
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", request.address, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidAddress(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidAddress(request.address.clone()))?;

    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair("channel", &request.channel)
        .append_pair("appId", &request.application_id);

    Ok(url.to_string())
}

fn build_request(request: &OpenRequest) -> Result<Request, TransportError> {
    let mut ws_request = socket_url(request)?
        .into_client_request()
        .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;

    let user_id = HeaderValue::from_str(&request.user_id)
        .map_err(|e| TransportError::InvalidAddress(format!("bad userid header: {}", e)))?;
    ws_request.headers_mut().insert("userid", user_id);

    Ok(ws_request)
}

/// 세션 백그라운드 태스크: 핸드셰이크, ping 응답, ack 라우팅
async fn run_session(
    ws_request: Request,
    request: OpenRequest,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    acks: Arc<AckTable>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let connect = tokio::time::timeout(
        request.connect_timeout,
        tokio_tungstenite::connect_async(ws_request),
    );
    tokio::pin!(connect);

    // 연결 중 close 요청은 즉시 처리하고, 그 전에 들어온 프레임은 연결 후 전송
    let mut queued: Vec<String> = Vec::new();
    let connected_ws = loop {
        tokio::select! {
            result = &mut connect => break Some(result),
            command = outgoing.recv() => match command {
                Some(Outgoing::Frame(text)) => queued.push(text),
                Some(Outgoing::Close) | None => break None,
            },
        }
    };
    let Some(connected_ws) = connected_ws else {
        drop(outgoing);
        acks.clear();
        let _ = events.send(TransportEvent::ConnectFailed {
            error: TransportError::Closed,
        });
        return;
    };

    let ws = match connected_ws {
        Ok(Ok((ws, _))) => ws,
        Ok(Err(e)) => {
            drop(outgoing);
            acks.clear();
            let _ = events.send(TransportEvent::ConnectFailed {
                error: TransportError::ConnectFailed(e.to_string()),
            });
            return;
        }
        Err(_) => {
            drop(outgoing);
            acks.clear();
            let _ = events.send(TransportEvent::ConnectFailed {
                error: TransportError::ConnectFailed(format!(
                    "timed out after {:?}",
                    request.connect_timeout
                )),
            });
            return;
        }
    };

    let (mut sink, mut stream) = ws.split();
    let mut engine_sid: Option<String> = None;
    let mut connected = false;
    let mut failure: Option<TransportError> = None;
    let mut reason = String::from("transport close");

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match Packet::decode(&text) {
                    Ok(Packet::Open(handshake)) => {
                        tracing::debug!(sid = %handshake.sid, channel = %request.channel, "Engine.IO open");
                        engine_sid = Some(handshake.sid);
                        if sink.send(Message::Text(Packet::Connect { sid: None }.encode())).await.is_err() {
                            failure = Some(TransportError::Handshake("namespace connect not sent".to_string()));
                            break;
                        }
                    }
                    Ok(Packet::Ping) => {
                        if sink.send(Message::Text(Packet::Pong.encode())).await.is_err() {
                            reason = "pong failed".to_string();
                            break;
                        }
                    }
                    Ok(Packet::Connect { sid }) => {
                        let id = sid.or_else(|| engine_sid.clone()).unwrap_or_default();
                        connected = true;
                        let mut flushed = true;
                        for text in queued.drain(..) {
                            if sink.send(Message::Text(text)).await.is_err() {
                                flushed = false;
                                break;
                            }
                        }
                        if !flushed {
                            reason = "send failed".to_string();
                            break;
                        }
                        let _ = events.send(TransportEvent::Connected { id });
                    }
                    Ok(Packet::Ack { ack_id, data }) => {
                        if let Some((_, tx)) = acks.remove(&ack_id) {
                            let _ = tx.send(ack_result(data));
                        }
                    }
                    Ok(Packet::ConnectError { message }) => {
                        failure = Some(TransportError::Handshake(message));
                        break;
                    }
                    Ok(Packet::Disconnect) => {
                        reason = "io server disconnect".to_string();
                        break;
                    }
                    Ok(Packet::Close) => break,
                    Ok(Packet::Event { data, .. }) => {
                        tracing::trace!(event = ?data.first(), "Ignoring server event");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping malformed packet");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    reason = e.to_string();
                    if !connected {
                        failure = Some(TransportError::ConnectFailed(e.to_string()));
                    }
                    break;
                }
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Frame(text)) if !connected => queued.push(text),
                Some(Outgoing::Frame(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        reason = "send failed".to_string();
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    if connected {
                        let _ = sink.send(Message::Text(Packet::Disconnect.encode())).await;
                    } else {
                        failure = Some(TransportError::Closed);
                    }
                    let _ = sink.close().await;
                    reason = "io client disconnect".to_string();
                    break;
                }
            },
        }
    }

    // 수신측을 먼저 닫아야 이후 emit 이 ack 테이블에 남지 않는다
    drop(outgoing);
    acks.clear();

    let event = if connected {
        TransportEvent::Disconnected { reason }
    } else {
        TransportEvent::ConnectFailed {
            error: failure.unwrap_or_else(|| TransportError::Handshake(reason)),
        }
    };
    let _ = events.send(event);
}

/// feathers ack 인자 `[err, data]` 해석
fn ack_result(mut data: Vec<Value>) -> Result<Value, TransportError> {
    if data.is_empty() {
        return Ok(Value::Null);
    }
    let error = data.remove(0);
    if !error.is_null() {
        return Err(TransportError::Rejected(error_message(&error)));
    }
    Ok(data.into_iter().next().unwrap_or(Value::Null))
}

struct SocketIoHandle {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    acks: Arc<AckTable>,
    next_ack: AtomicU64,
}

impl ConnectionHandle for SocketIoHandle {
    fn emit(&self, event: &str, resource: &str, payload: Value) -> AckFuture {
        let ack_id = self.next_ack.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.acks.insert(ack_id, tx);

        let frame = Packet::Event {
            ack_id: Some(ack_id),
            data: vec![Value::from(event), Value::from(resource), payload],
        }
        .encode();

        if self.outgoing.send(Outgoing::Frame(frame)).is_err() {
            self.acks.remove(&ack_id);
            return future::ready(Err(TransportError::Closed)).boxed();
        }

        async move { rx.await.map_err(|_| TransportError::Closed)? }.boxed()
    }

    fn close(&self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}
