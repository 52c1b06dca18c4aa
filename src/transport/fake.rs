//! 테스트용 스크립트 전송: open/connect/ack 결과를 테스트가 직접 제어한다

use super::{AckFuture, ConnectionHandle, OpenRequest, Transport, TransportEvent, TransportSession};
use crate::error::TransportError;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// emit 기록 (ack 는 테스트가 해소)
pub(crate) struct FakeEmit {
    pub event: String,
    pub resource: String,
    pub payload: Value,
    ack: Option<oneshot::Sender<Result<Value, TransportError>>>,
}

struct FakeRemote {
    events: mpsc::UnboundedSender<TransportEvent>,
    emits: Arc<Mutex<Vec<FakeEmit>>>,
}

#[derive(Default)]
struct FakeState {
    /// 시간 순 호출 기록 ("open:0", "opened:0", "emit:0", ...)
    log: Vec<String>,
    requests: Vec<OpenRequest>,
    remotes: Vec<Option<FakeRemote>>,
    fail_opens: HashSet<usize>,
    auto_connect: bool,
    auto_ack: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// open 즉시 Connected 를 보내고, 모든 emit 을 성공 ack 한다
    pub fn automatic() -> Self {
        let transport = Self::new();
        {
            let mut state = transport.state.lock().unwrap();
            state.auto_connect = true;
            state.auto_ack = true;
        }
        transport
    }

    pub fn fail_open(&self, attempt: usize) {
        self.state.lock().unwrap().fail_opens.insert(attempt);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn requests(&self) -> Vec<OpenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn connect(&self, attempt: usize, id: &str) {
        self.send_event(
            attempt,
            TransportEvent::Connected {
                id: id.to_string(),
            },
        );
    }

    pub fn disconnect(&self, attempt: usize) {
        self.send_event(
            attempt,
            TransportEvent::Disconnected {
                reason: "server disconnect".to_string(),
            },
        );
    }

    pub fn send_event(&self, attempt: usize, event: TransportEvent) {
        let state = self.state.lock().unwrap();
        let remote = state.remotes[attempt].as_ref().expect("session was not opened");
        remote.events.send(event).unwrap();
    }

    /// 세션별 emit 의 (event, resource, payload) 목록
    pub fn emits(&self, attempt: usize) -> Vec<(String, String, Value)> {
        let state = self.state.lock().unwrap();
        match state.remotes.get(attempt).and_then(Option::as_ref) {
            Some(remote) => remote
                .emits
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.event.clone(), e.resource.clone(), e.payload.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn ack(&self, attempt: usize, emit: usize, result: Result<Value, TransportError>) {
        let state = self.state.lock().unwrap();
        let remote = state.remotes[attempt].as_ref().expect("session was not opened");
        let sender = remote.emits.lock().unwrap()[emit]
            .ack
            .take()
            .expect("emit already acknowledged");
        let _ = sender.send(result);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, request: OpenRequest) -> Result<TransportSession, TransportError> {
        let mut state = self.state.lock().unwrap();
        let attempt = state.requests.len();
        state.log.push(format!("open:{}", attempt));
        state.requests.push(request);

        if state.fail_opens.contains(&attempt) {
            state.remotes.push(None);
            state.log.push(format!("failed:{}", attempt));
            return Err(TransportError::ConnectFailed(format!(
                "scripted failure {}",
                attempt
            )));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let emits = Arc::new(Mutex::new(Vec::new()));
        if state.auto_connect {
            let _ = events_tx.send(TransportEvent::Connected {
                id: format!("sid-{}", attempt),
            });
        }
        state.remotes.push(Some(FakeRemote {
            events: events_tx,
            emits: emits.clone(),
        }));
        state.log.push(format!("opened:{}", attempt));

        Ok(TransportSession {
            handle: Arc::new(FakeHandle {
                attempt,
                state: self.state.clone(),
                emits,
                auto_ack: state.auto_ack,
            }),
            events: events_rx,
        })
    }
}

struct FakeHandle {
    attempt: usize,
    state: Arc<Mutex<FakeState>>,
    emits: Arc<Mutex<Vec<FakeEmit>>>,
    auto_ack: bool,
}

impl ConnectionHandle for FakeHandle {
    fn emit(&self, event: &str, resource: &str, payload: Value) -> AckFuture {
        let (tx, rx) = oneshot::channel();
        let ack = if self.auto_ack {
            let _ = tx.send(Ok(Value::Null));
            None
        } else {
            Some(tx)
        };
        self.state
            .lock()
            .unwrap()
            .log
            .push(format!("emit:{}", self.attempt));
        self.emits.lock().unwrap().push(FakeEmit {
            event: event.to_string(),
            resource: resource.to_string(),
            payload,
            ack,
        });
        async move { rx.await.map_err(|_| TransportError::Closed)? }.boxed()
    }

    fn close(&self) {}
}

/// 조건이 참이 될 때까지 대기 (최대 2초)
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
