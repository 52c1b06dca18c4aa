//! 커넥션 풀 컨트롤러: 순차 생성, 완료 감지, 팬아웃 전송

use super::connection::{Connection, ConnectionSnapshot};
use super::dispatcher::ActionDispatcher;
use crate::backend::{Backend, GiftPurchase, ViewIncrement};
use crate::config::Config;
use crate::error::{BackendError, DispatchError, PoolError, TransportError};
use crate::protocol::ActionKind;
use crate::session::SessionContext;
use crate::transport::{OpenRequest, Transport, TransportEvent};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// 브로드캐스트 댓글 본문
pub const BROADCAST_MESSAGE: &str = "new message =))";
/// Join 액션 본문
pub const JOIN_MESSAGE: &str = "joined";

pub type ProgressFn = Arc<dyn Fn(PoolEvent) + Send + Sync>;
pub type ResultFn = Arc<dyn Fn(usize, Result<String, DispatchError>) + Send + Sync>;
pub type GiftResultFn = Arc<dyn Fn(usize, Result<(), BackendError>) + Send + Sync>;

/// 커넥션 수명주기 통지
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    Connected { index: usize, id: String },
    Disconnected { index: usize, id: Option<String> },
    OpenFailed { index: usize, error: TransportError },
    JoinFailed { index: usize, error: DispatchError },
}

impl PoolEvent {
    pub fn index(&self) -> usize {
        match self {
            PoolEvent::Connected { index, .. }
            | PoolEvent::Disconnected { index, .. }
            | PoolEvent::OpenFailed { index, .. }
            | PoolEvent::JoinFailed { index, .. } => *index,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PoolEvent::OpenFailed { .. } | PoolEvent::JoinFailed { .. }
        )
    }
}

impl fmt::Display for PoolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolEvent::Connected { index, id } => {
                write!(f, "CONNECTION {} - {} connected", index, id)
            }
            PoolEvent::Disconnected { index, id } => write!(
                f,
                "CONNECTION {} - {} disconnected!",
                index,
                id.as_deref().unwrap_or("?")
            ),
            PoolEvent::OpenFailed { index, error } => {
                write!(f, "CONNECTION {} failed to open: {}", index, error)
            }
            PoolEvent::JoinFailed { index, error } => {
                write!(f, "CONNECTION {} failed to join: {}", index, error)
            }
        }
    }
}

/// 한 번만 호출되는 완료 콜백
#[derive(Clone)]
pub struct CompletionSignal {
    callback: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl CompletionSignal {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// 처음 호출될 때만 콜백을 실행하고 true 반환
    pub fn fire(&self) -> bool {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

/// 풀 동작 설정
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub connect_timeout: Duration,
    pub gift_id: String,
    /// 선물 호출 후 다음 전송까지의 고정 대기
    pub gift_settle: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.backend.connect_timeout,
            gift_id: config.pool.gift_id.clone(),
            gift_settle: config.pool.gift_settle,
        }
    }
}

pub struct PoolController {
    session: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    backend: Arc<dyn Backend>,
    dispatcher: ActionDispatcher,
    settings: PoolSettings,
    /// 생성 순서대로 보관, 제거/재정렬 없음
    connections: RwLock<Vec<Arc<Connection>>>,
    run_id: Uuid,
}

impl PoolController {
    pub fn new(
        session: Arc<SessionContext>,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn Backend>,
        settings: PoolSettings,
    ) -> Self {
        let channel = session.comment_channel();
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, channel = %channel, "Pool controller ready");

        Self {
            dispatcher: ActionDispatcher::new(session.clone(), channel),
            session,
            transport,
            backend,
            settings,
            connections: RwLock::new(Vec::new()),
            run_id,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// 커넥션이 구독하고 기본 room 으로 쓰는 채널
    pub fn channel(&self) -> &str {
        self.dispatcher.default_room()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn len(&self) -> usize {
        self.read_connections().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connection(&self, index: usize) -> Option<Arc<Connection>> {
        self.read_connections().get(index).cloned()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.read_connections().clone()
    }

    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.read_connections()
            .iter()
            .map(|connection| connection.snapshot())
            .collect()
    }

    fn read_connections(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Connection>>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_request(&self) -> OpenRequest {
        OpenRequest {
            address: self.session.backend_address.clone(),
            channel: self.channel().to_string(),
            application_id: self.session.application_id.clone(),
            user_id: self.session.viewer_user_id.clone(),
            connect_timeout: self.settings.connect_timeout,
        }
    }

    /// `size` 개의 커넥션을 인덱스 순서대로 하나씩 생성
    ///
    /// 인덱스 구간은 시작 시 한 번에 예약되고 모든 레코드는 pending 으로 먼저
    /// 보인다. 다음 커넥션의 open 은 직전 open 호출이 반환된 뒤 시작되며 Join
    /// 확인은 기다리지 않는다. `on_complete` 는 이 호출이 예약한 마지막 인덱스의
    /// Join 이 성공적으로 확인될 때 한 번 호출된다. 앞선 커넥션의 Join 이 그보다
    /// 늦게 끝날 수 있다는 점에 유의 (알려진 순서 위험).
    ///
    /// 이미 커넥션이 있으면 인덱스는 기존 개수부터 이어진다. 예약할 수 없는
    /// 크기면 `PoolError::InvalidSize` 이며 풀은 그대로다.
    pub async fn create_pool(
        self: &Arc<Self>,
        size: usize,
        on_progress: ProgressFn,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<(), PoolError> {
        let on_complete = CompletionSignal::new(on_complete);
        if size == 0 {
            on_complete.fire();
            return Ok(());
        }

        let reserved = self.reserve(size)?;
        let (first, last) = match (reserved.first(), reserved.last()) {
            (Some(first), Some(last)) => (first.index(), last.index()),
            _ => return Ok(()),
        };
        tracing::info!(run_id = %self.run_id, size, first, "Creating connection pool");

        for connection in reserved {
            let index = connection.index();
            match self.transport.open(self.open_request()).await {
                Ok(session) => {
                    connection.attach(session.handle);
                    let completion = (index == last).then(|| on_complete.clone());
                    tokio::spawn(self.clone().drive(
                        connection,
                        session.events,
                        on_progress.clone(),
                        completion,
                    ));
                }
                Err(error) => {
                    tracing::warn!(index, error = %error, "Transport open failed, connection stays pending");
                    on_progress(PoolEvent::OpenFailed { index, error });
                }
            }

            self.spawn_view_increment(index);
        }
        Ok(())
    }

    /// 연속된 인덱스 구간을 하나의 쓰기 잠금 안에서 pending 레코드로 예약
    fn reserve(&self, size: usize) -> Result<Vec<Arc<Connection>>, PoolError> {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let first = connections.len();
        let end = first
            .checked_add(size)
            .ok_or(PoolError::InvalidSize(size))?;
        connections
            .try_reserve(size)
            .map_err(|_| PoolError::InvalidSize(size))?;

        let reserved: Vec<Arc<Connection>> = (first..end)
            .map(|index| Arc::new(Connection::pending(index)))
            .collect();
        connections.extend(reserved.iter().cloned());
        Ok(reserved)
    }

    /// 커넥션 하나의 전송 이벤트 처리
    async fn drive(
        self: Arc<Self>,
        connection: Arc<Connection>,
        mut events: UnboundedReceiver<TransportEvent>,
        on_progress: ProgressFn,
        completion: Option<CompletionSignal>,
    ) {
        let index = connection.index();
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected { id } => {
                    if !connection.mark_connected(id.clone()) {
                        tracing::debug!(index, connection_id = %id, "Ignoring repeated connect notification");
                        continue;
                    }
                    tracing::info!(index, connection_id = %id, "Connected to server");
                    on_progress(PoolEvent::Connected { index, id });
                    self.join(&connection, on_progress.clone(), completion.clone());
                }
                TransportEvent::Disconnected { reason } => {
                    connection.mark_disconnected();
                    tracing::info!(index, reason = %reason, "Disconnected from server");
                    on_progress(PoolEvent::Disconnected {
                        index,
                        id: connection.id(),
                    });
                }
                TransportEvent::ConnectFailed { error } => {
                    tracing::warn!(index, error = %error, "Connection never reached connected state");
                    on_progress(PoolEvent::OpenFailed { index, error });
                }
            }
        }
    }

    fn join(
        &self,
        connection: &Connection,
        on_progress: ProgressFn,
        completion: Option<CompletionSignal>,
    ) {
        let index = connection.index();
        let ack = self
            .dispatcher
            .send(connection, ActionKind::Join, JOIN_MESSAGE, None);

        tokio::spawn(async move {
            match ack.await {
                Ok(_) => {
                    if let Some(completion) = completion {
                        if completion.fire() {
                            tracing::info!(index, "Last connection joined, pool creation complete");
                        }
                    }
                }
                Err(error) => on_progress(PoolEvent::JoinFailed { index, error }),
            }
        });
    }

    /// 조회수 증가 (응답/실패 무시)
    fn spawn_view_increment(&self, index: usize) {
        let backend = self.backend.clone();
        let request = ViewIncrement::for_session(&self.session);
        tokio::spawn(async move {
            if let Err(error) = backend.increment_view(&request).await {
                tracing::debug!(index, error = %error, "View increment failed (ignored)");
            }
        });
    }

    /// 연결된 모든 커넥션에 댓글 전송
    ///
    /// 발행 순서는 인덱스 순서로 고정되고 ack 순서는 보장되지 않는다.
    /// `on_settled` 는 마지막 커넥션의 전송이 성공했을 때 호출된다.
    pub fn broadcast_message(
        &self,
        on_result: ResultFn,
        on_settled: impl FnOnce() + Send + 'static,
    ) {
        let settled = CompletionSignal::new(on_settled);
        let live: Vec<Arc<Connection>> = self
            .connections()
            .into_iter()
            .filter(|connection| connection.is_connected())
            .collect();

        let Some(last) = live.len().checked_sub(1) else {
            settled.fire();
            return;
        };
        tracing::info!(count = live.len(), "Broadcasting message");

        for (position, connection) in live.iter().enumerate() {
            let index = connection.index();
            let ack = self
                .dispatcher
                .send(connection, ActionKind::Comment, BROADCAST_MESSAGE, None);
            let on_result = on_result.clone();
            let settled = settled.clone();

            tokio::spawn(async move {
                let result = ack.await;
                let succeeded = result.is_ok();
                on_result(index, result);
                if succeeded && position == last {
                    settled.fire();
                }
            });
        }
    }

    /// 모든 커넥션에서 선물 전송
    ///
    /// 각 커넥션은 호출 전에 busy 가 되고, 성공/실패와 무관하게 정산 후 해제된다.
    pub fn broadcast_gift(self: &Arc<Self>, on_result: GiftResultFn) {
        let connections = self.connections();
        tracing::info!(count = connections.len(), "Broadcasting gift");

        for connection in connections {
            connection.set_busy(true);
            let this = self.clone();
            let on_result = on_result.clone();

            tokio::spawn(async move {
                let result = this.send_gift(&connection).await;
                connection.set_busy(false);
                on_result(connection.index(), result);
            });
        }
    }

    /// 선물 구매 요청 후 고정 대기
    ///
    /// 호출마다 새 구매 시도이며 중복 방지는 busy 플래그를 쓰는 호출자 몫이다.
    pub async fn send_gift(&self, connection: &Connection) -> Result<(), BackendError> {
        let request = GiftPurchase::for_session(&self.session, &self.settings.gift_id);
        let result = self.backend.send_gift(&request).await;

        match &result {
            Ok(()) => tracing::debug!(index = connection.index(), gift_id = %request.gift_id, "Gift sent"),
            Err(error) => tracing::warn!(index = connection.index(), error = %error, "Gift send failed"),
        }

        tokio::time::sleep(self.settings.gift_settle).await;
        result
    }

    /// 단일 커넥션 댓글 전송
    pub async fn send_message(&self, index: usize) -> Result<String, PoolError> {
        let connection = self
            .connection(index)
            .ok_or(PoolError::UnknownConnection(index))?;
        let text = self
            .dispatcher
            .send(&connection, ActionKind::Comment, BROADCAST_MESSAGE, None)
            .await?;
        Ok(text)
    }

    /// 단일 커넥션 선물 전송. 진행 중인 선물이 있으면 `PoolError::Busy`
    pub async fn send_gift_at(&self, index: usize) -> Result<(), PoolError> {
        let connection = self
            .connection(index)
            .ok_or(PoolError::UnknownConnection(index))?;
        if !connection.try_begin_busy() {
            return Err(PoolError::Busy(index));
        }

        let result = self.send_gift(&connection).await;
        connection.set_busy(false);
        Ok(result?)
    }

    /// 모든 전송 세션 종료 요청
    pub fn close_all(&self) {
        for connection in self.read_connections().iter() {
            if let Some(handle) = connection.handle() {
                handle.close();
            }
        }
    }
}
