//! 커넥션 레코드: Pending → Connected → Disconnected 상태 머신

use crate::transport::ConnectionHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 커넥션 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// 핸드셰이크 미완료 (id 없음)
    Pending,
    Connected { id: String },
    /// 해제되어도 풀에서 제거되지 않는다
    Disconnected { id: String },
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Pending => "pending",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Disconnected { .. } => "disconnected",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ConnectionState::Pending => None,
            ConnectionState::Connected { id } | ConnectionState::Disconnected { id } => Some(id),
        }
    }
}

/// 관찰용 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub index: usize,
    pub id: Option<String>,
    pub state: &'static str,
    pub connected: bool,
    pub busy: bool,
}

/// 풀에 속한 시뮬레이션 시청자 하나
pub struct Connection {
    index: usize,
    state: RwLock<ConnectionState>,
    handle: RwLock<Option<Arc<dyn ConnectionHandle>>>,
    busy: AtomicBool,
}

impl Connection {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            state: RwLock::new(ConnectionState::Pending),
            handle: RwLock::new(None),
            busy: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ConnectionState {
        read(&self.state).clone()
    }

    pub fn id(&self) -> Option<String> {
        read(&self.state).id().map(str::to_string)
    }

    pub fn is_connected(&self) -> bool {
        matches!(*read(&self.state), ConnectionState::Connected { .. })
    }

    pub(crate) fn attach(&self, handle: Arc<dyn ConnectionHandle>) {
        *write(&self.handle) = Some(handle);
    }

    pub(crate) fn handle(&self) -> Option<Arc<dyn ConnectionHandle>> {
        read(&self.handle).clone()
    }

    /// 연결된 경우에만 (id, handle) 반환
    pub(crate) fn live_handle(&self) -> Option<(String, Arc<dyn ConnectionHandle>)> {
        let state = read(&self.state);
        match &*state {
            ConnectionState::Connected { id } => self.handle().map(|handle| (id.clone(), handle)),
            _ => None,
        }
    }

    /// Connected 로 전이. 이미 같은 id 로 연결되어 있으면 false
    pub fn mark_connected(&self, id: String) -> bool {
        let mut state = write(&self.state);
        if matches!(&*state, ConnectionState::Connected { id: current } if *current == id) {
            return false;
        }
        *state = ConnectionState::Connected { id };
        true
    }

    /// Disconnected 로 전이. 연결된 적이 없거나 이미 해제된 경우 상태는 그대로 둔다
    pub fn mark_disconnected(&self) -> bool {
        let mut state = write(&self.state);
        let id = match &*state {
            ConnectionState::Connected { id } => id.clone(),
            _ => return false,
        };
        *state = ConnectionState::Disconnected { id };
        true
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// idle → busy 전이에 성공하면 true
    pub fn try_begin_busy(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.state();
        ConnectionSnapshot {
            index: self.index,
            id: state.id().map(str::to_string),
            state: state.label(),
            connected: matches!(state, ConnectionState::Connected { .. }),
            busy: self.is_busy(),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
