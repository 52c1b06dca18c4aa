//! 애플리케이션 상태 관리 (제어 API 가 관찰하는 집계 상태)

use crate::config::Config;
use crate::error::{BackendError, DispatchError};
use crate::pool::{GiftResultFn, PoolController, PoolEvent, ProgressFn, ResultFn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// 보관하는 활동 로그 최대 개수
pub const ACTIVITY_CAPACITY: usize = 500;

/// 전역 애플리케이션 상태
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<PoolController>,
    pub activity: ActivityLog,
    /// 풀 생성 / 메시지 브로드캐스트 진행 중
    loading: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, pool: Arc<PoolController>) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            activity: ActivityLog::new(ACTIVITY_CAPACITY),
            loading: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    fn begin_loading(&self) -> bool {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn progress(self: &Arc<Self>) -> ProgressFn {
        let state = self.clone();
        Arc::new(move |event: PoolEvent| state.activity.push(event.to_string()))
    }

    /// 풀 생성 시작. 이미 로딩 중이면 false
    ///
    /// 로딩은 마지막 커넥션의 Join 이 확인될 때 해제된다.
    pub fn start_pool(self: &Arc<Self>, size: usize) -> bool {
        if !self.begin_loading() {
            return false;
        }

        let progress = self.progress();
        let done = self.clone();
        let state = self.clone();
        tokio::spawn(async move {
            let created = state
                .pool
                .create_pool(size, progress, move || {
                    done.activity.push(format!("pool ready ({} connections)", done.pool.len()));
                    done.loading.store(false, Ordering::SeqCst);
                })
                .await;

            if let Err(error) = created {
                tracing::warn!(size, error = %error, "Pool creation rejected");
                state.activity.push(format!("pool creation failed: {}", error));
                state.loading.store(false, Ordering::SeqCst);
            }
        });
        true
    }

    /// 연결된 모든 커넥션에서 댓글 전송. 이미 로딩 중이면 false
    pub fn broadcast_message(self: &Arc<Self>) -> bool {
        if !self.begin_loading() {
            return false;
        }

        let results = self.clone();
        let on_result: ResultFn = Arc::new(move |index: usize, result: Result<String, DispatchError>| {
            match result {
                Ok(text) => results.activity.push(text),
                Err(error) => results
                    .activity
                    .push(format!("CONNECTION {} send failed: {}", index, error)),
            }
        });
        let done = self.clone();
        self.pool.broadcast_message(on_result, move || {
            done.loading.store(false, Ordering::SeqCst);
        });
        true
    }

    /// 모든 커넥션에서 선물 전송
    pub fn broadcast_gift(self: &Arc<Self>) {
        let results = self.clone();
        let on_result: GiftResultFn = Arc::new(move |index: usize, result: Result<(), BackendError>| {
            match result {
                Ok(()) => results.activity.push(format!("CONNECTION {} gift sent", index)),
                Err(error) => results
                    .activity
                    .push(format!("CONNECTION {} gift failed: {}", index, error)),
            }
        });
        self.pool.broadcast_gift(on_result);
    }
}

/// 최근 진행/결과 메시지 (최신순)
pub struct ActivityLog {
    entries: RwLock<VecDeque<String>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, entry: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry.into());
        entries.truncate(self.capacity);
    }

    pub fn recent(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
