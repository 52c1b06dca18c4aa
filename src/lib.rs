//! 라이브 스트림 채팅/선물 백엔드 부하 테스트용 시청자 스웜
//!
//! 설정된 수만큼의 지속 연결을 순차적으로 열어 하나의 채널에 참여시키고,
//! 댓글/선물/조회수 트래픽을 풀 전체에 팬아웃한다.

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pool;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

pub use config::Config;
pub use pool::{PoolController, PoolEvent, PoolSettings};
pub use session::SessionContext;
pub use state::AppState;
