//! 환경 변수 기반 설정 관리

use std::env;
use std::time::Duration;

/// 부하 테스트 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 제어 API 포트
    pub port: u16,
    /// 제어 API 호스트
    pub host: String,
    pub backend: BackendConfig,
    pub viewer: ViewerConfig,
    pub target: TargetConfig,
    pub pool: PoolConfig,
    pub log_level: String,
}

/// 백엔드 접속 설정
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub app_uuid: String,
    pub api_token: String,
    pub connect_timeout: Duration,
    /// HTTP 요청 전체 타임아웃
    pub request_timeout: Duration,
}

/// 사전 인증된 시청자 정보
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub user_id: String,
    pub username: String,
    pub access_token: String,
}

/// 대상 방송 정보
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub stream_id: String,
    pub streamer_id: String,
}

/// 커넥션 풀 / 선물 설정
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    /// 제어 API 로 요청 가능한 최대 풀 크기
    pub max_size: usize,
    pub auto_connect: bool,
    pub gift_id: String,
    pub gift_settle: Duration,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5600".to_string())
                .parse()
                .unwrap_or(5600),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            backend: BackendConfig {
                base_url: env::var("API_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3030".to_string()),
                app_uuid: env::var("APP_UUID").unwrap_or_default(),
                api_token: env::var("APP_API_TOKEN").unwrap_or_default(),
                connect_timeout: Duration::from_millis(
                    env::var("CONNECT_TIMEOUT_MS")
                        .unwrap_or_else(|_| "10000".to_string())
                        .parse()
                        .unwrap_or(10000),
                ),
                request_timeout: Duration::from_millis(
                    env::var("REQUEST_TIMEOUT_MS")
                        .unwrap_or_else(|_| "10000".to_string())
                        .parse()
                        .unwrap_or(10000),
                ),
            },
            viewer: ViewerConfig {
                user_id: env::var("VIEWER_USER_ID").unwrap_or_default(),
                username: env::var("VIEWER_USERNAME").unwrap_or_default(),
                access_token: env::var("VIEWER_ACCESS_TOKEN").unwrap_or_default(),
            },
            target: TargetConfig {
                stream_id: env::var("STREAM_ID").unwrap_or_default(),
                streamer_id: env::var("STREAMER_ID").unwrap_or_default(),
            },
            pool: PoolConfig {
                size: env::var("POOL_SIZE")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                max_size: env::var("MAX_POOL_SIZE")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
                auto_connect: env::var("AUTO_CONNECT")
                    .map(|v| v == "true")
                    .unwrap_or(false),
                gift_id: env::var("GIFT_ID").unwrap_or_else(|_| "bbb4b836be2".to_string()),
                gift_settle: Duration::from_millis(
                    env::var("GIFT_SETTLE_MS")
                        .unwrap_or_else(|_| "1000".to_string())
                        .parse()
                        .unwrap_or(1000),
                ),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
