//! HTTP 백엔드 협력자 (조회수 증가, 선물 구매)

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::session::SessionContext;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;

/// 선물 구매 시 차감되는 코인 필드
pub const COIN_FIELD_ID: &str = "coin";

/// `POST /livestreams` 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewIncrement {
    pub stream_id: String,
    pub app_id: String,
    pub access_token: String,
    pub user_record_id: String,
    #[serde(rename = "Action")]
    pub action: String,
}

impl ViewIncrement {
    pub fn for_session(session: &SessionContext) -> Self {
        Self {
            stream_id: session.stream_id.clone(),
            app_id: session.application_id.clone(),
            access_token: session.viewer_access_token.clone(),
            user_record_id: session.viewer_user_id.clone(),
            action: "IncrementView".to_string(),
        }
    }
}

/// `POST /iaps/send-gift` 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPurchase {
    #[serde(rename = "appid")]
    pub app_id: String,
    pub user_send_id: String,
    pub user_receive_id: String,
    pub coin_field_id: String,
    pub gift_id: String,
    pub access_token: String,
    pub room: String,
}

impl GiftPurchase {
    /// 시청자 → 스트리머 선물
    pub fn for_session(session: &SessionContext, gift_id: &str) -> Self {
        Self {
            app_id: session.application_id.clone(),
            user_send_id: session.viewer_user_id.clone(),
            user_receive_id: session.streamer_id.clone(),
            coin_field_id: COIN_FIELD_ID.to_string(),
            gift_id: gift_id.to_string(),
            access_token: session.viewer_access_token.clone(),
            room: session.streamer_id.clone(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    async fn increment_view(&self, request: &ViewIncrement) -> Result<(), BackendError>;

    async fn send_gift(&self, request: &GiftPurchase) -> Result<(), BackendError>;
}

/// reqwest 기반 구현 (Bearer API 토큰)
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), BackendError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn increment_view(&self, request: &ViewIncrement) -> Result<(), BackendError> {
        self.post("/livestreams", request).await
    }

    async fn send_gift(&self, request: &GiftPurchase) -> Result<(), BackendError> {
        self.post("/iaps/send-gift", request).await
    }
}
