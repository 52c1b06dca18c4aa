//! 프로세스 전역 세션 컨텍스트 (애플리케이션/시청자 신원, 대상 방송)

use crate::config::Config;
use crate::error::SessionError;
use crate::protocol::channels;

/// 실행 중 변경되지 않는 신원/대상 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub application_id: String,
    pub viewer_user_id: String,
    pub viewer_username: String,
    pub viewer_access_token: String,
    pub backend_address: String,
    pub stream_id: String,
    pub streamer_id: String,
    channel_name: String,
}

impl SessionContext {
    pub fn new(
        application_id: impl Into<String>,
        viewer_user_id: impl Into<String>,
        viewer_username: impl Into<String>,
        viewer_access_token: impl Into<String>,
        backend_address: impl Into<String>,
        stream_id: impl Into<String>,
        streamer_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let context = Self {
            application_id: application_id.into(),
            viewer_user_id: viewer_user_id.into(),
            viewer_username: viewer_username.into(),
            viewer_access_token: viewer_access_token.into(),
            backend_address: backend_address.into(),
            stream_id: stream_id.into(),
            streamer_id: streamer_id.into(),
            channel_name: String::new(),
        };
        context.validated()
    }

    /// 설정에서 세션 생성
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        Self::new(
            &config.backend.app_uuid,
            &config.viewer.user_id,
            &config.viewer.username,
            &config.viewer.access_token,
            &config.backend.base_url,
            &config.target.stream_id,
            &config.target.streamer_id,
        )
    }

    fn validated(mut self) -> Result<Self, SessionError> {
        let required = [
            ("application id", &self.application_id),
            ("viewer user id", &self.viewer_user_id),
            ("viewer access token", &self.viewer_access_token),
            ("backend address", &self.backend_address),
        ];
        if let Some((name, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SessionError::MissingField(name));
        }

        self.channel_name = channels::chat_room(&self.streamer_id, &self.application_id);
        Ok(self)
    }

    /// 채팅 방 이름 (`{streamerId}_{applicationId}`)
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// 커넥션이 구독하는 댓글 채널
    pub fn comment_channel(&self) -> String {
        channels::comment(&self.channel_name)
    }
}

/// 커넥션 인덱스 기반 아바타 URL
pub fn avatar_for(index: usize) -> String {
    format!("https://picsum.photos/id/{}/1000", index * 2)
}

#[cfg(test)]
pub(crate) fn test_session() -> SessionContext {
    SessionContext::new(
        "app-1",
        "u1",
        "viewer",
        "token-1",
        "http://localhost:3030",
        "stream-9",
        "streamer-7",
    )
    .unwrap()
}
