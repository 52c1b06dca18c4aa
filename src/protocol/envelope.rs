//! 커넥션 단위 액션 봉투 (Join / Comment / Gift / ViewIncrement)

use serde::{Deserialize, Serialize};

/// 액션 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Join,
    Comment,
    Gift,
    ViewIncrement,
}

impl ActionKind {
    /// 와이어 상의 `Action` 값. Join 은 `type: "join"` 인 Comment 로 전송된다.
    pub fn wire_action(self) -> &'static str {
        match self {
            ActionKind::Join | ActionKind::Comment => "Comment",
            ActionKind::Gift => "Gift",
            ActionKind::ViewIncrement => "IncrementView",
        }
    }

    pub fn message_type(self) -> Option<&'static str> {
        match self {
            ActionKind::Join => Some("join"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub avatar: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub text: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// `create livestreams` 로 emit 되는 봉투
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    #[serde(rename = "Action")]
    pub action: String,
    pub room: String,
    pub user_record_id: String,
    pub user_info: UserInfo,
    pub app_id: String,
    pub access_token: String,
    pub message: MessageBody,
}

/// 결과/메시지 텍스트 (`CONNECTION {index} - {id}: {payload}`)
pub fn result_text(index: usize, connection_id: &str, payload: &str) -> String {
    format!("CONNECTION {} - {}: {}", index, connection_id, payload)
}
