//! 액션 디스패처: 봉투를 만들어 커넥션으로 emit 하고 ack 를 결과로 돌려준다

use super::connection::Connection;
use crate::error::{DispatchError, TransportError};
use crate::protocol::envelope::{self, ActionEnvelope, ActionKind, MessageBody, UserInfo};
use crate::session::{self, SessionContext};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;

/// feathers 서비스 호출 이벤트/리소스
pub const EMIT_EVENT: &str = "create";
pub const EMIT_RESOURCE: &str = "livestreams";

pub type DispatchFuture = BoxFuture<'static, Result<String, DispatchError>>;

pub struct ActionDispatcher {
    session: Arc<SessionContext>,
    default_room: String,
}

impl ActionDispatcher {
    pub fn new(session: Arc<SessionContext>, default_room: String) -> Self {
        Self {
            session,
            default_room,
        }
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    pub fn envelope(
        &self,
        index: usize,
        connection_id: &str,
        kind: ActionKind,
        payload: &str,
        room: Option<&str>,
    ) -> ActionEnvelope {
        ActionEnvelope {
            action: kind.wire_action().to_string(),
            room: room.unwrap_or(&self.default_room).to_string(),
            user_record_id: self.session.viewer_user_id.clone(),
            user_info: UserInfo {
                avatar: session::avatar_for(index),
                username: self.session.viewer_username.clone(),
            },
            app_id: self.session.application_id.clone(),
            access_token: self.session.viewer_access_token.clone(),
            message: MessageBody {
                text: envelope::result_text(index, connection_id, payload),
                kind: kind.message_type().map(str::to_string),
            },
        }
    }

    /// 커넥션으로 액션 전송
    ///
    /// emit 은 호출 시점에 발행되므로 연속 호출의 발행 순서가 보존된다.
    /// 반환된 future 는 ack 시 결과 텍스트로 완료된다.
    pub fn send(
        &self,
        connection: &Connection,
        kind: ActionKind,
        payload: &str,
        room: Option<&str>,
    ) -> DispatchFuture {
        let index = connection.index();
        let Some((connection_id, handle)) = connection.live_handle() else {
            tracing::warn!(index, action = ?kind, "Dropping send on a connection that is not connected");
            return future::ready(Err(DispatchError::NotConnected { index })).boxed();
        };

        let envelope = self.envelope(index, &connection_id, kind, payload, room);
        let text = envelope.message.text.clone();
        let room = envelope.room.clone();
        let body = match serde_json::to_value(&envelope) {
            Ok(body) => body,
            Err(e) => {
                let error = DispatchError::from(TransportError::Protocol(e.to_string()));
                return future::ready(Err(error)).boxed();
            }
        };

        let ack = handle.emit(EMIT_EVENT, EMIT_RESOURCE, body);
        async move {
            match ack.await {
                Ok(_) => {
                    tracing::debug!(index, connection_id = %connection_id, room = %room, action = ?kind, "Action acknowledged");
                    Ok(text)
                }
                Err(error) => {
                    tracing::warn!(index, connection_id = %connection_id, action = ?kind, error = %error, "Action emit failed");
                    Err(DispatchError::from(error))
                }
            }
        }
        .boxed()
    }
}
