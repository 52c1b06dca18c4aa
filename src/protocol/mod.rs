//! 백엔드 와이어 프로토콜 정의

pub mod channels;
pub mod envelope;
pub mod socketio;

pub use envelope::{ActionEnvelope, ActionKind, MessageBody, UserInfo};
pub use socketio::Packet;
