//! 채널 이름 규칙 (백엔드와 바이트 단위로 일치해야 함)
//!
//! 풀은 `chat_room` / `comment` 만 구독한다. 선물/구매 채널은 구독하지 않지만
//! 백엔드 채널 규칙과의 호환을 위해 함께 둔다.

/// 채팅 방 이름
pub fn chat_room(streamer_id: &str, application_id: &str) -> String {
    format!("{}_{}", streamer_id, application_id)
}

pub fn comment(room: &str) -> String {
    format!("comment_{}", room)
}

pub fn gift_send(user_id: &str) -> String {
    format!("gift_send_{}", user_id)
}

pub fn gift_receive(user_id: &str) -> String {
    format!("gift_receive_{}", user_id)
}

pub fn buyer(user_id: &str) -> String {
    format!("user_buy_product_{}", user_id)
}

pub fn seller(user_id: &str) -> String {
    format!("user_seller_product_{}", user_id)
}
