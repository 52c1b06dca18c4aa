//! 커넥션 풀 (수명주기, 액션 디스패치, 팬아웃)

pub mod connection;
pub mod controller;
pub mod dispatcher;

pub use connection::{Connection, ConnectionSnapshot, ConnectionState};
pub use controller::{
    CompletionSignal, GiftResultFn, PoolController, PoolEvent, PoolSettings, ProgressFn, ResultFn,
};
pub use dispatcher::ActionDispatcher;
