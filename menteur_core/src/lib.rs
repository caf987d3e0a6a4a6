//! # Menteur 核心逻辑库
//!
//! 这个 `core` crate 包含了 Menteur（吹牛扑克）的全部规则：
//! 牌型叫牌的比较、牌池验证、牌局状态机以及客户端-服务器通信消息的定义。
//! 它不涉及网络与计时，状态机的每一步都以 [`Event`] 列表的形式返回副作用，
//! 由上层的服务器负责执行。

mod card;
mod claim;
mod config;
mod error;
mod logic;
mod message;
mod pool;
mod state;

pub use card::*;

pub use claim::*;

pub use config::*;

pub use error::*;

pub use logic::*;

pub use message::*;

pub use pool::*;

pub use state::*;
