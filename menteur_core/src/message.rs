use crate::card::Card;
use crate::claim::ClaimDescriptor;
use crate::state::{Player, RoundEffect};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---
// 线上格式为 `{"type": "BID", ...}` 这样的内部标签 JSON。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// 设置显示名字
    Login {
        #[serde(default)]
        name: String,
    },
    /// 从大厅开始游戏
    StartGame,
    /// 轮到自己时叫牌
    Bid { claim: ClaimDescriptor },
    /// 轮到自己时质疑上一个叫牌 ("Menteur !")
    Call,
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// 为每个玩家单独生成的状态快照
    StateUpdate(StateUpdate),
    /// 摊牌结果 (质疑或超时)
    Showdown(Showdown),
    /// 游戏结束，之后回到大厅
    GameOver { winner: String },
    /// 只发给出错的玩家，连接保持
    Error { msg: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub round: u32,
    pub effect: Option<RoundEffect>,
    pub is_blind: bool,
    pub is_timer_mode: bool,
    pub is_double_penalty: bool,
    pub current_player_idx: Option<usize>,
    pub last_declarer_idx: Option<usize>,
    pub claim: Option<ClaimDescriptor>,
    pub players: Vec<PublicPlayer>,
    pub my_hand: Vec<Card>,
    pub my_idx: usize,
    pub log: Option<String>,
    pub new_round: bool,
}

/// 所有人都能看到的玩家信息
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicPlayer {
    pub name: String,
    pub card_count: usize,
    pub eliminated: bool,
    pub quota: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Showdown {
    pub title: String,
    pub is_truth: bool,
    pub detail: String,
    /// 摊开的全部牌；超时判罚时为空
    pub all_cards: Vec<Card>,
    pub stats: Vec<String>,
}

impl From<&Player> for PublicPlayer {
    fn from(p: &Player) -> Self {
        PublicPlayer {
            name: p.name.clone(),
            card_count: p.hand.len(),
            eliminated: p.eliminated,
            quota: p.quota,
        }
    }
}
