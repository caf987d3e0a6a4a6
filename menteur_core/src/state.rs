use crate::card::Card;
use crate::claim::{Claim, ClaimDescriptor};
use crate::config::GameConfig;
use crate::message::{PublicPlayer, StateUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PlayerId = Uuid;

/// 尚未登录的玩家的默认名字，开局时会被清理出牌桌
pub const GHOST_NAME: &str = "Inconnu";
/// 登录时名字为空的替代名字
pub const DEFAULT_NAME: &str = "Joueur";
/// 无人幸存时的赢家名字
pub const NOBODY: &str = "Personne";

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub config: GameConfig,
    // 按入座顺序排列，也是出牌顺序
    pub players: Vec<Player>,
    pub started: bool,
    // 只有开局后才存在，同一时间只有一局
    pub round: Option<Round>,
    // 整个进程生命周期内单调递增：每次轮到新玩家或新开一局都会加一。
    // 计时器和延迟开局都带着它，对不上就说明已经过期。
    pub turn_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub hand: Vec<Card>,
    pub quota: u32,  // 已输的命数 + 1，同时也是每局发牌数
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub current_claim: Option<Claim>,
    pub current_player: Option<PlayerId>,
    pub last_declarer: Option<PlayerId>,
    pub modifiers: Modifiers,
    pub stage: Stage,
    // 发完牌后剩下的牌，不会发给客户端
    pub deck: Vec<Card>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub blind: bool,
    pub double_penalty: bool,
    pub timer_mode: bool,
}

/// 本局特殊效果标签，随新一局的状态一起下发
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEffect {
    Revolution,
    DoublePenalty,
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 等待当前玩家叫牌或质疑
    Bidding,
    /// 已摊牌或超时，等待下一局开始
    Resolving,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Player {
            id,
            name: GHOST_NAME.to_string(),
            hand: vec![],
            quota: 1,
            eliminated: false,
        }
    }

    /// 扣命，返回是否因此被淘汰
    pub fn lose_lives(&mut self, lives: u32, max_lives: u32) -> bool {
        self.quota += lives;
        if self.quota > max_lives {
            self.eliminated = true;
        }
        self.eliminated
    }

    fn reset(&mut self) {
        self.hand.clear();
        self.quota = 1;
        self.eliminated = false;
    }
}

// --- Game 的查询方法 ---

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Game {
            config,
            players: vec![],
            started: false,
            round: None,
            turn_seq: 0,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// 玩家的座位号，只在对外展示时使用
    pub fn seat_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.eliminated)
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    /// 获取当前行动的玩家ID (如果存在)
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.round.as_ref().and_then(|r| r.current_player)
    }

    /// 按座位顺序找 `id` 之后第一个未被淘汰的玩家（循环）。
    /// 如果只剩 `id` 自己，就返回它自己。
    pub fn next_active_after(&self, id: PlayerId) -> Option<PlayerId> {
        let seat = self.seat_of(id)?;
        let n = self.players.len();
        (1..=n)
            .map(|offset| &self.players[(seat + offset) % n])
            .find(|p| !p.eliminated)
            .map(|p| p.id)
    }

    /// 让出牌指针落在一个合法玩家上：本人未淘汰就是本人，否则顺延；
    /// 找不到本人时从第一个座位开始找。
    pub fn settle_turn(&self, candidate: Option<PlayerId>) -> Option<PlayerId> {
        match candidate.and_then(|id| self.player(id)) {
            Some(p) if !p.eliminated => Some(p.id),
            Some(p) => self.next_active_after(p.id),
            None => self.active_players().next().map(|p| p.id),
        }
    }

    /// 摊牌用的牌池：所有未淘汰玩家的手牌，按座位顺序拼接
    pub fn pool(&self) -> Vec<Card> {
        self.active_players().flat_map(|p| p.hand.iter().copied()).collect()
    }

    pub(crate) fn reset_players(&mut self) {
        self.players.iter_mut().for_each(Player::reset);
    }

    /// 为某个玩家生成状态快照，隐藏其他人的手牌。
    /// 盲牌局中连自己的手牌也不下发。
    pub fn state_for(
        &self,
        recipient: PlayerId,
        log: Option<String>,
        effect: Option<RoundEffect>,
        new_round: bool,
    ) -> Option<StateUpdate> {
        let round = self.round.as_ref()?;
        let my_idx = self.seat_of(recipient)?;
        let me = &self.players[my_idx];
        let modifiers = round.modifiers;

        Some(StateUpdate {
            round: round.number,
            effect,
            is_blind: modifiers.blind,
            is_timer_mode: modifiers.timer_mode,
            is_double_penalty: modifiers.double_penalty,
            current_player_idx: round.current_player.and_then(|id| self.seat_of(id)),
            last_declarer_idx: round.last_declarer.and_then(|id| self.seat_of(id)),
            claim: round.current_claim.as_ref().map(ClaimDescriptor::from),
            players: self.players.iter().map(PublicPlayer::from).collect(),
            my_hand: if modifiers.blind { vec![] } else { me.hand.clone() },
            my_idx,
            log,
            new_round,
        })
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::new(GameConfig::default())
    }
}
