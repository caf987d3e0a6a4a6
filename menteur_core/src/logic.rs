use crate::card::shuffled_deck;
use crate::claim::Claim;
use crate::config::ModifierOdds;
use crate::error::ActionError;
use crate::message::{ServerMessage, Showdown};
use crate::pool::{claim_stats, verify_claim};
use crate::state::*;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

const BLITZ_LOG: &str = "⏳ BLITZ ! 10 secondes pour jouer !";
const REVOLUTION_LOG: &str = "🌪️ RÉVOLUTION ! Les mains ont tourné !";

/// 状态机每一步产生的副作用，由传输层按顺序执行。
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// 原样发给所有连接
    Broadcast(ServerMessage),
    /// 给每个在座玩家发送单独生成的 `StateUpdate`
    Snapshot {
        log: Option<String>,
        effect: Option<RoundEffect>,
        new_round: bool,
    },
    /// 为当前玩家启动倒计时（替换掉已有的倒计时）
    ArmCountdown {
        player: PlayerId,
        turn_seq: u64,
        after: Duration,
    },
    /// 取消正在进行的倒计时
    CancelCountdown,
    /// 展示结果一段时间后调用 `next_round`
    ScheduleNextRound { turn_seq: u64, after: Duration },
}

impl Event {
    fn log(msg: impl Into<String>) -> Self {
        Event::Snapshot { log: Some(msg.into()), effect: None, new_round: false }
    }
}

// --- 大厅阶段 ---

impl Game {
    /// 新连接入座。游戏进行中不允许加入。
    pub fn add_player(&mut self, id: PlayerId) -> Result<(), ActionError> {
        if self.started {
            return Err(ActionError::GameInProgress);
        }
        self.players.push(Player::new(id));
        Ok(())
    }

    pub fn set_name(&mut self, id: PlayerId, name: &str) -> Result<(), ActionError> {
        let player = self.player_mut(id).ok_or(ActionError::UnknownPlayer)?;
        let name = name.trim();
        player.name = if name.is_empty() { DEFAULT_NAME } else { name }.to_string();
        Ok(())
    }

    /// 大厅 -> 游戏中。已经开始时忽略。
    pub fn start_game<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Event> {
        if self.started {
            return vec![];
        }
        self.started = true;
        info!("游戏开始，共 {} 名玩家", self.players.len());
        self.start_new_round(rng)
    }
}

// --- 核心牌局流程函数 ---

impl Game {
    /// 开始新的一局
    ///
    /// - 清理从未登录的玩家。
    /// - 抽取本局特殊模式（盲牌 / 双倍惩罚 / 计时），以及独立的"革命"效果。
    /// - 洗牌，每个未淘汰的玩家摸 `quota` 张牌。
    /// - 出牌指针落到上一局的输家（或其后第一个未淘汰的玩家）。
    ///
    /// 未淘汰的玩家少于 2 人时直接结束游戏。
    pub fn start_new_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Event> {
        let mut events = vec![Event::CancelCountdown];

        // 1. 清理幽灵玩家
        let before = self.players.len();
        self.players.retain(|p| p.name != GHOST_NAME);
        if self.players.len() != before {
            debug!("清理了 {} 个未登录的连接", before - self.players.len());
        }

        // 2. 特殊模式
        let modifiers = roll_modifiers(&self.config.odds, rng);
        let number = self.round.as_ref().map_or(1, |r| r.number + 1);
        let starter = self.current_player_id();
        self.turn_seq += 1;

        if self.active_count() < 2 {
            events.extend(self.finish_game());
            return events;
        }

        // 3. 发牌
        let mut deck = shuffled_deck(rng);
        for player in self.players.iter_mut().filter(|p| !p.eliminated) {
            player.hand = (0..player.quota).filter_map(|_| deck.pop()).collect();
        }

        // 4. 革命：每个人拿到下一位玩家的整手牌
        let revolution = !modifiers.blind
            && rng.random::<f64>() < self.config.odds.revolution
            && self.players.len() > 1;
        if revolution {
            let mut hands: Vec<_> = self
                .players
                .iter_mut()
                .filter(|p| !p.eliminated)
                .map(|p| std::mem::take(&mut p.hand))
                .collect();
            hands.rotate_left(1);
            for (player, hand) in self.players.iter_mut().filter(|p| !p.eliminated).zip(hands) {
                player.hand = hand;
            }
        }

        let (effect, log) = if revolution {
            (Some(RoundEffect::Revolution), Some(REVOLUTION_LOG))
        } else if modifiers.double_penalty {
            (Some(RoundEffect::DoublePenalty), None)
        } else if modifiers.timer_mode {
            (Some(RoundEffect::Timer), Some(BLITZ_LOG))
        } else {
            (None, None)
        };

        let current = self.settle_turn(starter);
        self.round = Some(Round {
            number,
            current_claim: None,
            current_player: current,
            last_declarer: None,
            modifiers,
            stage: Stage::Bidding,
            deck,
        });
        debug!(round = number, ?modifiers, revolution, "新一局开始");

        events.push(Event::Snapshot { log: log.map(str::to_string), effect, new_round: true });
        if let (true, Some(player)) = (modifiers.timer_mode, current) {
            events.push(self.arm_countdown(player));
        }
        events
    }

    /// 展示延迟结束后由调度器调用；过期的调度直接忽略。
    pub fn next_round<R: Rng + ?Sized>(&mut self, turn_seq: u64, rng: &mut R) -> Vec<Event> {
        let resolving = self.round.as_ref().is_some_and(|r| r.stage == Stage::Resolving);
        if !self.started || !resolving || turn_seq != self.turn_seq {
            debug!(turn_seq, current = self.turn_seq, "忽略过期的开局调度");
            return vec![];
        }
        self.start_new_round(rng)
    }

    /// 处理叫牌
    ///
    /// 只接受当前玩家的叫牌，且必须严格大于桌面上的叫牌。
    /// 接受后出牌权交给下一位未淘汰的玩家；计时模式下为其重新计时。
    pub fn handle_bid(&mut self, id: PlayerId, claim: Claim) -> Result<Vec<Event>, ActionError> {
        let round = self.check_turn(id)?;
        if !claim.is_raise_over(round.current_claim.as_ref()) {
            return Err(ActionError::InsufficientRaise);
        }
        let timer_mode = round.modifiers.timer_mode;

        let next = self.next_active_after(id).unwrap_or(id);
        let name = self.player(id).map(|p| p.name.clone()).unwrap_or_default();
        debug!(%id, %claim, "叫牌被接受");
        let log = format!("{}: {}", name, claim);
        if let Some(round) = self.round.as_mut() {
            round.current_claim = Some(claim);
            round.last_declarer = Some(id);
            round.current_player = Some(next);
        }
        self.turn_seq += 1;

        let mut events = vec![Event::log(log)];
        if timer_mode {
            events.push(self.arm_countdown(next));
        }
        Ok(events)
    }

    /// 处理质疑 ("Menteur !")
    ///
    /// 把所有未淘汰玩家的手牌合成牌池验证当前叫牌：
    /// 叫牌成立则质疑者扣命，否则叫牌者扣命（双倍惩罚模式扣 2）。
    /// 输家开下一局，下一局在展示延迟之后开始。
    pub fn handle_call(&mut self, id: PlayerId) -> Result<Vec<Event>, ActionError> {
        let round = self.check_turn(id)?;
        let (Some(declarer), Some(claim)) = (round.last_declarer, round.current_claim.clone()) else {
            return Err(ActionError::NoDeclarer);
        };
        let damage = if round.modifiers.double_penalty { 2 } else { 1 };

        let all_cards = self.pool();
        let is_truth = verify_claim(&claim, &all_cards);
        let stats = claim_stats(&claim, &all_cards);
        let loser = if is_truth { id } else { declarer };

        let lives = if damage == 1 { "une vie".to_string() } else { format!("{} vies", damage) };
        let detail = self.penalize(loser, damage, |name| format!("{} perd {} !", name, lives));
        info!(claim = %claim, is_truth, %loser, "摊牌");

        self.close_round(self.settle_turn(Some(loser)));
        let title = if is_truth { "VÉRITÉ !" } else { "MENSONGE !" };
        Ok(vec![
            Event::CancelCountdown,
            Event::Broadcast(ServerMessage::Showdown(Showdown {
                title: title.to_string(),
                is_truth,
                detail: detail.clone(),
                all_cards,
                stats,
            })),
            Event::log(detail),
            Event::ScheduleNextRound { turn_seq: self.turn_seq, after: self.config.showdown_delay },
        ])
    }

    /// 倒计时结束。
    ///
    /// 只有在倒计时启动之后出牌权没有变化、且仍是同一个玩家时才判罚，
    /// 否则说明玩家已经行动过或牌局已经变化。
    pub fn handle_timeout(&mut self, player: PlayerId, turn_seq: u64) -> Vec<Event> {
        let on_clock = self.round.as_ref().is_some_and(|r| {
            r.stage == Stage::Bidding && r.modifiers.timer_mode && r.current_player == Some(player)
        });
        if !self.started || !on_clock || turn_seq != self.turn_seq {
            debug!(%player, turn_seq, "忽略过期的倒计时");
            return vec![];
        }

        let detail = self.penalize(player, 1, |name| format!("⏳ {} a été trop lent !", name));
        info!(%player, "行动超时");

        self.close_round(self.next_active_after(player));
        vec![
            Event::Broadcast(ServerMessage::Showdown(Showdown {
                title: "TEMPS ÉCOULÉ !".to_string(),
                is_truth: false,
                detail: detail.clone(),
                all_cards: vec![],
                stats: vec!["Le sablier ne pardonne pas.".to_string()],
            })),
            Event::log(detail),
            Event::ScheduleNextRound { turn_seq: self.turn_seq, after: self.config.timeout_delay },
        ]
    }

    /// 玩家断开连接
    ///
    /// 离开的是当前玩家时，出牌权交给他之后的下一位；
    /// 离开的是上一个叫牌者时，桌面叫牌作废（已无法用一致的牌池验证），
    /// 下一位玩家只能叫牌不能质疑。剩余不足 2 人则游戏结束。
    pub fn remove_player(&mut self, id: PlayerId) -> Vec<Event> {
        let Some(seat) = self.seat_of(id) else {
            return vec![];
        };
        if !self.started {
            self.players.remove(seat);
            return vec![];
        }

        let successor = self.next_active_after(id).filter(|&next| next != id);
        let mut turn_moved = false;
        if let Some(round) = self.round.as_mut() {
            if round.current_player == Some(id) {
                round.current_player = successor;
                // 摊牌后的等待阶段不动 turn_seq，以免作废已调度的下一局
                turn_moved = round.stage == Stage::Bidding;
            }
            if round.last_declarer == Some(id) {
                round.last_declarer = None;
                round.current_claim = None;
            }
        }
        let leaver = self.players.remove(seat);
        info!(player = %leaver.name, "玩家离开了牌局");

        if self.active_count() < 2 {
            let mut events = vec![Event::CancelCountdown];
            events.extend(self.finish_game());
            return events;
        }

        let mut events = vec![Event::log(format!("{} a quitté la partie (Abandon).", leaver.name))];
        if turn_moved {
            self.turn_seq += 1;
            let timer_mode = self.round.as_ref().is_some_and(|r| r.modifiers.timer_mode);
            match successor {
                Some(next) if timer_mode => events.push(self.arm_countdown(next)),
                _ => events.push(Event::CancelCountdown),
            }
        }
        events
    }
}

// --- 辅助逻辑函数 ---

impl Game {
    /// 校验动作发起者：游戏已开始、本局仍在叫牌阶段、轮到该玩家
    fn check_turn(&self, id: PlayerId) -> Result<&Round, ActionError> {
        if self.player(id).is_none() {
            return Err(ActionError::UnknownPlayer);
        }
        let round = match (&self.round, self.started) {
            (Some(round), true) => round,
            _ => return Err(ActionError::NotStarted),
        };
        if round.stage == Stage::Resolving {
            return Err(ActionError::RoundResolving);
        }
        if round.current_player != Some(id) {
            return Err(ActionError::NotYourTurn);
        }
        Ok(round)
    }

    /// 扣命并生成结果描述；被淘汰时追加说明
    fn penalize(&mut self, id: PlayerId, lives: u32, describe: impl FnOnce(&str) -> String) -> String {
        let max_lives = self.config.max_lives;
        let Some(player) = self.player_mut(id) else {
            return String::new();
        };
        let mut detail = describe(&player.name);
        if player.lose_lives(lives, max_lives) {
            detail.push_str(" ÉLIMINÉ !");
            info!(player = %player.name, "玩家被淘汰");
        }
        detail
    }

    /// 本局进入结算阶段，`next` 将开下一局
    fn close_round(&mut self, next: Option<PlayerId>) {
        if let Some(round) = self.round.as_mut() {
            round.current_player = next;
            round.stage = Stage::Resolving;
        }
        self.turn_seq += 1;
    }

    fn arm_countdown(&self, player: PlayerId) -> Event {
        Event::ArmCountdown { player, turn_seq: self.turn_seq, after: self.config.turn_timeout }
    }

    /// 游戏结束，宣布幸存者并回到大厅
    fn finish_game(&mut self) -> Vec<Event> {
        let winner = self.active_players().next().map_or(NOBODY.to_string(), |p| p.name.clone());
        info!(%winner, "游戏结束");
        self.started = false;
        self.round = None;
        self.turn_seq += 1;
        self.reset_players();
        vec![Event::Broadcast(ServerMessage::GameOver { winner })]
    }
}

/// 抽取本局模式。盲牌、双倍惩罚、计时三者共用一次抽取，互斥。
fn roll_modifiers<R: Rng + ?Sized>(odds: &ModifierOdds, rng: &mut R) -> Modifiers {
    let roll = rng.random::<f64>();
    let blind = roll < odds.blind;
    let double_penalty = !blind && roll < odds.blind + odds.double_penalty;
    let timer_mode = !blind && !double_penalty && roll < odds.blind + odds.double_penalty + odds.timer;
    Modifiers { blind, double_penalty, timer_mode }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};
    use crate::claim::{Combination, Combo};
    use crate::config::GameConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    fn config_with(odds: ModifierOdds) -> GameConfig {
        GameConfig { odds, ..GameConfig::default() }
    }

    // 辅助函数：创建已登录的玩家
    fn setup_test_game(n: usize, odds: ModifierOdds) -> (Game, Vec<PlayerId>) {
        let mut game = Game::new(config_with(odds));
        let mut ids = Vec::new();
        for i in 0..n {
            let id = Uuid::new_v4();
            game.add_player(id).unwrap();
            game.set_name(id, &format!("P{}", i)).unwrap();
            ids.push(id);
        }
        (game, ids)
    }

    fn started_game(n: usize) -> (Game, Vec<PlayerId>, StdRng) {
        let (mut game, ids) = setup_test_game(n, ModifierOdds::none());
        let mut rng = StdRng::seed_from_u64(42);
        game.start_game(&mut rng);
        (game, ids, rng)
    }

    fn set_hand(game: &mut Game, id: PlayerId, cards: &[(Rank, Suit)]) {
        game.player_mut(id).unwrap().hand = cards.iter().map(|&c| Card::from(c)).collect();
    }

    fn claim(c: Combination) -> Claim {
        Claim::single(c)
    }

    fn showdown(events: &[Event]) -> &Showdown {
        events
            .iter()
            .find_map(|e| match e {
                Event::Broadcast(ServerMessage::Showdown(s)) => Some(s),
                _ => None,
            })
            .expect("没有摊牌消息")
    }

    fn round(game: &Game) -> &Round {
        game.round.as_ref().unwrap()
    }

    #[test]
    fn test_start_game_deals_quota_cards() {
        let (game, ids, _) = started_game(3);
        assert!(game.started);
        assert_eq!(round(&game).number, 1);
        assert_eq!(round(&game).stage, Stage::Bidding);
        assert!(game.players.iter().all(|p| p.hand.len() == 1));
        assert_eq!(round(&game).deck.len(), 52 - 3);
        assert_eq!(game.current_player_id(), Some(ids[0]));
    }

    #[test]
    fn test_start_game_twice_is_ignored() {
        let (mut game, _, mut rng) = started_game(2);
        assert!(game.start_game(&mut rng).is_empty());
        assert_eq!(round(&game).number, 1);
    }

    #[test]
    fn test_weaker_players_draw_more_cards() {
        let (mut game, ids) = setup_test_game(2, ModifierOdds::none());
        game.player_mut(ids[1]).unwrap().quota = 4;
        game.start_game(&mut StdRng::seed_from_u64(1));
        assert_eq!(game.player(ids[0]).unwrap().hand.len(), 1);
        assert_eq!(game.player(ids[1]).unwrap().hand.len(), 4);
    }

    #[test]
    fn test_ghosts_are_removed_on_start() {
        let (mut game, ids) = setup_test_game(2, ModifierOdds::none());
        game.add_player(Uuid::new_v4()).unwrap();
        game.start_game(&mut StdRng::seed_from_u64(1));
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.players.iter().map(|p| p.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_start_with_single_player_ends_game() {
        let (mut game, _) = setup_test_game(1, ModifierOdds::none());
        let events = game.start_game(&mut StdRng::seed_from_u64(1));
        assert!(events.contains(&Event::Broadcast(ServerMessage::GameOver { winner: "P0".into() })));
        assert!(!game.started);
        assert!(game.round.is_none());
    }

    #[test]
    fn test_join_blocked_while_active() {
        let (mut game, _, _) = started_game(2);
        assert_eq!(game.add_player(Uuid::new_v4()), Err(ActionError::GameInProgress));
    }

    #[test]
    fn test_empty_login_name_falls_back() {
        let (mut game, ids) = setup_test_game(1, ModifierOdds::none());
        game.set_name(ids[0], "   ").unwrap();
        assert_eq!(game.player(ids[0]).unwrap().name, DEFAULT_NAME);
        assert_eq!(game.set_name(Uuid::new_v4(), "x"), Err(ActionError::UnknownPlayer));
    }

    #[test]
    fn test_bid_out_of_turn_is_rejected() {
        let (mut game, ids, _) = started_game(3);
        let result = game.handle_bid(ids[1], claim(Combination::new(Combo::Paire)));
        assert_eq!(result, Err(ActionError::NotYourTurn));
        assert_eq!(round(&game).current_claim, None);
        assert_eq!(game.current_player_id(), Some(ids[0]));
    }

    #[test]
    fn test_bid_before_start_is_rejected() {
        let (mut game, ids) = setup_test_game(2, ModifierOdds::none());
        let result = game.handle_bid(ids[0], claim(Combination::new(Combo::Carte)));
        assert_eq!(result, Err(ActionError::NotStarted));
    }

    #[test]
    fn test_bid_must_strictly_raise() {
        let (mut game, ids, _) = started_game(3);
        let pair_of_kings = claim(Combination::new(Combo::Paire).rank(Rank::King));
        game.handle_bid(ids[0], pair_of_kings.clone()).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[1]));

        assert_eq!(game.handle_bid(ids[1], pair_of_kings), Err(ActionError::InsufficientRaise));
        let lower = claim(Combination::new(Combo::Paire).rank(Rank::Queen));
        assert_eq!(game.handle_bid(ids[1], lower), Err(ActionError::InsufficientRaise));
        // 被拒绝后仍然轮到同一个人
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert_eq!(round(&game).last_declarer, Some(ids[0]));
    }

    #[test]
    fn test_turn_wraps_around() {
        let (mut game, ids, _) = started_game(2);
        game.handle_bid(ids[0], claim(Combination::new(Combo::Carte))).unwrap();
        game.handle_bid(ids[1], claim(Combination::new(Combo::Paire))).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[0]));
    }

    #[test]
    fn test_call_without_claim_is_rejected() {
        let (mut game, ids, _) = started_game(2);
        assert_eq!(game.handle_call(ids[0]), Err(ActionError::NoDeclarer));
    }

    #[test]
    fn test_three_player_lie_scenario() {
        let (mut game, ids, _) = started_game(3);
        set_hand(&mut game, ids[0], &[(Rank::King, Suit::Spade)]);
        set_hand(&mut game, ids[1], &[(Rank::Five, Suit::Heart)]);
        set_hand(&mut game, ids[2], &[(Rank::King, Suit::Club)]);

        game.handle_bid(ids[0], claim(Combination::new(Combo::Paire).rank(Rank::King))).unwrap();
        game.handle_bid(ids[1], claim(Combination::new(Combo::Brelan).rank(Rank::Five))).unwrap();
        let events = game.handle_call(ids[2]).unwrap();

        let result = showdown(&events);
        assert!(!result.is_truth);
        assert_eq!(result.title, "MENSONGE !");
        assert_eq!(result.all_cards.len(), 3);
        assert_eq!(result.detail, "P1 perd une vie !");
        assert_eq!(result.stats, vec!["Il y avait exactement 1 cartes au rang 5 sur la table."]);

        assert_eq!(game.player(ids[1]).unwrap().quota, 2);
        assert_eq!(game.player(ids[2]).unwrap().quota, 1);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert_eq!(round(&game).stage, Stage::Resolving);
        assert!(events.contains(&Event::CancelCountdown));
        assert!(events.contains(&Event::ScheduleNextRound {
            turn_seq: game.turn_seq,
            after: game.config.showdown_delay,
        }));
    }

    #[test]
    fn test_true_claim_costs_the_challenger() {
        let (mut game, ids, _) = started_game(2);
        set_hand(&mut game, ids[0], &[(Rank::Nine, Suit::Spade)]);
        set_hand(&mut game, ids[1], &[(Rank::Nine, Suit::Diamond)]);

        game.handle_bid(ids[0], claim(Combination::new(Combo::Paire))).unwrap();
        let events = game.handle_call(ids[1]).unwrap();
        assert!(showdown(&events).is_truth);
        assert_eq!(showdown(&events).title, "VÉRITÉ !");
        assert_eq!(game.player(ids[1]).unwrap().quota, 2);
        assert_eq!(game.current_player_id(), Some(ids[1]));
    }

    #[test]
    fn test_actions_rejected_while_resolving() {
        let (mut game, ids, _) = started_game(2);
        game.handle_bid(ids[0], claim(Combination::new(Combo::QuinteFlushRoyale))).unwrap();
        game.handle_call(ids[1]).unwrap();
        let loser = game.current_player_id().unwrap();
        assert_eq!(game.handle_call(loser), Err(ActionError::RoundResolving));
        assert_eq!(
            game.handle_bid(loser, claim(Combination::new(Combo::Carte))),
            Err(ActionError::RoundResolving)
        );
    }

    #[test]
    fn test_double_penalty_costs_two_lives() {
        let (mut game, ids, _) = started_game(2);
        game.round.as_mut().unwrap().modifiers.double_penalty = true;
        game.handle_bid(ids[0], claim(Combination::new(Combo::Carre).rank(Rank::Ace))).unwrap();
        let events = game.handle_call(ids[1]).unwrap();
        assert_eq!(game.player(ids[0]).unwrap().quota, 3);
        assert_eq!(showdown(&events).detail, "P0 perd 2 vies !");
    }

    #[test]
    fn test_elimination_skips_player() {
        let (mut game, ids, mut rng) = started_game(3);
        game.player_mut(ids[0]).unwrap().quota = 6;
        game.handle_bid(ids[0], claim(Combination::new(Combo::QuinteFlushRoyale))).unwrap();
        let events = game.handle_call(ids[1]).unwrap();

        let p0 = game.player(ids[0]).unwrap();
        assert_eq!(p0.quota, 7);
        assert!(p0.eliminated);
        assert!(showdown(&events).detail.ends_with("ÉLIMINÉ !"));
        // 被淘汰的输家不能开局，顺延给下一位
        assert_eq!(game.current_player_id(), Some(ids[1]));

        let seq = game.turn_seq;
        game.next_round(seq, &mut rng);
        assert_eq!(round(&game).number, 2);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        game.handle_bid(ids[1], claim(Combination::new(Combo::Carte))).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[2]));
        game.handle_bid(ids[2], claim(Combination::new(Combo::Paire))).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[1]), "被淘汰的玩家不再轮到");
        // 被淘汰玩家的牌不进入牌池
        assert_eq!(game.pool().len(), 2);
    }

    #[test]
    fn test_last_survivor_wins_at_next_round() {
        let (mut game, ids, mut rng) = started_game(2);
        game.player_mut(ids[0]).unwrap().quota = 6;
        game.handle_bid(ids[0], claim(Combination::new(Combo::QuinteFlushRoyale))).unwrap();
        game.handle_call(ids[1]).unwrap();

        let seq = game.turn_seq;
        let events = game.next_round(seq, &mut rng);
        assert!(events.contains(&Event::Broadcast(ServerMessage::GameOver { winner: "P1".into() })));
        assert!(!game.started);
        // 回到大厅，所有人恢复初始状态
        assert!(game.players.iter().all(|p| p.quota == 1 && !p.eliminated && p.hand.is_empty()));
    }

    #[test]
    fn test_stale_next_round_is_ignored() {
        let (mut game, ids, mut rng) = started_game(2);
        game.handle_bid(ids[0], claim(Combination::new(Combo::QuinteFlushRoyale))).unwrap();
        game.handle_call(ids[1]).unwrap();
        let seq = game.turn_seq;
        assert!(game.next_round(seq - 1, &mut rng).is_empty());
        assert!(!game.next_round(seq, &mut rng).is_empty());
        assert_eq!(round(&game).number, 2);
        // 同一个调度不能触发两次
        assert!(game.next_round(seq, &mut rng).is_empty());
        assert_eq!(round(&game).number, 2);
    }

    #[test]
    fn test_declarer_disconnect_clears_claim() {
        let (mut game, ids, _) = started_game(3);
        game.handle_bid(ids[0], claim(Combination::new(Combo::Paire))).unwrap();
        let events = game.remove_player(ids[0]);
        assert!(matches!(&events[0], Event::Snapshot { log: Some(log), .. } if log.contains("P0")));

        assert_eq!(round(&game).current_claim, None);
        assert_eq!(round(&game).last_declarer, None);
        assert_eq!(game.handle_call(ids[1]), Err(ActionError::NoDeclarer));
        // 只能重新叫牌，任何叫牌都可以
        game.handle_bid(ids[1], claim(Combination::new(Combo::Carte))).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[2]));
    }

    #[test]
    fn test_disconnect_before_current_shifts_positions() {
        let (mut game, ids, _) = started_game(4);
        game.handle_bid(ids[0], claim(Combination::new(Combo::Carte))).unwrap();
        game.handle_bid(ids[1], claim(Combination::new(Combo::Paire))).unwrap();
        // ids[2] 行动中，ids[1] 是叫牌者
        game.remove_player(ids[0]);

        assert_eq!(game.current_player_id(), Some(ids[2]));
        let view = game.state_for(ids[3], None, None, false).unwrap();
        assert_eq!(view.current_player_idx, Some(1));
        assert_eq!(view.last_declarer_idx, Some(0));
        assert_eq!(view.my_idx, 2);
        // 叫牌仍然有效，可以质疑
        assert!(game.handle_call(ids[2]).is_ok());
    }

    #[test]
    fn test_current_player_disconnect_passes_turn() {
        let (mut game, ids, _) = started_game(3);
        game.handle_bid(ids[0], claim(Combination::new(Combo::Carte))).unwrap();
        let seq = game.turn_seq;
        game.remove_player(ids[1]);
        assert_eq!(game.current_player_id(), Some(ids[2]));
        assert!(game.turn_seq > seq);
        assert!(game.handle_call(ids[2]).is_ok());
    }

    #[test]
    fn test_loser_disconnect_while_resolving_keeps_schedule() {
        let (mut game, ids, mut rng) = started_game(3);
        game.handle_bid(ids[0], claim(Combination::new(Combo::QuinteFlushRoyale))).unwrap();
        let events = game.handle_call(ids[1]).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[0]));
        let seq = game.turn_seq;
        assert!(events.contains(&Event::ScheduleNextRound { turn_seq: seq, after: game.config.showdown_delay }));

        // 输家在展示期间离开：出牌权顺延，但已调度的下一局仍然有效
        let events = game.remove_player(ids[0]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Snapshot { log: Some(log), .. } if log.contains("P0")));
        assert_eq!(game.turn_seq, seq);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert_eq!(round(&game).stage, Stage::Resolving);

        let events = game.next_round(seq, &mut rng);
        assert!(events.iter().any(|e| matches!(e, Event::Snapshot { new_round: true, .. })));
        assert_eq!(round(&game).number, 2);
        assert_eq!(round(&game).stage, Stage::Bidding);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert_eq!(game.players.len(), 2);
    }

    #[test]
    fn test_disconnect_to_one_player_ends_game() {
        let (mut game, ids, _) = started_game(2);
        let events = game.remove_player(ids[1]);
        assert!(events.contains(&Event::CancelCountdown));
        assert!(events.contains(&Event::Broadcast(ServerMessage::GameOver { winner: "P0".into() })));
        assert!(!game.started);
        assert_eq!(game.players.len(), 1);
    }

    #[test]
    fn test_lobby_disconnect_just_leaves() {
        let (mut game, ids) = setup_test_game(3, ModifierOdds::none());
        assert!(game.remove_player(ids[1]).is_empty());
        assert_eq!(game.players.len(), 2);
        assert!(game.remove_player(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_timer_round_arms_countdown_for_first_player() {
        let odds = ModifierOdds { timer: 1.0, ..ModifierOdds::none() };
        let (mut game, ids) = setup_test_game(2, odds);
        let events = game.start_game(&mut StdRng::seed_from_u64(3));

        assert!(round(&game).modifiers.timer_mode);
        assert!(events.contains(&Event::Snapshot {
            log: Some(BLITZ_LOG.to_string()),
            effect: Some(RoundEffect::Timer),
            new_round: true,
        }));
        assert!(events.contains(&Event::ArmCountdown {
            player: ids[0],
            turn_seq: game.turn_seq,
            after: game.config.turn_timeout,
        }));
    }

    #[test]
    fn test_timeout_penalizes_player_on_clock() {
        let odds = ModifierOdds { timer: 1.0, ..ModifierOdds::none() };
        let (mut game, ids) = setup_test_game(3, odds);
        game.start_game(&mut StdRng::seed_from_u64(3));
        let seq = game.turn_seq;

        // 过期的序号和不在计时中的玩家都不会触发
        assert!(game.handle_timeout(ids[0], seq - 1).is_empty());
        assert!(game.handle_timeout(ids[1], seq).is_empty());

        let events = game.handle_timeout(ids[0], seq);
        let result = showdown(&events);
        assert_eq!(result.title, "TEMPS ÉCOULÉ !");
        assert!(!result.is_truth);
        assert!(result.all_cards.is_empty());
        assert_eq!(result.detail, "⏳ P0 a été trop lent !");
        assert_eq!(game.player(ids[0]).unwrap().quota, 2);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert!(events.contains(&Event::ScheduleNextRound {
            turn_seq: game.turn_seq,
            after: game.config.timeout_delay,
        }));
        // 同一个倒计时不能判罚两次
        assert!(game.handle_timeout(ids[0], seq).is_empty());
    }

    #[test]
    fn test_bid_rearms_countdown_and_voids_old_one() {
        let odds = ModifierOdds { timer: 1.0, ..ModifierOdds::none() };
        let (mut game, ids) = setup_test_game(2, odds);
        game.start_game(&mut StdRng::seed_from_u64(3));
        let first_seq = game.turn_seq;

        let events = game.handle_bid(ids[0], claim(Combination::new(Combo::Carte))).unwrap();
        assert!(events.contains(&Event::ArmCountdown {
            player: ids[1],
            turn_seq: game.turn_seq,
            after: game.config.turn_timeout,
        }));
        assert!(game.handle_timeout(ids[0], first_seq).is_empty());
        assert_eq!(game.player(ids[0]).unwrap().quota, 1);
    }

    #[test]
    fn test_timeout_ignored_outside_timer_mode() {
        let (mut game, ids, _) = started_game(2);
        let seq = game.turn_seq;
        assert!(game.handle_timeout(ids[0], seq).is_empty());
    }

    #[test]
    fn test_blind_round_hides_own_hand() {
        let odds = ModifierOdds { blind: 1.0, revolution: 1.0, ..ModifierOdds::none() };
        let (mut game, ids) = setup_test_game(2, odds);
        let events = game.start_game(&mut StdRng::seed_from_u64(9));
        let view = game.state_for(ids[0], None, None, true).unwrap();
        assert!(view.is_blind);
        assert!(view.my_hand.is_empty());
        assert_eq!(view.players[0].card_count, 1);
        // 盲牌局不会触发革命
        assert!(!events.iter().any(|e| matches!(e, Event::Snapshot { effect: Some(RoundEffect::Revolution), .. })));
    }

    #[test]
    fn test_revolution_rotates_hands() {
        let (mut plain, plain_ids) = setup_test_game(3, ModifierOdds::none());
        plain.start_game(&mut StdRng::seed_from_u64(5));

        let odds = ModifierOdds { revolution: 1.0, ..ModifierOdds::none() };
        let (mut rotated, rotated_ids) = setup_test_game(3, odds);
        let events = rotated.start_game(&mut StdRng::seed_from_u64(5));

        for i in 0..3 {
            let expected = &plain.player(plain_ids[(i + 1) % 3]).unwrap().hand;
            assert_eq!(&rotated.player(rotated_ids[i]).unwrap().hand, expected);
        }
        assert!(events.contains(&Event::Snapshot {
            log: Some(REVOLUTION_LOG.to_string()),
            effect: Some(RoundEffect::Revolution),
            new_round: true,
        }));
    }

    #[test]
    fn test_state_for_shows_own_hand_only() {
        let (mut game, ids, _) = started_game(2);
        game.handle_bid(ids[0], claim(Combination::new(Combo::Paire).rank(Rank::Ten))).unwrap();
        let view = game.state_for(ids[1], Some("log".into()), None, false).unwrap();
        assert_eq!(view.my_idx, 1);
        assert_eq!(view.my_hand, game.player(ids[1]).unwrap().hand);
        assert_eq!(view.players.len(), 2);
        assert_eq!(view.current_player_idx, Some(1));
        assert_eq!(view.last_declarer_idx, Some(0));
        assert_eq!(view.claim.unwrap().rank1, Some(Rank::Ten));
        assert!(game.state_for(Uuid::new_v4(), None, None, false).is_none());
    }

    #[test]
    fn test_roll_modifiers_are_exclusive() {
        let odds = ModifierOdds::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let m = roll_modifiers(&odds, &mut rng);
            let active = [m.blind, m.double_penalty, m.timer_mode].iter().filter(|&&b| b).count();
            assert!(active <= 1);
        }
    }
}
