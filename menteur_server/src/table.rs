use std::collections::HashMap;

use menteur_core::{ActionError, Claim, ClientMessage, Event, Game, GameConfig, PlayerId, ServerMessage};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 发给牌桌任务的命令。所有对 `Game` 的修改都经过这里，按到达顺序逐个执行。
#[derive(Debug)]
pub enum Command {
    /// 新连接请求入座，通过 `reply` 告知是否被接受
    Connect {
        id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<Result<(), ActionError>>,
    },
    Client { id: PlayerId, msg: ClientMessage },
    Disconnect { id: PlayerId },
    /// 倒计时到期，由计时任务发回
    TurnExpired { player: PlayerId, turn_seq: u64 },
    /// 摊牌展示结束，由调度任务发回
    NextRound { turn_seq: u64 },
}

pub type TableHandle = mpsc::UnboundedSender<Command>;

/// 唯一的一张牌桌，独占 `Game` 和所有连接
struct Table {
    game: Game,
    // 将 PlayerId 映射到该玩家 WebSocket 写任务的通道
    connections: HashMap<PlayerId, mpsc::Sender<ServerMessage>>,
    countdown: Option<JoinHandle<()>>,
    // 计时任务用它把到期事件送回牌桌
    commands: TableHandle,
    rng: StdRng,
}

/// 启动牌桌任务，返回向它发送命令的句柄
pub fn spawn_table(config: GameConfig, rng: StdRng) -> TableHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let table = Table {
        game: Game::new(config),
        connections: HashMap::new(),
        countdown: None,
        commands: tx.clone(),
        rng,
    };
    tokio::spawn(table.run(rx));
    tx
}

impl Table {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Connect { id, sender, reply } => {
                    let admitted = self.game.add_player(id);
                    match admitted {
                        Ok(()) => {
                            self.connections.insert(id, sender);
                            info!("玩家 {} 加入了牌桌", id);
                        }
                        Err(e) => warn!("拒绝连接 {}: {}", id, e),
                    }
                    let _ = reply.send(admitted);
                }
                Command::Client { id, msg } => self.handle_client_message(id, msg),
                Command::Disconnect { id } => {
                    self.connections.remove(&id);
                    info!("玩家 {} 断开连接", id);
                    let events = self.game.remove_player(id);
                    self.apply(events);
                }
                Command::TurnExpired { player, turn_seq } => {
                    let events = self.game.handle_timeout(player, turn_seq);
                    self.apply(events);
                }
                Command::NextRound { turn_seq } => {
                    let events = self.game.next_round(turn_seq, &mut self.rng);
                    self.apply(events);
                }
            }
        }
    }

    fn handle_client_message(&mut self, id: PlayerId, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::Login { name } => self.game.set_name(id, &name).map(|()| vec![]),
            ClientMessage::StartGame => match self.game.player(id) {
                Some(_) => Ok(self.game.start_game(&mut self.rng)),
                None => Err(ActionError::UnknownPlayer),
            },
            ClientMessage::Bid { claim } => self.game.handle_bid(id, Claim::from(claim)),
            ClientMessage::Call => self.game.handle_call(id),
        };

        match result {
            Ok(events) => self.apply(events),
            Err(e) => {
                // 错误消息只发给当前玩家
                warn!("玩家 {} 的动作被拒绝: {}", id, e);
                self.deliver(id, ServerMessage::Error { msg: e.to_string() });
            }
        }
    }

    /// 按顺序执行状态机产生的副作用
    fn apply(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::Broadcast(msg) => self.broadcast(&msg),
                Event::Snapshot { log, effect, new_round } => {
                    // 快照需要为每个玩家单独生成
                    let updates: Vec<_> = self
                        .game
                        .players
                        .iter()
                        .filter_map(|p| self.game.state_for(p.id, log.clone(), effect, new_round).map(|s| (p.id, s)))
                        .collect();
                    for (id, state) in updates {
                        self.deliver(id, ServerMessage::StateUpdate(state));
                    }
                }
                Event::ArmCountdown { player, turn_seq, after } => {
                    self.cancel_countdown();
                    let commands = self.commands.clone();
                    self.countdown = Some(tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = commands.send(Command::TurnExpired { player, turn_seq });
                    }));
                    debug!("为玩家 {} 启动倒计时 ({:?})", player, after);
                }
                Event::CancelCountdown => self.cancel_countdown(),
                Event::ScheduleNextRound { turn_seq, after } => {
                    let commands = self.commands.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = commands.send(Command::NextRound { turn_seq });
                    });
                }
            }
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    /// 非阻塞地投递给单个连接。
    /// 通道已满或已关闭的连接立即移出牌桌，并按断开连接排队处理。
    fn deliver(&mut self, id: PlayerId, msg: ServerMessage) {
        let Some(conn) = self.connections.get(&id) else {
            return;
        };
        if let Err(e) = conn.try_send(msg) {
            warn!("向玩家 {} 发送消息失败，按断开处理: {}", id, e);
            self.connections.remove(&id);
            let _ = self.commands.send(Command::Disconnect { id });
        }
    }

    /// 向牌桌上所有连接广播消息
    fn broadcast(&mut self, msg: &ServerMessage) {
        let ids: Vec<PlayerId> = self.connections.keys().copied().collect();
        for id in ids {
            self.deliver(id, msg.clone());
        }
    }
}
