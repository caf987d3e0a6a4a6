mod table;

use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use futures_util::{stream::StreamExt, SinkExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use menteur_core::{ClientMessage, GameConfig, ServerMessage};
use table::{spawn_table, Command, TableHandle};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serveur de Menteur", long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "PORT", default_value_t = 5555)]
    port: u16,

    /// 计时模式下每个玩家的行动时间（毫秒）
    #[arg(long, default_value_t = 10_500)]
    turn_timeout_ms: u64,

    /// 质疑摊牌后到下一局的展示时间（毫秒）
    #[arg(long, default_value_t = 6_000)]
    showdown_delay_ms: u64,

    /// 超时判罚后到下一局的展示时间（毫秒）
    #[arg(long, default_value_t = 4_000)]
    timeout_delay_ms: u64,

    /// 固定随机种子，便于复现牌局
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        GameConfig {
            turn_timeout: Duration::from_millis(self.turn_timeout_ms),
            showdown_delay: Duration::from_millis(self.showdown_delay_ms),
            timeout_delay: Duration::from_millis(self.timeout_delay_ms),
            ..GameConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let table = spawn_table(args.game_config(), rng);

    let app = Router::new()
        .route("/", get(websocket_handler))
        .route("/ws", get(websocket_handler))
        .with_state(table);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {addr}"))?;
    info!("服务器正在监听 {}", addr);
    axum::serve(listener, app).await.context("服务器异常退出")?;

    Ok(())
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(ws: WebSocketUpgrade, State(table): State<TableHandle>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, table))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, table: TableHandle) {
    let (mut sender, mut receiver) = socket.split();
    let id = Uuid::new_v4();

    // 创建一个 MPSC 通道，牌桌通过它把消息交给本连接的写任务
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // 先请求入座，游戏进行中会被拒绝
    let (reply, admitted) = oneshot::channel();
    if table.send(Command::Connect { id, sender: tx.clone(), reply }).is_err() {
        return;
    }
    match admitted.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            if let Ok(payload) = serde_json::to_string(&ServerMessage::Error { msg: e.to_string() }) {
                let _ = sender.send(Message::Text(payload.into())).await;
            }
            let _ = sender.close().await;
            return;
        }
        Err(_) => return,
    }

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    if table.send(Command::Client { id, msg }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                    let _ = tx.send(ServerMessage::Error { msg: "Message invalide".to_string() }).await;
                }
            }
        }
    }

    // 客户端断开连接，执行清理工作
    let _ = table.send(Command::Disconnect { id });
    info!("客户端连接关闭");
}
