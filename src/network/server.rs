//! WebSocket Game Server
//!
//! Async WebSocket server: accepts connections, routes lobby/room messages,
//! and drives each `Room`'s tick loop on its own spawned task. Grounded on
//! the teacher's `GameServer`/`handle_connection` shape in this same file —
//! same `tokio`/`tokio-tungstenite` stack, same per-connection task split,
//! generalized from auth+matchmaking to this spec's username/quickplay/room
//! model (no accounts, no JWT).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::network::protocol::{ClientMessage, LobbyRoom, ServerMessage};
use crate::network::session::{RoomConfig, RoomError, RoomId, RoomManager, RoomState};

/// Default for `RATE_LIMIT_PER_SEC`: client messages beyond this rate, per
/// socket, are dropped rather than processed or disconnected for.
pub const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 180;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_ROOMS: usize = 2_000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    pub tick_rate: u32,
    pub max_rooms: usize,
    pub rate_limit_per_sec: u32,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_connections: 10_000,
            tick_rate: 60,
            max_rooms: DEFAULT_MAX_ROOMS,
            rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads `TICK_RATE`, `MAX_ROOMS`, `RATE_LIMIT_PER_SEC` from the
    /// environment, falling back to the documented default for any that are
    /// missing or fail to parse. `PORT` is handled by `main` instead, since a
    /// malformed port should fail startup rather than silently fall back.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            tick_rate: env_or("TICK_RATE", default.tick_rate),
            max_rooms: env_or("MAX_ROOMS", default.max_rooms),
            rate_limit_per_sec: env_or("RATE_LIMIT_PER_SEC", default.rate_limit_per_sec),
            ..default
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Error)]
pub enum GameServerError {
    #[error("failed to bind {addr}: {source}")]
    BindFailed { addr: String, #[source] source: std::io::Error },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection limit reached")]
    ConnectionLimitReached,
    #[error(transparent)]
    Room(#[from] RoomError),
}

struct RateLimiter {
    window_start: std::time::Instant,
    count: u32,
    limit: u32,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self { window_start: std::time::Instant::now(), count: 0, limit }
    }

    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = std::time::Instant::now();
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.limit
    }
}

/// The slice of `ServerConfig` each spawned connection task needs, copied
/// out so the task doesn't have to hold a reference to the server.
#[derive(Debug, Clone, Copy)]
struct ConnConfig {
    tick_rate: u32,
    max_rooms: usize,
    rate_limit_per_sec: u32,
}

struct ClientContext {
    session_id: Uuid,
    username: String,
    room_id: Option<RoomId>,
    player_id: Option<crate::game::state::PlayerId>,
}

pub struct GameServer {
    config: ServerConfig,
    rooms: Arc<Mutex<RoomManager>>,
    connection_count: Arc<AtomicUsize>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, rooms: Arc::new(Mutex::new(RoomManager::new())), connection_count: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.room_count()
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|source| GameServerError::BindFailed { addr: self.config.bind_addr.clone(), source })?;
        info!(addr = %self.config.bind_addr, version = %self.config.version, "game server listening");

        let rooms = self.rooms.clone();
        let connection_count = self.connection_count.clone();
        let max_connections = self.config.max_connections;
        let conn_config = ConnConfig {
            tick_rate: self.config.tick_rate,
            max_rooms: self.config.max_rooms,
            rate_limit_per_sec: self.config.rate_limit_per_sec,
        };

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            if connection_count.load(Ordering::Relaxed) >= max_connections {
                warn!(%peer, "connection limit reached, dropping");
                continue;
            }

            let rooms = rooms.clone();
            let connection_count = connection_count.clone();
            tokio::spawn(async move {
                connection_count.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = handle_connection(stream, peer, rooms, conn_config).await {
                    debug!(%peer, error = %e, "connection closed with error");
                }
                connection_count.fetch_sub(1, Ordering::Relaxed);
            });
        }
    }
}

#[instrument(skip(stream, rooms))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    rooms: Arc<Mutex<RoomManager>>,
    conn_config: ConnConfig,
) -> Result<(), GameServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut ctx = ClientContext { session_id: Uuid::new_v4(), username: format!("player-{peer}"), room_id: None, player_id: None };
    let mut limiter = RateLimiter::new(conn_config.rate_limit_per_sec);

    info!(%peer, session_id = %ctx.session_id, "client connected");

    let forward_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Ok(json) = msg.to_json() {
                if ws_tx.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                debug!(%peer, error = %e, "socket read error");
                break;
            }
        };
        let Message::Text(text) = frame else { continue };

        if !limiter.allow() {
            continue;
        }

        let parsed = match ClientMessage::from_json(&text) {
            Ok(m) => m,
            Err(e) => {
                warn!(%peer, session_id = %ctx.session_id, error = %e, "malformed client frame");
                let _ = out_tx.send(ServerMessage::Error { message: "malformed message".to_string() });
                continue;
            }
        };

        handle_client_message(parsed, &mut ctx, &out_tx, &rooms, conn_config).await;
    }

    if let (Some(room_id), Some(player_id)) = (ctx.room_id, ctx.player_id) {
        let mut rooms = rooms.lock().await;
        if let Some(room) = rooms.get_mut(&room_id) {
            info!(%peer, session_id = %ctx.session_id, %room_id, "client disconnected");
            room.mark_disconnected(player_id);
        }
    }

    forward_task.abort();
    Ok(())
}

async fn handle_client_message(
    msg: ClientMessage,
    ctx: &mut ClientContext,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
    rooms: &Arc<Mutex<RoomManager>>,
    conn_config: ConnConfig,
) {
    let tick_rate = conn_config.tick_rate;
    match msg {
        ClientMessage::SetUsername { name } => {
            ctx.username = name;
        }
        ClientMessage::SetWallet { address } => {
            if let (Some(room_id), Some(player_id)) = (ctx.room_id, ctx.player_id) {
                let mut rooms = rooms.lock().await;
                if let Some(room) = rooms.get_mut(&room_id) {
                    room.wallet_addresses[player_id as usize] = Some(address);
                }
            }
        }
        ClientMessage::ListRooms => {
            let rooms = rooms.lock().await;
            let listing: Vec<LobbyRoom> = rooms
                .rooms_iter()
                .filter(|r| matches!(r.state, RoomState::Waiting) && !r.config.is_private)
                .map(|r| LobbyRoom { room_id: r.id.to_string(), name: format!("room-{}", r.id), mode: r.config.mode.clone() })
                .collect();
            let _ = out_tx.send(ServerMessage::Lobby { rooms: listing });
        }
        ClientMessage::Create { is_private, mode, character } => {
            let config = RoomConfig { mode, is_private, tick_rate, ..RoomConfig::default() };
            join_new_room(ctx, out_tx, rooms, config, character, conn_config).await;
        }
        ClientMessage::Quickplay { mode, character } => {
            let open = { rooms.lock().await.find_open_public_room() };
            match open {
                Some(room_id) => join_existing_room(ctx, out_tx, rooms, room_id, character).await,
                None => {
                    let config = RoomConfig { mode, is_private: false, tick_rate, ..RoomConfig::default() };
                    join_new_room(ctx, out_tx, rooms, config, character, conn_config).await;
                }
            }
        }
        ClientMessage::JoinRoom { id, character } => match Uuid::parse_str(&id) {
            Ok(room_id) => join_existing_room(ctx, out_tx, rooms, room_id, character).await,
            Err(_) => {
                let _ = out_tx.send(ServerMessage::Error { message: "invalid room id".to_string() });
            }
        },
        ClientMessage::JoinCode { code, character } => match Uuid::parse_str(&code) {
            Ok(room_id) => join_existing_room(ctx, out_tx, rooms, room_id, character).await,
            Err(_) => {
                let _ = out_tx.send(ServerMessage::Error { message: "invalid join code".to_string() });
            }
        },
        ClientMessage::Input { tick, buttons, aim_x, aim_y } => {
            let (Some(room_id), Some(player_id)) = (ctx.room_id, ctx.player_id) else {
                let _ = out_tx.send(ServerMessage::Error { message: "not in a room".to_string() });
                return;
            };
            let mut rooms = rooms.lock().await;
            if let Some(room) = rooms.get_mut(&room_id) {
                if let Err(e) = room.handle_input(player_id, tick, buttons, aim_x, aim_y) {
                    let _ = out_tx.send(ServerMessage::Error { message: e.to_string() });
                }
            }
        }
    }
}

async fn join_new_room(
    ctx: &mut ClientContext,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
    rooms: &Arc<Mutex<RoomManager>>,
    config: RoomConfig,
    character: u8,
    conn_config: ConnConfig,
) {
    let room_id = { rooms.lock().await.create_room(config, conn_config.max_rooms) };
    let Some(room_id) = room_id else {
        let _ = out_tx.send(ServerMessage::Error { message: "server has reached its room limit".to_string() });
        return;
    };
    join_existing_room(ctx, out_tx, rooms, room_id, character).await;
    spawn_room_loop(rooms.clone(), room_id, conn_config.tick_rate);
}

async fn join_existing_room(
    ctx: &mut ClientContext,
    out_tx: &mpsc::UnboundedSender<ServerMessage>,
    rooms: &Arc<Mutex<RoomManager>>,
    room_id: RoomId,
    character: u8,
) {
    let mut rooms_guard = rooms.lock().await;
    let Some(room) = rooms_guard.get_mut(&room_id) else {
        let _ = out_tx.send(ServerMessage::Error { message: "room not found".to_string() });
        return;
    };

    match room.add_player(ctx.username.clone(), character, out_tx.clone()) {
        Ok(player_id) => {
            ctx.room_id = Some(room_id);
            ctx.player_id = Some(player_id);
            rooms_guard.register_player(ctx.session_id, room_id);
            // `add_player` already sent `Matched` to both players if this join filled the
            // room; only the still-waiting case needs an explicit ack here.
            if matches!(room.state, RoomState::Waiting) {
                let _ = out_tx.send(ServerMessage::Waiting { room_id: room_id.to_string(), name: ctx.username.clone(), join_code: None });
            }
        }
        Err(e) => {
            let _ = out_tx.send(ServerMessage::Error { message: e.to_string() });
        }
    }
}

/// Spawns the room's own tick-loop task: wakes every `1/tick_rate`, runs as
/// many catch-up ticks as the wall clock warrants (bounded), and broadcasts.
/// Exits once the room reaches `Ended`/`Closed`.
fn spawn_room_loop(rooms: Arc<Mutex<RoomManager>>, room_id: RoomId, tick_rate: u32) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(1000 / tick_rate as u64));
        loop {
            ticker.tick().await;
            let mut guard = rooms.lock().await;
            let Some(room) = guard.get_mut(&room_id) else { break };

            if let Some(message) = room.on_timer_fire() {
                room.broadcast(&message);
            }

            if matches!(room.state, RoomState::Ended | RoomState::Closed) {
                if let Some(room) = guard.remove_room(&room_id) {
                    let record = room.into_match_record();
                    info!(%room_id, round_wins = ?record.round_wins, "room finished, match record ready for collaborators");
                }
                break;
            }
        }
    });
}
