//! Room: Match Lifecycle and Tick Loop
//!
//! A `Room` owns one match end to end: the socket pair, the live
//! `GameState`, per-player input queues, round/transcript bookkeeping, and
//! the self-correcting wall-clock tick loop. One `tokio::spawn`ed task per
//! room; no shared mutable state between rooms, no locking inside one.
//! Grounded on the teacher's `MatchSession`/`SessionManager` shape in this
//! same file, generalized from the teacher's rune/shrine match model to this
//! spec's best-of-3 round structure and wall-clock catch-up tick loop.

use std::collections::BTreeMap;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::rng::{derive_match_seed, shuffle};
use crate::game::input::{button, InputBuffer, PlayerInput};
use crate::game::map::{map_pool, GameMap};
use crate::game::state::{GameState, MatchConfig, PlayerId, PLAYER_ONE, PLAYER_ZERO};
use crate::game::tick::{step_mut, GameEvent, TickResult};
use crate::network::protocol::{GameStateSnapshot, ServerMessage};

pub type RoomId = Uuid;

pub const COUNTDOWN_TICKS: u32 = 90;
pub const ROUND_LINGER_TICKS: u32 = 60;
pub const WINS_NEEDED: u32 = 2;
pub const CATCH_UP_CAP: u32 = 4;
pub const INPUT_QUEUE_WINDOW: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Waiting for a second player.
    Waiting,
    /// Both players present, counting down to the first round.
    Countdown,
    /// A round is in progress (including its death-linger tail).
    Playing,
    /// Round over, holding the frozen final state for the linger tail
    /// before the next round (or the match) starts.
    RoundLinger,
    /// Best-of-3 decided, or a disconnect credited the match.
    Ended,
    /// Torn down; no further ticks run.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected { since_tick: u32 },
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room is full")]
    Full,
    #[error("player already joined this room")]
    DuplicateJoin,
    #[error("cannot join: room state is not accepting players")]
    NotJoinable,
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub mode: String,
    pub is_private: bool,
    pub tick_rate: u32,
    pub initial_lives: i32,
    pub match_duration_ticks: u32,
    pub sudden_death_start_tick: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            mode: "duel".to_string(),
            is_private: false,
            tick_rate: 60,
            initial_lives: 1,
            match_duration_ticks: 1800,
            sudden_death_start_tick: 1200,
        }
    }
}

/// One joined player's room-scoped bookkeeping. Room-level identity is a
/// `Uuid` (reconnect/matchmaking needs it); simulation identity is the
/// `PlayerId` slot `0`/`1`.
pub struct RoomPlayer {
    pub session_id: Uuid,
    pub id: PlayerId,
    pub username: String,
    pub character: u8,
    pub connection_state: ConnectionState,
    pub raw_input: PlayerInput,
    pub acc_input: PlayerInput,
    pub input_queue: BTreeMap<u32, PlayerInput>,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Per-round transcript: the exact `(input0, input1)` pair applied on every
/// tick of that round, Taunt bit already zeroed.
pub type RoundTranscript = Vec<[PlayerInput; 2]>;

#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub seed: u32,
    pub map_index: usize,
    pub transcript: RoundTranscript,
}

/// Everything a post-match collaborator (ELO, settlement, zk proof) needs.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub room_id: RoomId,
    pub usernames: [String; 2],
    pub wallet_addresses: [Option<String>; 2],
    pub round_wins: [u32; 2],
    pub scores: [u32; 2],
    pub final_winner: i32,
    pub mode: String,
    pub rounds: Vec<RoundRecord>,
}

/// One match from creation to `Ended`.
pub struct Room {
    pub id: RoomId,
    pub state: RoomState,
    pub config: RoomConfig,
    pub map: GameMap,
    map_pool: Vec<GameMap>,
    /// Fisher-Yates-shuffled indices into `map_pool`; `map_order[map_cursor]`
    /// is the map the current (or about-to-start) round is playing on.
    map_order: Vec<usize>,
    map_cursor: usize,
    pub players: [Option<RoomPlayer>; 2],
    pub wallet_addresses: [Option<String>; 2],
    pub game_state: GameState,
    pub match_config: MatchConfig,
    pub round: u32,
    pub round_wins: [u32; 2],
    pub countdown_remaining: u32,
    pub linger_remaining: u32,
    pub rounds: Vec<RoundRecord>,
    current_transcript: RoundTranscript,
    loop_start: Option<Instant>,
    event_tx: broadcast::Sender<GameEvent>,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        let pool = map_pool();
        let mut order: Vec<usize> = (0..pool.len()).collect();
        shuffle(derive_match_seed(id.as_bytes(), &[]), &mut order);
        let map = pool[order[0]].clone();

        let match_config = MatchConfig {
            seed: 0,
            map: map.clone(),
            tick_rate: config.tick_rate,
            initial_lives: config.initial_lives,
            match_duration_ticks: config.match_duration_ticks,
            sudden_death_start_tick: config.sudden_death_start_tick,
        };
        let game_state = GameState::new(&match_config);
        let (event_tx, _) = broadcast::channel(256);

        Self {
            id,
            state: RoomState::Waiting,
            config,
            map,
            map_pool: pool,
            map_order: order,
            map_cursor: 0,
            players: [None, None],
            wallet_addresses: [None, None],
            game_state,
            match_config,
            round: 0,
            round_wins: [0, 0],
            countdown_remaining: COUNTDOWN_TICKS,
            linger_remaining: 0,
            rounds: Vec::new(),
            current_transcript: Vec::new(),
            loop_start: None,
            event_tx,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.event_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_some()).count()
    }

    /// Index into `map::map_pool()` of the round currently playing (or
    /// about to start), per the shuffled `map_order`.
    fn current_map_index(&self) -> usize {
        self.map_order[self.map_cursor]
    }

    #[instrument(skip(self, sender), fields(room_id = %self.id))]
    pub fn add_player(
        &mut self,
        username: String,
        character: u8,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<PlayerId, RoomError> {
        if !matches!(self.state, RoomState::Waiting) {
            return Err(RoomError::NotJoinable);
        }

        let slot = if self.players[0].is_none() {
            PLAYER_ZERO
        } else if self.players[1].is_none() {
            PLAYER_ONE
        } else {
            return Err(RoomError::Full);
        };

        self.players[slot as usize] = Some(RoomPlayer {
            session_id: Uuid::new_v4(),
            id: slot,
            username,
            character,
            connection_state: ConnectionState::Connected,
            raw_input: PlayerInput::NULL,
            acc_input: PlayerInput::NULL,
            input_queue: BTreeMap::new(),
            sender,
        });

        if self.player_count() == 2 {
            info!("room filled, starting countdown");
            self.state = RoomState::Countdown;
            self.countdown_remaining = COUNTDOWN_TICKS;
            self.start_round();
            self.send_matched();
        }

        Ok(slot)
    }

    /// Each player gets its own `Matched` message — same payload except
    /// `player_id`, which tells the client which simulation slot is theirs.
    fn send_matched(&self) {
        let usernames = std::array::from_fn(|id| self.players[id].as_ref().map(|p| p.username.clone()).unwrap_or_default());
        let characters = std::array::from_fn(|id| self.players[id].as_ref().map(|p| p.character).unwrap_or(0));
        for (id, player) in self.players.iter().enumerate() {
            let Some(player) = player else { continue };
            let message = ServerMessage::Matched {
                player_id: id as PlayerId,
                seed: self.match_config.seed,
                room_id: self.id.to_string(),
                usernames: usernames.clone(),
                map_index: self.current_map_index(),
                total_rounds: WINS_NEEDED * 2 - 1,
                mode: self.config.mode.clone(),
                characters,
            };
            let _ = player.sender.send(message);
        }
    }

    pub fn mark_disconnected(&mut self, id: PlayerId) {
        if let Some(p) = self.players[id as usize].as_mut() {
            p.connection_state = ConnectionState::Disconnected { since_tick: self.game_state.tick };
        }
        match self.state {
            RoomState::Waiting => self.state = RoomState::Closed,
            RoomState::Countdown | RoomState::Playing | RoomState::RoundLinger => {
                info!(disconnected = id, "peer disconnected mid-match, crediting remaining player");
                self.round_wins[(1 - id) as usize] = WINS_NEEDED;
                self.state = RoomState::Ended;
            }
            RoomState::Ended | RoomState::Closed => {}
        }
    }

    fn start_round(&mut self) {
        let is_first_round = self.round == 0;
        self.round += 1;

        if !is_first_round {
            self.map_cursor += 1;
            if self.map_cursor >= self.map_order.len() {
                let mut reshuffle_seed = [0u8; 16];
                reshuffle_seed[..4].copy_from_slice(&self.round.to_le_bytes());
                let seed = derive_match_seed(self.id.as_bytes(), &[reshuffle_seed]);
                shuffle(seed, &mut self.map_order);
                self.map_cursor = 0;
            }
            self.map = self.map_pool[self.current_map_index()].clone();
        }
        self.match_config.map = self.map.clone();

        let player_ids: Vec<[u8; 16]> = self.players.iter().flatten().map(|p| *p.session_id.as_bytes()).collect();
        let room_seed = derive_match_seed(self.id.as_bytes(), &player_ids);
        let seed = room_seed ^ self.round;
        self.match_config.seed = seed;
        self.game_state = GameState::new(&self.match_config);
        self.current_transcript = Vec::new();
        self.countdown_remaining = COUNTDOWN_TICKS;
        self.state = RoomState::Countdown;
        self.loop_start = Some(Instant::now());
    }

    /// Queue or immediately apply a player's input, per §4.6 input
    /// ingestion rules.
    pub fn handle_input(&mut self, id: PlayerId, tick: Option<u32>, buttons: u8, aim_x: f64, aim_y: f64) -> Result<(), RoomError> {
        if buttons > button::ALL || !aim_x.is_finite() || !aim_y.is_finite() {
            return Err(RoomError::MalformedInput(format!("buttons={buttons:#x} aim=({aim_x},{aim_y})")));
        }
        let input = PlayerInput { buttons, aim_x, aim_y };
        let current_tick = self.game_state.tick;

        let Some(player) = self.players[id as usize].as_mut() else {
            return Err(RoomError::MalformedInput("no such player".to_string()));
        };

        match tick {
            Some(t) if t > current_tick && t - current_tick <= INPUT_QUEUE_WINDOW && player.input_queue.len() < InputBuffer::CAPACITY => {
                player.input_queue.insert(t, input);
            }
            _ => {
                player.raw_input = input;
                player.acc_input = input;
            }
        }
        Ok(())
    }

    /// The wall-clock self-correcting tick loop's single fire: run up to
    /// `CATCH_UP_CAP` ticks to catch the simulation up to the current
    /// target tick, then return a snapshot to broadcast (if any tick ran).
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn on_timer_fire(&mut self) -> Option<ServerMessage> {
        match self.state {
            RoomState::Countdown => {
                self.run_countdown_tick();
                Some(self.snapshot_message())
            }
            RoomState::Playing => {
                let target_tick = self.target_tick();
                let mut ran = 0;
                while self.game_state.tick < target_tick && ran < CATCH_UP_CAP {
                    self.run_game_tick();
                    ran += 1;
                    if self.game_state.match_over {
                        break;
                    }
                }
                if ran == 0 {
                    return None;
                }
                if self.game_state.match_over {
                    let winner = self.game_state.winner;
                    self.enter_round_linger();
                    return Some(ServerMessage::RoundEnd { round: self.round, winner, round_wins: self.round_wins });
                }
                Some(self.snapshot_message())
            }
            RoomState::RoundLinger => {
                if self.linger_remaining == 0 {
                    self.finish_round();
                    return Some(self.round_transition_message());
                }
                self.linger_remaining -= 1;
                Some(self.snapshot_message())
            }
            RoomState::Waiting | RoomState::Ended | RoomState::Closed => None,
        }
    }

    fn target_tick(&self) -> u32 {
        let Some(loop_start) = self.loop_start else { return self.game_state.tick };
        let tick_dt_ms = 1000u128 / self.match_config.tick_rate as u128;
        (loop_start.elapsed().as_millis() / tick_dt_ms) as u32
    }

    fn run_countdown_tick(&mut self) {
        if self.countdown_remaining == 0 {
            self.state = RoomState::Playing;
            self.loop_start = Some(Instant::now());
            return;
        }
        self.countdown_remaining -= 1;
        let prev = [PlayerInput::NULL, PlayerInput::NULL];
        step_mut(&mut self.game_state, [Some(PlayerInput::NULL), Some(PlayerInput::NULL)], prev, &self.match_config);
    }

    fn run_game_tick(&mut self) {
        let next_tick = self.game_state.tick + 1;

        let mut inputs: [Option<PlayerInput>; 2] = [None, None];
        let mut prev_inputs = [PlayerInput::NULL; 2];
        for id in 0..2usize {
            let Some(player) = self.players[id].as_mut() else { continue };
            prev_inputs[id] = player.acc_input;
            if let Some(queued) = player.input_queue.get(&next_tick).copied() {
                player.raw_input = queued;
                player.acc_input = queued;
            }
            inputs[id] = Some(player.raw_input);
        }

        let result: TickResult = step_mut(&mut self.game_state, inputs, prev_inputs, &self.match_config);
        for event in result.events {
            let _ = self.event_tx.send(event);
        }

        let recorded: [PlayerInput; 2] = std::array::from_fn(|id| {
            self.players[id].as_ref().map(|p| p.acc_input.with_taunt_masked()).unwrap_or(PlayerInput::NULL)
        });
        self.current_transcript.push(recorded);

        for id in 0..2usize {
            if let Some(player) = self.players[id].as_mut() {
                player.acc_input = player.raw_input;
                let cutoff = next_tick;
                player.input_queue.retain(|&t, _| t > cutoff);
            }
        }
    }

    fn enter_round_linger(&mut self) {
        debug!(winner = self.game_state.winner, "round over, entering linger tail");
        let winner = self.game_state.winner;
        if winner == 0 || winner == 1 {
            self.round_wins[winner as usize] += 1;
        }
        self.state = RoomState::RoundLinger;
        self.linger_remaining = ROUND_LINGER_TICKS;
    }

    fn finish_round(&mut self) {
        self.rounds.push(RoundRecord {
            seed: self.match_config.seed,
            map_index: self.current_map_index(),
            transcript: std::mem::take(&mut self.current_transcript),
        });

        if self.round_wins[0] >= WINS_NEEDED || self.round_wins[1] >= WINS_NEEDED {
            info!(round_wins = ?self.round_wins, "match decided");
            self.state = RoomState::Ended;
        } else {
            self.start_round();
        }
    }

    fn round_transition_message(&self) -> ServerMessage {
        match self.state {
            RoomState::Ended => {
                let winner = if self.round_wins[0] > self.round_wins[1] { 0 } else { 1 };
                ServerMessage::Ended {
                    winner,
                    scores: self.game_state.score,
                    round_wins: self.round_wins,
                    room_id: self.id.to_string(),
                    mode: self.config.mode.clone(),
                }
            }
            _ => ServerMessage::RoundStart { round: self.round, seed: self.match_config.seed, map_index: self.current_map_index() },
        }
    }

    fn snapshot_message(&self) -> ServerMessage {
        let last_buttons: [u8; 2] = std::array::from_fn(|id| {
            self.players[id].as_ref().map(|p| p.acc_input.buttons).unwrap_or(0)
        });
        let mut snapshot = GameStateSnapshot::from(&self.game_state);
        snapshot.last_buttons = last_buttons;
        ServerMessage::State(snapshot)
    }

    pub fn broadcast(&self, message: &ServerMessage) {
        for player in self.players.iter().flatten() {
            if matches!(player.connection_state, ConnectionState::Connected) {
                let _ = player.sender.send(message.clone());
            }
        }
    }

    pub fn into_match_record(self) -> MatchRecord {
        let usernames = std::array::from_fn(|id| self.players[id].as_ref().map(|p| p.username.clone()).unwrap_or_default());
        MatchRecord {
            room_id: self.id,
            usernames,
            wallet_addresses: self.wallet_addresses,
            round_wins: self.round_wins,
            scores: self.game_state.score,
            final_winner: if self.round_wins[0] > self.round_wins[1] { 0 } else { 1 },
            mode: self.config.mode,
            rounds: self.rounds,
        }
    }
}

/// Tracks every live room and the session → room lookup needed to route a
/// reconnecting or disconnecting socket back to the right one.
pub struct RoomManager {
    rooms: BTreeMap<RoomId, Room>,
    player_rooms: BTreeMap<Uuid, RoomId>,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self { rooms: BTreeMap::new(), player_rooms: BTreeMap::new() }
    }

    /// Creates a room unless the server is already at `max_rooms`.
    pub fn create_room(&mut self, config: RoomConfig, max_rooms: usize) -> Option<RoomId> {
        if self.rooms.len() >= max_rooms {
            return None;
        }
        let id = Uuid::new_v4();
        self.rooms.insert(id, Room::new(id, config));
        Some(id)
    }

    pub fn find_open_public_room(&self) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|(_, r)| matches!(r.state, RoomState::Waiting) && !r.config.is_private && r.player_count() < 2)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms_iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    pub fn register_player(&mut self, session_id: Uuid, room_id: RoomId) {
        self.player_rooms.insert(session_id, room_id);
    }

    pub fn room_of(&self, session_id: &Uuid) -> Option<RoomId> {
        self.player_rooms.get(session_id).copied()
    }

    pub fn remove_room(&mut self, id: &RoomId) -> Option<Room> {
        self.rooms.remove(id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop rooms that ended or closed and were never collected.
    pub fn cleanup(&mut self) {
        let stale: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, r)| matches!(r.state, RoomState::Closed))
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            warn!(room_id = %id, "cleaning up closed room");
            self.rooms.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_sender() -> mpsc::UnboundedSender<ServerMessage> {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn second_join_starts_countdown() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        assert_eq!(room.add_player("a".into(), 0, noop_sender()).unwrap(), PLAYER_ZERO);
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.add_player("b".into(), 1, noop_sender()).unwrap(), PLAYER_ONE);
        assert_eq!(room.state, RoomState::Countdown);
    }

    #[test]
    fn third_join_is_rejected() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        room.add_player("a".into(), 0, noop_sender()).unwrap();
        room.add_player("b".into(), 1, noop_sender()).unwrap();
        assert!(matches!(room.add_player("c".into(), 0, noop_sender()), Err(RoomError::NotJoinable)));
    }

    #[test]
    fn countdown_runs_off_then_enters_playing() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        room.add_player("a".into(), 0, noop_sender()).unwrap();
        room.add_player("b".into(), 1, noop_sender()).unwrap();
        for _ in 0..COUNTDOWN_TICKS + 1 {
            room.on_timer_fire();
        }
        assert_eq!(room.state, RoomState::Playing);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        room.add_player("a".into(), 0, noop_sender()).unwrap();
        assert!(room.handle_input(PLAYER_ZERO, None, 0xFF, 0.0, 0.0).is_err());
        assert!(room.handle_input(PLAYER_ZERO, None, button::JUMP, f64::NAN, 0.0).is_err());
    }

    #[test]
    fn successive_rounds_advance_through_the_shuffled_map_order() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        room.add_player("a".into(), 0, noop_sender()).unwrap();
        room.add_player("b".into(), 1, noop_sender()).unwrap();

        let first_map = room.map.clone();
        assert_eq!(room.current_map_index(), room.map_order[0]);

        room.round_wins = [1, 0];
        room.finish_round();
        assert_eq!(room.round, 2);
        assert_eq!(room.current_map_index(), room.map_order[1]);
        assert_ne!(room.map, first_map, "a three-map pool should not repeat the opening map next round");
    }

    #[test]
    fn disconnect_during_play_credits_remaining_player() {
        let mut room = Room::new(Uuid::new_v4(), RoomConfig::default());
        room.add_player("a".into(), 0, noop_sender()).unwrap();
        room.add_player("b".into(), 1, noop_sender()).unwrap();
        room.state = RoomState::Playing;
        room.mark_disconnected(PLAYER_ZERO);
        assert_eq!(room.state, RoomState::Ended);
        assert_eq!(room.round_wins[1], WINS_NEEDED);
    }
}
