//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. All messages
//! are JSON (`serde_json`) — no binary framing. Player identity on the wire
//! is the room-scoped slot `0`/`1`; there is no account/JWT layer.

use serde::{Deserialize, Serialize};

use crate::game::state::{PlayerId, PlayerState};
use crate::game::weapons::{Projectile, WeaponPickup};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set the display name shown in the lobby and match records.
    SetUsername { name: String },
    /// Attach a wallet address to the connection; carried through to
    /// `MatchRecord` for a collaborator to consume, never interpreted here.
    SetWallet { address: String },
    /// Create a new room.
    Create { is_private: bool, mode: String, character: u8 },
    /// Join the first open public room, or create one if none are open.
    Quickplay { mode: String, character: u8 },
    /// Join a specific room by id.
    JoinRoom { id: String, character: u8 },
    /// Join a private room by its join code.
    JoinCode { code: String, character: u8 },
    /// Request the current lobby listing.
    ListRooms,
    /// Per-tick input. `tick` is `None` for "apply immediately"; `Some(t)`
    /// queues the input for tick `t` if `t` is strictly in the future.
    Input {
        tick: Option<u32>,
        buttons: u8,
        aim_x: f64,
        aim_y: f64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current public-room listing, sent in response to `list_rooms`.
    Lobby { rooms: Vec<LobbyRoom> },
    /// Acknowledges room creation/join while waiting for an opponent.
    Waiting { room_id: String, name: String, join_code: Option<String> },
    /// Both players present; the match is about to start.
    Matched {
        player_id: PlayerId,
        seed: u32,
        room_id: String,
        usernames: [String; 2],
        map_index: usize,
        total_rounds: u32,
        mode: String,
        characters: [u8; 2],
    },
    /// Per-tick authoritative snapshot, 60 Hz, no decimation.
    State(GameStateSnapshot),
    /// A round has concluded.
    RoundEnd { round: u32, winner: i32, round_wins: [u32; 2] },
    /// The next round's countdown is starting.
    RoundStart { round: u32, seed: u32, map_index: usize },
    /// The match has concluded outright (best-of-3 decided, or a
    /// disconnect credited the remaining player).
    Ended { winner: i32, scores: [u32; 2], round_wins: [u32; 2], room_id: String, mode: String },
    /// A malformed request, a full/duplicate join, or any other room-state
    /// error. Never fired for simulation-internal conditions.
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyRoom {
    pub room_id: String,
    pub name: String,
    pub mode: String,
}

/// The `state{...}` payload, §4.6: everything a client needs to render and
/// to seed prediction/reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub tick: u32,
    pub players: [PlayerState; 2],
    pub projectiles: Vec<Projectile>,
    pub weapon_pickups: Vec<WeaponPickup>,
    pub scores: [u32; 2],
    pub arena_left: f64,
    pub arena_right: f64,
    pub match_over: bool,
    pub winner: i32,
    pub death_linger_timer: i32,
    pub rng_state: u32,
    pub next_projectile_id: i32,
    /// Buttons actually applied this tick for each player, after the
    /// missing-input rule — not necessarily what either client last sent.
    pub last_buttons: [u8; 2],
}

impl From<&crate::game::state::GameState> for GameStateSnapshot {
    fn from(state: &crate::game::state::GameState) -> Self {
        Self {
            tick: state.tick,
            players: state.players.clone(),
            projectiles: state.projectiles.clone(),
            weapon_pickups: state.weapon_pickups.clone(),
            scores: state.score,
            arena_left: state.arena_left,
            arena_right: state.arena_right,
            match_over: state.match_over,
            winner: state.winner,
            death_linger_timer: state.death_linger_timer,
            rng_state: state.rng_state,
            next_projectile_id: state.next_projectile_id,
            last_buttons: [0, 0],
        }
    }
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_round_trips_through_json() {
        let msg = ClientMessage::Input { tick: Some(42), buttons: 0b0101, aim_x: 1.0, aim_y: -1.0 };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"input\""));
        let back = ClientMessage::from_json(&json).unwrap();
        match back {
            ClientMessage::Input { tick, buttons, aim_x, aim_y } => {
                assert_eq!(tick, Some(42));
                assert_eq!(buttons, 0b0101);
                assert_eq!(aim_x, 1.0);
                assert_eq!(aim_y, -1.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn create_message_round_trips() {
        let msg = ClientMessage::Create { is_private: true, mode: "duel".into(), character: 2 };
        let json = msg.to_json().unwrap();
        let back = ClientMessage::from_json(&json).unwrap();
        match back {
            ClientMessage::Create { is_private, mode, character } => {
                assert!(is_private);
                assert_eq!(mode, "duel");
                assert_eq!(character, 2);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn server_error_round_trips() {
        let msg = ServerMessage::Error { message: "room full".into() };
        let json = msg.to_json().unwrap();
        assert!(json.contains("room full"));
        let back = ServerMessage::from_json(&json).unwrap();
        matches!(back, ServerMessage::Error { .. });
    }
}
