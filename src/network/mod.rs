//! Network Layer
//!
//! WebSocket server for real-time multiplayer communication.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, GameStateSnapshot, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{Room, RoomConfig, RoomError, RoomId, RoomManager, RoomState};
