//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `input`: Input capture, buffering
//! - `state`: Match state, player state, entities
//! - `map`: Static arena geometry
//! - `physics`: Movement, gravity, one-way platform collision
//! - `weapons`: Weapon stats, projectiles, pickups
//! - `tick`: Authoritative simulation step
//! - `prediction`: Client-side rollback and replay

pub mod input;
pub mod map;
pub mod physics;
pub mod prediction;
pub mod state;
pub mod tick;
pub mod weapons;

pub use input::{button, InputBuffer, PlayerInput};
pub use map::{GameMap, Platform};
pub use prediction::{InterpolationBuffer, Predictor, RemoteSnapshot, MAX_REPLAY};
pub use state::{player_state_flag, GameState, MatchConfig, PlayerId, PlayerState, PLAYER_ONE, PLAYER_ZERO};
pub use tick::{step_mut, GameEvent, TickResult};
pub use weapons::{Projectile, WeaponPickup, WeaponStats, WeaponType};
