//! # Brawl Match Server
//!
//! Deterministic two-player platform-fighter match engine with a
//! server-authoritative room and client-side prediction, designed for
//! verifiable replay.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BRAWL MATCH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector (plain f64)                     │
//! │  ├── rng.rs      - Mulberry32 PRNG                            │
//! │  └── hash.rs     - FNV-1a-32 state hashing                   │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── input.rs    - Input capture and buffering                │
//! │  ├── state.rs    - Match and player state                    │
//! │  ├── map.rs      - Static arena geometry                     │
//! │  ├── physics.rs  - Movement, gravity, one-way collision       │
//! │  ├── weapons.rs  - Weapon stats, projectiles, pickups         │
//! │  ├── tick.rs     - Authoritative simulation step              │
//! │  └── prediction.rs - Client-side rollback, replay, interp.   │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Room lifecycle and tick loop               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - Plain IEEE-754-64 float arithmetic, no fast-math
//! - `BTreeMap`/sorted iteration, never `HashMap`, anywhere state is hashed
//! - No system time dependencies inside `step_mut`
//! - All randomness from a seeded Mulberry32 generator threaded explicitly
//!   through `GameState::rng_state`
//!
//! Given an identical `(seed, map, transcript)`, the simulation produces an
//! **identical final state hash** whether run by the server, a predicting
//! client, or an offline replay.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

pub use core::hash::{GameStateHasher, StateHash};
pub use core::rng;
pub use game::state::{GameState, MatchConfig, PlayerId, PlayerState};
pub use game::tick::step_mut;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz).
pub const TICK_RATE: u32 = 60;

/// Default match duration in ticks (30 seconds at 60 Hz).
pub const MATCH_DURATION_TICKS: u32 = 1800;
