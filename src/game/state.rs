//! Game State Definitions
//!
//! All simulation-facing state types. `GameState` is advanced in place by
//! `game::tick::step_mut`; `clone_for_snapshot` is the only place a full copy
//! is made, right before broadcast.

use serde::{Deserialize, Serialize};

use crate::core::hash::{GameStateHasher, StateHash};
use crate::game::map::GameMap;
use crate::game::weapons::{Projectile, WeaponPickup};

/// Player slot: this is a strictly two-player match, so identity is just 0
/// or 1 rather than a UUID — room-level session identity (matchmaking,
/// reconnect) is a separate `Uuid`, see `network::session`.
pub type PlayerId = u8;

pub const PLAYER_ZERO: PlayerId = 0;
pub const PLAYER_ONE: PlayerId = 1;

/// Bitfield flags on `PlayerState::state_flags`.
pub mod player_state_flag {
    pub const ALIVE: u8 = 1;
    pub const INVINCIBLE: u8 = 2;
}

/// Immutable per-match configuration. Consumed once by the initial-state
/// constructor, never mutated thereafter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchConfig {
    pub seed: u32,
    pub map: GameMap,
    pub tick_rate: u32,
    pub initial_lives: i32,
    pub match_duration_ticks: u32,
    pub sudden_death_start_tick: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            map: crate::game::map::arena(),
            tick_rate: 60,
            initial_lives: 1,
            match_duration_ticks: 1800,
            sudden_death_start_tick: 1200,
        }
    }
}

use crate::game::weapons::WeaponType;

/// State of a single player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub facing: i32,
    pub health: i32,
    pub lives: i32,
    pub shoot_cooldown: i32,
    pub grounded: bool,
    pub state_flags: u8,
    pub respawn_timer: i32,
    pub weapon: Option<WeaponType>,
    pub ammo: i32,
    pub jumps_left: i32,
    pub wall_sliding: bool,
    pub wall_dir: i32,

    // Stomp (SPEC_FULL.md §9: implemented, not a no-op).
    pub stomped_by: Option<PlayerId>,
    pub stomping_on: Option<PlayerId>,
    pub stomp_shake_progress: i32,
    pub stomp_auto_run_dir: i32,
    pub stomp_auto_run_timer: i32,
    pub stomp_cooldown: i32,

    /// Ticks remaining before respawn; `-1` when not pending (alive, or
    /// already respawned). Distinct from `respawn_timer`, which counts down
    /// the post-respawn invincibility window instead.
    pub death_timer: i32,
}

impl PlayerState {
    pub fn new(id: PlayerId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            facing: 1,
            health: 100,
            lives: 1,
            shoot_cooldown: 0,
            grounded: false,
            state_flags: player_state_flag::ALIVE,
            respawn_timer: 0,
            weapon: None,
            ammo: 0,
            jumps_left: 2,
            wall_sliding: false,
            wall_dir: 0,
            stomped_by: None,
            stomping_on: None,
            stomp_shake_progress: 0,
            stomp_auto_run_dir: 0,
            stomp_auto_run_timer: 0,
            stomp_cooldown: 0,
            death_timer: -1,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state_flags & player_state_flag::ALIVE != 0
    }

    #[inline]
    pub fn is_invincible(&self) -> bool {
        self.state_flags & player_state_flag::INVINCIBLE != 0
    }

    #[inline]
    pub fn set_alive(&mut self, alive: bool) {
        if alive {
            self.state_flags |= player_state_flag::ALIVE;
        } else {
            self.state_flags &= !player_state_flag::ALIVE;
        }
    }

    #[inline]
    pub fn set_invincible(&mut self, invincible: bool) {
        if invincible {
            self.state_flags |= player_state_flag::INVINCIBLE;
        } else {
            self.state_flags &= !player_state_flag::INVINCIBLE;
        }
    }

    fn hash_into(&self, hasher: &mut GameStateHasher) {
        hasher.update_u8(self.id);
        hasher.update_f64(self.x);
        hasher.update_f64(self.y);
        hasher.update_f64(self.vx);
        hasher.update_f64(self.vy);
        hasher.update_i32(self.facing);
        hasher.update_i32(self.health);
        hasher.update_i32(self.shoot_cooldown);
        hasher.update_bool(self.grounded);
        hasher.update_u8(self.state_flags);
        hasher.update_i32(self.respawn_timer);
        hasher.update_i32(self.lives);
    }
}

/// Complete tick-aligned snapshot of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    pub tick: u32,
    pub players: [PlayerState; 2],
    pub projectiles: Vec<Projectile>,
    pub weapon_pickups: Vec<WeaponPickup>,
    pub rng_state: u32,
    pub score: [u32; 2],
    pub next_projectile_id: i32,
    pub arena_left: f64,
    pub arena_right: f64,
    pub match_over: bool,
    pub winner: i32,
    pub death_linger_timer: i32,
}

impl GameState {
    /// Construct the initial state for a match from its config.
    pub fn new(config: &MatchConfig) -> Self {
        let spawns = &config.map.spawn_points;
        let p0 = spawns.first().copied().unwrap_or_default();
        let p1 = spawns.get(1).copied().unwrap_or_default();

        Self {
            tick: 0,
            players: [
                {
                    let mut p = PlayerState::new(PLAYER_ZERO, p0.x, p0.y);
                    p.lives = config.initial_lives;
                    p
                },
                {
                    let mut p = PlayerState::new(PLAYER_ONE, p1.x, p1.y);
                    p.lives = config.initial_lives;
                    p
                },
            ],
            projectiles: Vec::new(),
            weapon_pickups: crate::game::weapons::create_initial_pickups(&config.map),
            rng_state: config.seed,
            score: [0, 0],
            next_projectile_id: 0,
            arena_left: 0.0,
            arena_right: config.map.width,
            match_over: false,
            winner: -1,
            death_linger_timer: 0,
        }
    }

    /// Produce the value handed to serialization/broadcast. The live state
    /// stays in place inside the room; only this clone crosses the
    /// network/reconciliation boundary (SPEC_FULL.md §9).
    pub fn clone_for_snapshot(&self) -> Self {
        self.clone()
    }

    fn player(&self, id: PlayerId) -> &PlayerState {
        &self.players[id as usize]
    }

    /// Canonical FNV-1a-32 hash. Feed order is contractual: tick, players by
    /// id, projectiles by id, rng_state, score by key, next_projectile_id,
    /// arena_left, arena_right, match_over, winner.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = GameStateHasher::for_game_state();
        hasher.update_u32(self.tick);

        let mut players: Vec<&PlayerState> = self.players.iter().collect();
        players.sort_by_key(|p| p.id);
        for p in players {
            p.hash_into(&mut hasher);
        }

        let mut projectiles: Vec<&Projectile> = self.projectiles.iter().collect();
        projectiles.sort_by_key(|p| p.id);
        for proj in projectiles {
            hasher.update_i32(proj.id);
            hasher.update_u8(proj.owner_id);
            hasher.update_f64(proj.x);
            hasher.update_f64(proj.y);
            hasher.update_f64(proj.vx);
            hasher.update_f64(proj.vy);
            hasher.update_i32(proj.lifetime);
        }

        hasher.update_u32(self.rng_state);

        for (idx, score) in self.score.iter().enumerate() {
            hasher.update_u8(idx as u8);
            hasher.update_u32(*score);
        }

        hasher.update_i32(self.next_projectile_id);
        hasher.update_f64(self.arena_left);
        hasher.update_f64(self.arena_right);
        hasher.update_bool(self.match_over);
        hasher.update_i32(self.winner);

        hasher.finalize()
    }

    /// `PLAYER_WIDTH` x `PLAYER_HEIGHT` AABB for `id`.
    pub fn player_aabb(&self, id: PlayerId) -> (f64, f64, f64, f64) {
        let p = self.player(id);
        (p.x, p.y, crate::game::weapons::PLAYER_WIDTH, crate::game::weapons::PLAYER_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_matches_spawn_points() {
        let config = MatchConfig::default();
        let state = GameState::new(&config);
        assert_eq!(state.tick, 0);
        assert_eq!(state.players[0].x, 100.0);
        assert_eq!(state.players[0].y, 536.0);
        assert_eq!(state.players[1].x, 700.0);
        assert_eq!(state.players[1].y, 536.0);
        assert!(!state.match_over);
        assert_eq!(state.winner, -1);
    }

    #[test]
    fn hash_is_deterministic_and_order_sensitive() {
        let config = MatchConfig::default();
        let a = GameState::new(&config);
        let b = GameState::new(&config);
        assert_eq!(a.compute_hash(), b.compute_hash());

        let mut c = GameState::new(&config);
        c.tick = 1;
        assert_ne!(a.compute_hash(), c.compute_hash());
    }

    #[test]
    fn hash_is_a_valid_u32() {
        let state = GameState::new(&MatchConfig::default());
        let h = state.compute_hash();
        assert!(h <= u32::MAX);
    }
}
