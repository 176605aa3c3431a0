//! Weapons, Projectiles, and Pickups
//!
//! Per-weapon stats are a compile-time table addressed by `WeaponType`.
//! Spawn, pickup, motion, and splash logic all consume and advance the
//! match's shared `rng_state` explicitly — no call in this module ever
//! reaches for a thread-local or system RNG.

use serde::{Deserialize, Serialize};

use crate::core::rng;
use crate::core::vec2::Vec2;
use crate::game::map::GameMap;
use crate::game::state::{player_state_flag, PlayerId, PlayerState};

/// The five weapons in fixed rotation order.
pub const WEAPON_ROTATION: [WeaponType; 5] = [
    WeaponType::Pistol,
    WeaponType::Shotgun,
    WeaponType::Sniper,
    WeaponType::Rocket,
    WeaponType::Smg,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    Pistol,
    Shotgun,
    Sniper,
    Rocket,
    Smg,
}

impl WeaponType {
    fn index(self) -> usize {
        match self {
            WeaponType::Pistol => 0,
            WeaponType::Shotgun => 1,
            WeaponType::Sniper => 2,
            WeaponType::Rocket => 3,
            WeaponType::Smg => 4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WeaponStats {
    pub damage: i32,
    pub speed: f64,
    pub cooldown: i32,
    pub lifetime: i32,
    pub ammo: i32,
    pub pellets: u32,
    pub spread_deg: f64,
    pub splash_radius: f64,
    pub splash_damage: i32,
}

const WEAPON_STATS: [WeaponStats; 5] = [
    // Pistol
    WeaponStats { damage: 20, speed: 8.0, cooldown: 12, lifetime: 90, ammo: 15, pellets: 1, spread_deg: 0.0, splash_radius: 0.0, splash_damage: 0 },
    // Shotgun
    WeaponStats { damage: 12, speed: 7.0, cooldown: 30, lifetime: 45, ammo: 6, pellets: 5, spread_deg: 15.0, splash_radius: 0.0, splash_damage: 0 },
    // Sniper
    WeaponStats { damage: 80, speed: 16.0, cooldown: 60, lifetime: 120, ammo: 3, pellets: 1, spread_deg: 0.0, splash_radius: 0.0, splash_damage: 0 },
    // Rocket
    WeaponStats { damage: 50, speed: 7.0, cooldown: 45, lifetime: 120, ammo: 4, pellets: 1, spread_deg: 0.0, splash_radius: 40.0, splash_damage: 25 },
    // SMG
    WeaponStats { damage: 10, speed: 9.0, cooldown: 5, lifetime: 60, ammo: 40, pellets: 1, spread_deg: 0.0, splash_radius: 0.0, splash_damage: 0 },
];

pub fn weapon_stats(weapon: WeaponType) -> WeaponStats {
    WEAPON_STATS[weapon.index()]
}

pub const PLAYER_WIDTH: f64 = 24.0;
pub const PLAYER_HEIGHT: f64 = 32.0;
pub const PICKUP_RADIUS: f64 = 16.0;
pub const WEAPON_PICKUP_RESPAWN_TICKS: i32 = 300;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    pub id: i32,
    pub owner_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub lifetime: i32,
    pub weapon: WeaponType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaponPickup {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub weapon: WeaponType,
    pub respawn_timer: i32,
}

pub fn create_initial_pickups(map: &GameMap) -> Vec<WeaponPickup> {
    map.weapon_spawn_points
        .iter()
        .enumerate()
        .map(|(i, sp)| WeaponPickup {
            id: i as i32,
            x: sp.x,
            y: sp.y,
            weapon: WEAPON_ROTATION[i % WEAPON_ROTATION.len()],
            respawn_timer: 0,
        })
        .collect()
}

/// Tick pickup respawn timers; rotate to a randomly selected weapon when a
/// timer expires. Consumes one PRNG draw per pickup that respawns this tick.
pub fn tick_pickup_timers(pickups: &mut [WeaponPickup], rng_state: &mut u32) {
    for p in pickups.iter_mut() {
        if p.respawn_timer <= 0 {
            continue;
        }
        p.respawn_timer -= 1;
        if p.respawn_timer <= 0 {
            let (idx, next) = rng::int_range(*rng_state, 0, WEAPON_ROTATION.len() as i32 - 1);
            *rng_state = next;
            p.weapon = WEAPON_ROTATION[idx as usize];
        }
    }
}

fn player_overlaps_pickup(p: &PlayerState, pickup: &WeaponPickup) -> bool {
    pickup.x + PICKUP_RADIUS > p.x
        && pickup.x - PICKUP_RADIUS < p.x + PLAYER_WIDTH
        && pickup.y + PICKUP_RADIUS > p.y
        && pickup.y - PICKUP_RADIUS < p.y + PLAYER_HEIGHT
}

/// Resolve weapon pickups — at most one player equips per pickup per tick.
pub fn resolve_weapon_pickups(players: &mut [PlayerState; 2], pickups: &mut [WeaponPickup]) {
    for pickup in pickups.iter_mut() {
        if pickup.respawn_timer > 0 {
            continue;
        }
        for player in players.iter_mut() {
            if player.state_flags & player_state_flag::ALIVE == 0 {
                continue;
            }
            if player_overlaps_pickup(player, pickup) {
                let stats = weapon_stats(pickup.weapon);
                player.weapon = Some(pickup.weapon);
                player.ammo = stats.ammo;
                player.shoot_cooldown = 0;
                pickup.respawn_timer = WEAPON_PICKUP_RESPAWN_TICKS;
                break;
            }
        }
    }
}

/// Spawn projectiles for a weapon shot. Returns `(projectiles, next_id, rng_state)`.
pub fn create_weapon_projectiles(
    player: &PlayerState,
    aim: Vec2,
    next_projectile_id: i32,
    rng_state: u32,
) -> (Vec<Projectile>, i32, u32) {
    let weapon = match player.weapon {
        Some(w) => w,
        None => return (vec![], next_projectile_id, rng_state),
    };
    let stats = weapon_stats(weapon);

    let fallback = Vec2::new(player.facing as f64, 0.0);
    let dir = aim.normalize_or(0.001, fallback);

    let spawn_x = player.x + PLAYER_WIDTH / 2.0 + dir.x * (PLAYER_WIDTH / 2.0);
    let spawn_y = player.y + PLAYER_HEIGHT / 2.0 + dir.y * (PLAYER_HEIGHT / 2.0);

    let mut projectiles = Vec::with_capacity(stats.pellets as usize);
    let mut id = next_projectile_id;
    let mut rng_state = rng_state;

    for i in 0..stats.pellets {
        let (dx, dy) = if stats.spread_deg > 0.0 && stats.pellets > 1 {
            let spread_rad = stats.spread_deg * std::f64::consts::PI / 180.0;
            let base_angle = dir.y.atan2(dir.x);
            let step_angle = (2.0 * spread_rad) / (stats.pellets as f64 - 1.0);
            let pellet_angle = base_angle - spread_rad + step_angle * i as f64;

            let (jitter_val, next) = rng::next(rng_state);
            rng_state = next;
            let jitter = (jitter_val - 0.5) * spread_rad * 0.2;

            let final_angle = pellet_angle + jitter;
            (final_angle.cos(), final_angle.sin())
        } else {
            (dir.x, dir.y)
        };

        projectiles.push(Projectile {
            id,
            owner_id: player.id,
            x: spawn_x,
            y: spawn_y,
            vx: dx * stats.speed,
            vy: dy * stats.speed,
            lifetime: stats.lifetime,
            weapon,
        });
        id += 1;
    }

    (projectiles, id, rng_state)
}

pub fn is_rocket(proj: &Projectile) -> bool {
    proj.weapon == WeaponType::Rocket
}

/// Apply splash damage from a rocket explosion at `(ex, ey)`.
/// Returns `(killer_id, victim_id)` pairs for any resulting kills.
pub fn apply_splash_damage(
    explosion: Vec2,
    owner_id: PlayerId,
    players: &mut [PlayerState; 2],
) -> Vec<(PlayerId, PlayerId)> {
    let stats = weapon_stats(WeaponType::Rocket);
    let radius = stats.splash_radius;
    let max_dmg = stats.splash_damage;
    let mut kills = Vec::new();

    for player in players.iter_mut() {
        if player.state_flags & player_state_flag::ALIVE == 0 {
            continue;
        }
        if player.state_flags & player_state_flag::INVINCIBLE != 0 {
            continue;
        }
        if player.id == owner_id {
            continue;
        }

        let center = Vec2::new(player.x + PLAYER_WIDTH / 2.0, player.y + PLAYER_HEIGHT / 2.0);
        let dist = center.manhattan_distance(explosion);

        if dist < radius {
            let dmg = (max_dmg as f64 * (1.0 - dist / radius)).round() as i32;
            if dmg > 0 {
                let new_health = player.health - dmg;
                if new_health <= 0 {
                    player.health = 0;
                    player.state_flags &= !player_state_flag::ALIVE;
                    kills.push((owner_id, player.id));
                } else {
                    player.health = new_health;
                }
            }
        }
    }

    kills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerState;

    fn test_player(id: PlayerId, x: f64, y: f64) -> PlayerState {
        PlayerState::new(id, x, y)
    }

    #[test]
    fn initial_pickups_follow_rotation() {
        let map = crate::game::map::arena();
        let pickups = create_initial_pickups(&map);
        assert_eq!(pickups.len(), 4);
        assert_eq!(pickups[0].weapon, WeaponType::Pistol);
        assert_eq!(pickups[1].weapon, WeaponType::Shotgun);
        assert_eq!(pickups[2].weapon, WeaponType::Sniper);
        assert_eq!(pickups[3].weapon, WeaponType::Rocket);
    }

    #[test]
    fn pickup_respawns_with_rotated_weapon() {
        let mut pickups = vec![WeaponPickup { id: 0, x: 100.0, y: 100.0, weapon: WeaponType::Pistol, respawn_timer: 1 }];
        let mut rng_state = 42u32;
        tick_pickup_timers(&mut pickups, &mut rng_state);
        assert_eq!(pickups[0].respawn_timer, 0);
        assert_ne!(rng_state, 42);
    }

    #[test]
    fn player_picks_up_weapon_on_overlap() {
        let mut players = [test_player(0, 100.0, 100.0), test_player(1, 400.0, 400.0)];
        let mut pickups = vec![WeaponPickup { id: 0, x: 112.0, y: 116.0, weapon: WeaponType::Sniper, respawn_timer: 0 }];
        resolve_weapon_pickups(&mut players, &mut pickups);
        assert_eq!(players[0].weapon, Some(WeaponType::Sniper));
        assert_eq!(players[0].ammo, 3);
        assert_eq!(pickups[0].respawn_timer, WEAPON_PICKUP_RESPAWN_TICKS);
    }

    #[test]
    fn unarmed_player_creates_no_projectiles() {
        let p = test_player(0, 100.0, 200.0);
        let (projs, next_id, _) = create_weapon_projectiles(&p, Vec2::new(1.0, 0.0), 0, 42);
        assert!(projs.is_empty());
        assert_eq!(next_id, 0);
    }

    #[test]
    fn shotgun_spawns_five_pellets() {
        let mut p = test_player(0, 100.0, 200.0);
        p.weapon = Some(WeaponType::Shotgun);
        p.ammo = 6;
        let (projs, next_id, _) = create_weapon_projectiles(&p, Vec2::new(1.0, 0.0), 0, 42);
        assert_eq!(projs.len(), 5);
        assert_eq!(next_id, 5);
    }

    #[test]
    fn splash_damages_non_owner_within_radius() {
        let mut players = [test_player(0, 100.0, 200.0), test_player(1, 110.0, 200.0)];
        let explosion = Vec2::new(110.0 + PLAYER_WIDTH / 2.0, 200.0 + PLAYER_HEIGHT / 2.0);
        let kills = apply_splash_damage(explosion, 0, &mut players);
        assert!(players[1].health < 100);
        assert_eq!(players[0].health, 100);
        assert!(kills.is_empty());
    }
}
