//! Authoritative Simulation Step
//!
//! `step_mut` is the single deterministic transition. Sub-step order is
//! contractual (SPEC_FULL.md §4.4) — reordering breaks replay equivalence
//! between the server, a predicting client, and an offline replay. The
//! structural shape (in-place mutation, numbered sub-steps, event
//! collection) is grounded on the teacher's `game/tick.rs` `tick()`.

use serde::{Deserialize, Serialize};

use crate::core::rng;
use crate::core::vec2::Vec2;
use crate::game::input::{button, PlayerInput};
use crate::game::map::GameMap;
use crate::game::physics::{apply_gravity, apply_player_input, move_and_collide};
use crate::game::state::{GameState, MatchConfig, PlayerId, PlayerState};
use crate::game::weapons::{
    apply_splash_damage, create_weapon_projectiles, is_rocket, resolve_weapon_pickups,
    tick_pickup_timers, weapon_stats, PLAYER_HEIGHT, PLAYER_WIDTH,
};

/// Width/height of a projectile's own hitbox, used both for player-hit AABB
/// overlap and for platform-contact removal.
const PROJECTILE_SIZE: f64 = 4.0;

pub const RESPAWN_TICKS: i32 = 60;
pub const INVINCIBLE_TICKS: i32 = 36;
pub const DEATH_LINGER_TICKS: i32 = 30;

// Stomp constants (SPEC_FULL.md §9: stomp is implemented, not a no-op slot).
pub const STOMP_DAMAGE_INTERVAL: i32 = 2;
pub const STOMP_DAMAGE_PER_HIT: i32 = 1;
pub const STOMP_SHAKE_PER_PRESS: i32 = 17;
pub const STOMP_SHAKE_THRESHOLD: i32 = 100;
pub const STOMP_SHAKE_DECAY: i32 = 1;
pub const STOMP_AUTO_RUN_MIN: i32 = 20;
pub const STOMP_AUTO_RUN_MAX: i32 = 60;
pub const STOMP_COOLDOWN_TICKS: i32 = 90;

// Sudden death: the arena walls close in proportionally to how far past
// `sudden_death_start_tick` the match has run; any player caught outside the
// shrunken bounds dies instantly. Grounded on chickenz-core's `step.rs`
// zone-damage model, adapted from damage-over-time to an outright wall
// ejection since this engine has no per-tick zone damage elsewhere.
pub const SUDDEN_DEATH_SPAWN_OFFSET: f64 = 30.0;

/// A notable event produced by a single `step_mut` call, surfaced to the
/// room for broadcasting and logging (not part of the hashed state).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameEvent {
    Kill { killer: PlayerId, victim: PlayerId },
    Respawned { player: PlayerId },
    RoundOver { winner: i32 },
}

#[derive(Default)]
pub struct TickResult {
    pub events: Vec<GameEvent>,
}

#[inline]
fn other(id: PlayerId) -> PlayerId {
    1 - id
}

fn aabb_overlap(ax: f64, ay: f64, aw: f64, ah: f64, bx: f64, by: f64, bw: f64, bh: f64) -> bool {
    ax < bx + bw && ax + aw > bx && ay < by + bh && ay + ah > by
}

/// The deterministic transition: `(prev_state, inputs, prev_inputs, config) -> next_state`,
/// advanced in place. `inputs[i] = None` means no input arrived this tick for
/// player `i` — the missing-input rule substitutes `prev_inputs[i]`.
pub fn step_mut(
    state: &mut GameState,
    inputs: [Option<PlayerInput>; 2],
    prev_inputs: [PlayerInput; 2],
    config: &MatchConfig,
) -> TickResult {
    let mut result = TickResult::default();

    // 1. Terminal states.
    if state.match_over {
        return result;
    }
    if state.death_linger_timer > 0 {
        step_linger(state, inputs, prev_inputs);
        return result;
    }

    // 2. Resolve inputs (missing-input rule).
    let resolved: [PlayerInput; 2] =
        [inputs[0].unwrap_or(prev_inputs[0]), inputs[1].unwrap_or(prev_inputs[1])];

    // 3. Tick timers.
    for p in state.players.iter_mut() {
        p.shoot_cooldown = (p.shoot_cooldown - 1).max(0);
        if p.is_invincible() {
            p.respawn_timer -= 1;
            if p.respawn_timer <= 0 {
                p.set_invincible(false);
                p.respawn_timer = 0;
            }
        }
        p.stomp_cooldown = (p.stomp_cooldown - 1).max(0);
    }

    // 4. Input -> motion (stomp riders/victims get scrubbed input).
    for id in 0..2u8 {
        let scrubbed = scrub_input_for_stomp(&state.players[id as usize], resolved[id as usize]);
        let prev = scrubbed_prev(&state.players[id as usize], prev_inputs[id as usize]);
        apply_player_input(&mut state.players[id as usize], &scrubbed, &prev);
    }

    // 5. Gravity (non-riders).
    for p in state.players.iter_mut() {
        if p.stomping_on.is_none() {
            apply_gravity(p);
        }
    }

    // 6. Collide (non-riders).
    for id in 0..2u8 {
        if state.players[id as usize].stomping_on.is_some() {
            continue;
        }
        let input = resolved[id as usize];
        move_and_collide(&mut state.players[id as usize], &config.map, state.arena_left, state.arena_right, &input);
    }

    // 7. Stomp resolution.
    resolve_stomps(state);

    // 8. Weapon pickups.
    resolve_weapon_pickups(&mut state.players, &mut state.weapon_pickups);

    // 9. Shoot.
    resolve_shooting(state, &resolved);

    // 10. Projectile motion & removal.
    step_projectiles(state, &config.map, &mut result);

    // 11. Player hits.
    resolve_player_hits(state, &mut result);

    // 12. Lives & elimination.
    check_elimination(state, &mut result);

    // 13. Respawn (only if the match is still live).
    if !state.match_over && state.death_linger_timer == 0 {
        step_respawns(state, config, &mut result);
    }

    // 14. Sudden death (may itself eliminate a player; full shrink forces
    // the match to end outright rather than lingering).
    if !state.match_over && state.death_linger_timer == 0 {
        let maxed_out = step_sudden_death(state, config);
        check_elimination(state, &mut result);
        if maxed_out && !state.match_over && state.death_linger_timer == 0 {
            let winner = if state.players[0].lives >= state.players[1].lives { 0 } else { 1 };
            state.match_over = true;
            state.winner = winner;
            result.events.push(GameEvent::RoundOver { winner });
        }
    }

    // 15. Time-up.
    if !state.match_over && state.death_linger_timer == 0 && state.tick >= config.match_duration_ticks {
        end_match_time_up(state, &mut result);
    }

    // 16. Pickup timers / tick advance.
    tick_pickup_timers(&mut state.weapon_pickups, &mut state.rng_state);
    state.tick += 1;

    result
}

/// Death-linger: the losing player is gone, the match isn't officially over
/// yet. Remaining projectiles keep flying and the winner can still move, but
/// no scoring or elimination logic runs. Ends the match once the timer
/// drains to zero.
fn step_linger(state: &mut GameState, inputs: [Option<PlayerInput>; 2], prev_inputs: [PlayerInput; 2]) {
    let resolved: [PlayerInput; 2] =
        [inputs[0].unwrap_or(prev_inputs[0]), inputs[1].unwrap_or(prev_inputs[1])];

    for id in 0..2u8 {
        let p = &mut state.players[id as usize];
        if p.is_alive() {
            apply_player_input(p, &resolved[id as usize], &prev_inputs[id as usize]);
            apply_gravity(p);
        }
    }

    state.projectiles.retain_mut(|proj| {
        proj.x += proj.vx;
        proj.y += proj.vy;
        proj.lifetime -= 1;
        proj.lifetime > 0
    });

    state.death_linger_timer -= 1;
    if state.death_linger_timer <= 0 {
        state.death_linger_timer = 0;
        state.match_over = true;
    }
    state.tick += 1;
}

fn scrub_input_for_stomp(p: &PlayerState, input: PlayerInput) -> PlayerInput {
    if p.stomping_on.is_some() {
        PlayerInput { buttons: input.buttons & button::SHOOT, aim_x: input.aim_x, aim_y: input.aim_y }
    } else if p.stomped_by.is_some() {
        let buttons = match p.stomp_auto_run_dir {
            d if d < 0 => button::LEFT,
            d if d > 0 => button::RIGHT,
            _ => 0,
        };
        PlayerInput { buttons, aim_x: 0.0, aim_y: 0.0 }
    } else {
        input
    }
}

fn scrubbed_prev(p: &PlayerState, prev: PlayerInput) -> PlayerInput {
    if p.stomping_on.is_some() || p.stomped_by.is_some() {
        PlayerInput::NULL
    } else {
        prev
    }
}

/// Detect new stomps and advance active ones: interval damage on the victim,
/// a forced auto-run direction that rerolls on a timer, and a shake meter
/// the victim fills by pressing Left/Right to break free.
fn resolve_stomps(state: &mut GameState) {
    for faller_id in 0..2u8 {
        let victim_id = other(faller_id);
        let (faller_alive, faller_vy, faller_x, faller_y, faller_stomping, faller_stomped) = {
            let f = &state.players[faller_id as usize];
            (f.is_alive(), f.vy, f.x, f.y, f.stomping_on, f.stomped_by)
        };
        if !faller_alive || faller_stomping.is_some() || faller_stomped.is_some() || faller_vy <= 0.0 {
            continue;
        }
        let (victim_alive, victim_cooldown, victim_x, victim_y, victim_stomped) = {
            let v = &state.players[victim_id as usize];
            (v.is_alive(), v.stomp_cooldown, v.x, v.y, v.stomped_by)
        };
        if !victim_alive || victim_cooldown > 0 || victim_stomped.is_some() {
            continue;
        }

        let head_band_top = victim_y;
        let head_band_bottom = victim_y + PLAYER_HEIGHT * 0.4;
        let faller_feet = faller_y + PLAYER_HEIGHT;
        let x_overlap = faller_x + PLAYER_WIDTH > victim_x && faller_x < victim_x + PLAYER_WIDTH;

        if x_overlap && faller_feet >= head_band_top && faller_feet <= head_band_bottom {
            let (dir, next_rng) = rng::int_range(state.rng_state, 0, 1);
            state.rng_state = next_rng;
            let dir = if dir == 0 { -1 } else { 1 };
            let (timer, next_rng) =
                rng::int_range(state.rng_state, STOMP_AUTO_RUN_MIN, STOMP_AUTO_RUN_MAX);
            state.rng_state = next_rng;

            {
                let f = &mut state.players[faller_id as usize];
                f.stomping_on = Some(victim_id);
                f.vx = 0.0;
                f.vy = 0.0;
            }
            {
                let v = &mut state.players[victim_id as usize];
                v.stomped_by = Some(faller_id);
                v.vx = 0.0;
                v.vy = 0.0;
                v.stomp_auto_run_dir = dir;
                v.stomp_auto_run_timer = timer;
                v.stomp_shake_progress = 0;
            }
        }
    }

    let mut broken: Vec<(PlayerId, PlayerId)> = Vec::new();
    let mut victim_died: Vec<(PlayerId, PlayerId)> = Vec::new();

    for rider_id in 0..2u8 {
        let victim_id = match state.players[rider_id as usize].stomping_on {
            Some(v) => v,
            None => continue,
        };

        let (vx, vy) = (state.players[victim_id as usize].x, state.players[victim_id as usize].y);
        {
            let r = &mut state.players[rider_id as usize];
            r.x = vx;
            r.y = vy - PLAYER_HEIGHT;
            r.vx = 0.0;
            r.vy = 0.0;
        }

        if state.tick as i32 % STOMP_DAMAGE_INTERVAL == 0 {
            let v = &mut state.players[victim_id as usize];
            v.health = (v.health - STOMP_DAMAGE_PER_HIT).max(0);
            if v.health == 0 {
                v.set_alive(false);
                victim_died.push((rider_id, victim_id));
                continue;
            }
        }

        {
            let v = &mut state.players[victim_id as usize];
            v.stomp_auto_run_timer -= 1;
        }
        if state.players[victim_id as usize].stomp_auto_run_timer <= 0 {
            let (dir, next_rng) = rng::int_range(state.rng_state, 0, 1);
            state.rng_state = next_rng;
            let dir = if dir == 0 { -1 } else { 1 };
            let (timer, next_rng) =
                rng::int_range(state.rng_state, STOMP_AUTO_RUN_MIN, STOMP_AUTO_RUN_MAX);
            state.rng_state = next_rng;
            let v = &mut state.players[victim_id as usize];
            v.stomp_auto_run_dir = dir;
            v.stomp_auto_run_timer = timer;
        }

        let v = &mut state.players[victim_id as usize];
        v.stomp_shake_progress = (v.stomp_shake_progress - STOMP_SHAKE_DECAY).max(0);
        if v.stomp_shake_progress + STOMP_SHAKE_PER_PRESS >= STOMP_SHAKE_THRESHOLD {
            broken.push((rider_id, victim_id));
        }
    }

    for (rider_id, victim_id) in broken {
        let r = &mut state.players[rider_id as usize];
        r.stomping_on = None;
        r.vy = -4.0;
        let v = &mut state.players[victim_id as usize];
        v.stomped_by = None;
        v.stomp_cooldown = STOMP_COOLDOWN_TICKS;
        v.stomp_shake_progress = 0;
    }

    for (rider_id, victim_id) in victim_died {
        let r = &mut state.players[rider_id as usize];
        r.stomping_on = None;
        r.vy = -6.0;
        let v = &mut state.players[victim_id as usize];
        v.stomped_by = None;
    }
}

fn resolve_shooting(state: &mut GameState, resolved: &[PlayerInput; 2]) {
    for id in 0..2u8 {
        let input = resolved[id as usize];
        let can_shoot = {
            let p = &state.players[id as usize];
            p.is_alive() && p.weapon.is_some() && p.ammo > 0 && p.shoot_cooldown <= 0
        };
        if !can_shoot || !input.pressed(button::SHOOT) {
            continue;
        }

        let (weapon, aim) = {
            let p = &state.players[id as usize];
            (p.weapon.unwrap(), Vec2::new(input.aim_x, input.aim_y))
        };
        let stats = weapon_stats(weapon);
        let (mut projectiles, next_id, next_rng) =
            create_weapon_projectiles(&state.players[id as usize], aim, state.next_projectile_id, state.rng_state);
        state.next_projectile_id = next_id;
        state.rng_state = next_rng;
        state.projectiles.append(&mut projectiles);

        let p = &mut state.players[id as usize];
        p.shoot_cooldown = stats.cooldown;
        p.ammo -= 1;
        if p.ammo <= 0 {
            p.weapon = None;
            p.ammo = 0;
        }
    }
}

/// Above-surface buffer: a projectile is removed once its top edge comes
/// within this many pixels of a one-way platform's top, not only on exact
/// contact (SPEC_FULL.md §4.3).
const PLATFORM_CONTACT_BUFFER: f64 = 4.0;

/// `true` if `proj`'s hitbox crossed the top surface of any platform this
/// tick — `y_before` is its y before this tick's motion, mirroring the
/// feet-crossing test `physics::move_and_collide` uses for players, so a
/// fast-moving projectile can't tunnel through a platform undetected.
fn hits_platform(proj: &crate::game::weapons::Projectile, y_before: f64, map: &GameMap) -> bool {
    map.platforms.iter().any(|plat| {
        let contact_line = plat.top() - PLATFORM_CONTACT_BUFFER;
        let horizontal_overlap = proj.x + PROJECTILE_SIZE > plat.left() && proj.x < plat.right();
        horizontal_overlap && y_before <= contact_line && proj.y + PROJECTILE_SIZE >= contact_line
    })
}

/// Moves every projectile, then removes it for any of the spec's distinct
/// removal reasons: expired lifetime, past the generous out-of-bounds
/// margin, platform-surface contact, arena-wall crossing, or ceiling/floor.
/// A removed rocket always splashes, regardless of which reason fired.
fn step_projectiles(state: &mut GameState, map: &GameMap, result: &mut TickResult) {
    const MARGIN: f64 = 50.0;
    let (arena_left, arena_right) = (state.arena_left, state.arena_right);

    let mut exploded: Vec<(PlayerId, f64, f64)> = Vec::new();
    state.projectiles.retain_mut(|proj| {
        let y_before = proj.y;
        proj.x += proj.vx;
        proj.y += proj.vy;
        proj.lifetime -= 1;

        let out_of_margin = proj.x <= arena_left - MARGIN
            || proj.x >= arena_right + MARGIN
            || proj.y <= -MARGIN
            || proj.y >= map.height + MARGIN;
        let crossed_wall = proj.x <= arena_left || proj.x >= arena_right;
        let hit_ceiling_or_floor = proj.y <= 0.0 || proj.y >= map.height;
        let hit_platform = hits_platform(proj, y_before, map);

        let remove = proj.lifetime <= 0 || out_of_margin || crossed_wall || hit_ceiling_or_floor || hit_platform;
        if remove && is_rocket(proj) {
            exploded.push((proj.owner_id, proj.x, proj.y));
        }
        !remove
    });

    for (owner, ex, ey) in exploded {
        let kills = apply_splash_damage(Vec2::new(ex, ey), owner, &mut state.players);
        for (killer, victim) in kills {
            state.score[killer as usize] += 1;
            result.events.push(GameEvent::Kill { killer, victim });
        }
    }
}

/// Direct-hit and splash damage resolution. A rocket always explodes via
/// `apply_splash_damage`; every other weapon applies flat `damage` to the
/// first non-owner, non-invincible player whose AABB the projectile enters.
fn resolve_player_hits(state: &mut GameState, result: &mut TickResult) {
    let mut exploded: Vec<(PlayerId, f64, f64)> = Vec::new();
    let mut remove: Vec<i32> = Vec::new();

    for proj in state.projectiles.iter() {
        let hit_player = state.players.iter().find(|player| {
            player.id != proj.owner_id
                && player.is_alive()
                && !player.is_invincible()
                && aabb_overlap(proj.x, proj.y, PROJECTILE_SIZE, PROJECTILE_SIZE, player.x, player.y, PLAYER_WIDTH, PLAYER_HEIGHT)
        });

        let Some(victim) = hit_player else { continue };
        let victim_id = victim.id;

        if is_rocket(proj) {
            exploded.push((proj.owner_id, proj.x, proj.y));
        } else {
            let stats = weapon_stats(proj.weapon);
            let victim = &mut state.players[victim_id as usize];
            let new_health = victim.health - stats.damage;
            if new_health <= 0 {
                victim.health = 0;
                victim.set_alive(false);
                state.score[proj.owner_id as usize] += 1;
                result.events.push(GameEvent::Kill { killer: proj.owner_id, victim: victim_id });
            } else {
                victim.health = new_health;
            }
        }
        remove.push(proj.id);
    }

    for (owner, ex, ey) in exploded {
        let kills = apply_splash_damage(Vec2::new(ex, ey), owner, &mut state.players);
        for (killer, victim) in kills {
            state.score[killer as usize] += 1;
            result.events.push(GameEvent::Kill { killer, victim });
        }
    }

    state.projectiles.retain(|p| !remove.contains(&p.id));
}

/// A player whose health just hit zero loses a life. Both players are
/// checked before any lives decrement is acted on, so a simultaneous double
/// knockout (e.g. one splash explosion catching both) is resolved as a
/// single event rather than two sequential ones. With exactly one player
/// left with lives, the match enters death-linger with them as winner; with
/// zero players left, it lingers to a draw (`winner = 0`, player 0 is the
/// tie-break recipient per SPEC_FULL.md §4.4).
fn check_elimination(state: &mut GameState, result: &mut TickResult) {
    let newly_dead: [bool; 2] = std::array::from_fn(|id| {
        let p = &state.players[id];
        !p.is_alive() && p.death_timer < 0
    });
    if !newly_dead[0] && !newly_dead[1] {
        return;
    }

    for id in 0..2usize {
        if newly_dead[id] {
            let p = &mut state.players[id];
            p.lives -= 1;
            p.stomping_on = None;
            p.stomped_by = None;
        }
    }

    let remaining: Vec<usize> = (0..2usize).filter(|&id| state.players[id].lives > 0).collect();
    if remaining.len() == 1 {
        let winner = remaining[0] as i32;
        state.winner = winner;
        state.death_linger_timer = DEATH_LINGER_TICKS;
        result.events.push(GameEvent::RoundOver { winner });
    } else if remaining.is_empty() {
        state.winner = 0;
        state.death_linger_timer = DEATH_LINGER_TICKS;
        result.events.push(GameEvent::RoundOver { winner: 0 });
    } else {
        for id in 0..2usize {
            if newly_dead[id] {
                state.players[id].death_timer = RESPAWN_TICKS;
            }
        }
    }
}

/// Respawn point selection: a uniform PRNG draw among the map's spawn
/// points, except once sudden death has started, where both players
/// respawn at the (shrinking) arena's center, offset `±SUDDEN_DEATH_SPAWN_OFFSET`
/// by id so they don't stack.
fn step_respawns(state: &mut GameState, config: &MatchConfig, result: &mut TickResult) {
    for id in 0..2u8 {
        if state.players[id as usize].death_timer < 0 {
            continue;
        }
        state.players[id as usize].death_timer -= 1;
        if state.players[id as usize].death_timer > 0 {
            continue;
        }

        let (sx, sy) = if state.tick >= config.sudden_death_start_tick {
            let center = (state.arena_left + state.arena_right) / 2.0;
            let offset = if id == 0 { -SUDDEN_DEATH_SPAWN_OFFSET } else { SUDDEN_DEATH_SPAWN_OFFSET };
            (center + offset, config.map.height / 2.0)
        } else {
            let count = (config.map.spawn_points.len().max(1) - 1) as i32;
            let (idx, next_rng) = rng::int_range(state.rng_state, 0, count);
            state.rng_state = next_rng;
            let sp = config.map.spawn_points.get(idx as usize).copied().unwrap_or_default();
            (sp.x, sp.y)
        };

        let lives = state.players[id as usize].lives;
        let mut fresh = PlayerState::new(id, sx, sy);
        fresh.lives = lives;
        fresh.set_invincible(true);
        fresh.respawn_timer = INVINCIBLE_TICKS;
        fresh.death_timer = -1;
        state.players[id as usize] = fresh;
        result.events.push(GameEvent::Respawned { player: id });
    }
}

/// The arena walls close in proportionally to elapsed sudden-death time:
/// `progress = clamp((tick - sudden_death_start_tick) / (match_duration_ticks
/// - sudden_death_start_tick), 0, 1)`. Anyone caught outside the shrunken
/// bounds dies instantly, regardless of health. Returns `true` once
/// `progress` reaches 1, signalling the caller to force the match to end.
fn step_sudden_death(state: &mut GameState, config: &MatchConfig) -> bool {
    if state.tick < config.sudden_death_start_tick {
        return false;
    }

    let span = config.match_duration_ticks.saturating_sub(config.sudden_death_start_tick).max(1) as f64;
    let progress = ((state.tick - config.sudden_death_start_tick) as f64 / span).clamp(0.0, 1.0);
    state.arena_left = progress * config.map.width / 2.0;
    state.arena_right = config.map.width - progress * config.map.width / 2.0;

    for id in 0..2u8 {
        let outside = {
            let p = &state.players[id as usize];
            p.is_alive() && (p.x + PLAYER_WIDTH <= state.arena_left || p.x >= state.arena_right)
        };
        if outside {
            let p = &mut state.players[id as usize];
            p.health = 0;
            p.set_alive(false);
        }
    }

    progress >= 1.0
}

/// The match duration elapsed with both players still standing: more
/// remaining lives wins, ties broken by remaining health, and a dead-even
/// result goes to player 0.
fn end_match_time_up(state: &mut GameState, result: &mut TickResult) {
    let winner = if state.players[0].lives != state.players[1].lives {
        if state.players[0].lives > state.players[1].lives { 0 } else { 1 }
    } else if state.players[0].health != state.players[1].health {
        if state.players[0].health > state.players[1].health { 0 } else { 1 }
    } else {
        0
    };

    state.match_over = true;
    state.winner = winner;
    result.events.push(GameEvent::RoundOver { winner });
}
