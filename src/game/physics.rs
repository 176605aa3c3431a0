//! Physics
//!
//! Three pure per-player operations: input → velocity, gravity, move+collide
//! against one-way platforms. Grounded on chickenz-core's `physics.rs`
//! crossing-test collision (the teacher's own fixed-point collision is a
//! solid-AABB model that doesn't match this spec's one-way contract).

use crate::game::input::{button, PlayerInput};
use crate::game::map::GameMap;
use crate::game::state::PlayerState;
use crate::game::weapons::{PLAYER_HEIGHT, PLAYER_WIDTH};

pub const GRAVITY: f64 = 0.5;
pub const PLAYER_SPEED: f64 = 4.0;
pub const ACCELERATION: f64 = 0.8;
pub const DECELERATION: f64 = 0.6;
pub const JUMP_VELOCITY: f64 = -12.0;
pub const MAX_FALL_SPEED: f64 = 12.0;
pub const MAX_JUMPS: i32 = 2;
pub const WALL_SLIDE_SPEED: f64 = 2.0;
pub const WALL_JUMP_VX: f64 = 7.0;
pub const WALL_JUMP_VY: f64 = -10.0;

/// Input → velocity. No-op on a dead player. Jump is edge-triggered on the
/// 0→1 transition of the Jump bit between `input` and `prev_input`.
pub fn apply_player_input(p: &mut PlayerState, input: &PlayerInput, prev_input: &PlayerInput) {
    if !p.is_alive() {
        return;
    }

    let left = input.pressed(button::LEFT);
    let right = input.pressed(button::RIGHT);
    let target_vx = match (left, right) {
        (true, false) => -PLAYER_SPEED,
        (false, true) => PLAYER_SPEED,
        _ => 0.0,
    };

    if target_vx != 0.0 {
        if p.vx < target_vx {
            p.vx = (p.vx + ACCELERATION).min(target_vx);
        } else if p.vx > target_vx {
            p.vx = (p.vx - ACCELERATION).max(target_vx);
        }
    } else if p.vx > 0.0 {
        p.vx = (p.vx - DECELERATION).max(0.0);
    } else if p.vx < 0.0 {
        p.vx = (p.vx + DECELERATION).min(0.0);
    }

    let jump_edge = input.pressed(button::JUMP) && !prev_input.pressed(button::JUMP);
    if jump_edge {
        if p.wall_sliding && p.jumps_left > 0 {
            p.vx = -(p.wall_dir as f64) * WALL_JUMP_VX;
            p.vy = WALL_JUMP_VY;
            p.jumps_left -= 1;
            p.wall_sliding = false;
        } else if p.jumps_left > 0 {
            p.vy = JUMP_VELOCITY;
            p.jumps_left -= 1;
        }
    }

    if input.aim_x != 0.0 {
        p.facing = if input.aim_x > 0.0 { 1 } else { -1 };
    }
}

/// Gravity integration. No-op on a dead player.
pub fn apply_gravity(p: &mut PlayerState) {
    if !p.is_alive() {
        return;
    }
    let cap = if p.wall_sliding { WALL_SLIDE_SPEED } else { MAX_FALL_SPEED };
    p.vy = (p.vy + GRAVITY).min(cap);
}

/// Move and resolve one-way platform collisions, arena-edge clamping, and
/// wall-slide detection.
pub fn move_and_collide(p: &mut PlayerState, map: &GameMap, arena_left: f64, arena_right: f64, input: &PlayerInput) {
    if !p.is_alive() {
        return;
    }

    let feet_before = p.y + PLAYER_HEIGHT;
    let x1 = p.x + p.vx;
    let mut y1 = p.y + p.vy;
    let feet_after = y1 + PLAYER_HEIGHT;

    p.grounded = false;

    for plat in &map.platforms {
        let plat_top = plat.top();
        let horizontal_overlap = x1 + PLAYER_WIDTH > plat.left() && x1 < plat.right();
        if horizontal_overlap && feet_before <= plat_top && feet_after >= plat_top {
            y1 = plat_top - PLAYER_HEIGHT;
            p.vy = 0.0;
            p.grounded = true;
        }
    }

    let min_x = arena_left;
    let max_x = arena_right - PLAYER_WIDTH;
    let mut x1 = x1.clamp(min_x.min(max_x), max_x.max(min_x));

    let min_y = 0.0;
    let max_y = map.height - PLAYER_HEIGHT;
    if y1 < min_y {
        y1 = min_y;
        if p.vy < 0.0 {
            p.vy = 0.0;
        }
    }
    if y1 > max_y {
        y1 = max_y;
        p.vy = 0.0;
        p.grounded = true;
    }

    p.wall_sliding = false;
    p.wall_dir = 0;
    if !p.grounded && p.vy > 0.0 {
        if input.pressed(button::LEFT) && x1 <= min_x {
            p.wall_sliding = true;
            p.wall_dir = -1;
        } else if input.pressed(button::RIGHT) && x1 >= max_x {
            p.wall_sliding = true;
            p.wall_dir = 1;
        }
    }

    p.x = x1;
    p.y = y1;

    if p.grounded {
        p.jumps_left = MAX_JUMPS;
    } else if p.wall_sliding && p.jumps_left == 0 {
        p.jumps_left = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::arena;
    use crate::game::state::PlayerState;

    fn idle_input() -> PlayerInput {
        PlayerInput::NULL
    }

    #[test]
    fn holding_jump_does_not_retrigger() {
        let mut p = PlayerState::new(0, 100.0, 536.0);
        p.grounded = true;
        let held = PlayerInput { buttons: button::JUMP, aim_x: 0.0, aim_y: 0.0 };
        apply_player_input(&mut p, &held, &held);
        assert_eq!(p.vy, 0.0, "holding jump across ticks must not retrigger");
    }

    #[test]
    fn jump_edge_fires_once() {
        let mut p = PlayerState::new(0, 100.0, 536.0);
        p.grounded = true;
        let pressed = PlayerInput { buttons: button::JUMP, aim_x: 0.0, aim_y: 0.0 };
        apply_player_input(&mut p, &pressed, &idle_input());
        assert_eq!(p.vy, JUMP_VELOCITY);
    }

    #[test]
    fn one_way_platform_ignored_when_rising_through() {
        let map = arena();
        let plat = map.platforms[1];
        let mut p = PlayerState::new(0, plat.x + 10.0, plat.top() + 5.0);
        p.vy = -6.0; // rising, feet below the top, moving up through it
        move_and_collide(&mut p, &map, 0.0, map.width, &idle_input());
        assert!(!p.grounded, "rising through a one-way platform must not collide");
    }

    #[test]
    fn one_way_platform_catches_falling_player() {
        let map = arena();
        let plat = map.platforms[1];
        let mut p = PlayerState::new(0, plat.x + 10.0, plat.top() - PLAYER_HEIGHT - 1.0);
        p.vy = 5.0;
        move_and_collide(&mut p, &map, 0.0, map.width, &idle_input());
        assert!(p.grounded);
        assert_eq!(p.y, plat.top() - PLAYER_HEIGHT);
    }

    #[test]
    fn boundary_clamp_holds() {
        let map = arena();
        let mut p = PlayerState::new(0, -500.0, 0.0);
        p.vx = -100.0;
        move_and_collide(&mut p, &map, 0.0, map.width, &idle_input());
        assert!(p.x >= 0.0);
        assert!(p.x <= map.width - PLAYER_WIDTH);
    }
}
