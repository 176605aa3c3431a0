//! Arena Map Geometry
//!
//! Static, shared arena descriptors: one-way platforms, spawn points, and
//! weapon spawn points. The map is constructed once per room and never
//! mutated thereafter.

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;

/// A one-way platform: solid only when approached from above.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Platform {
    #[inline]
    pub fn top(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn left(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Static arena: dimensions, one-way platforms, spawn points, weapon spawns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameMap {
    pub width: f64,
    pub height: f64,
    pub platforms: Vec<Platform>,
    pub spawn_points: Vec<Vec2>,
    pub weapon_spawn_points: Vec<Vec2>,
}

/// The single arena shipped with this match engine.
///
/// Mirrors the 800x600 layout used throughout the reference scenarios: a
/// ground platform plus five floating platforms, four player spawns, four
/// weapon spawns.
pub fn arena() -> GameMap {
    GameMap {
        width: 800.0,
        height: 600.0,
        platforms: vec![
            Platform { x: 0.0, y: 568.0, width: 800.0, height: 32.0 },
            Platform { x: 100.0, y: 450.0, width: 150.0, height: 16.0 },
            Platform { x: 550.0, y: 450.0, width: 150.0, height: 16.0 },
            Platform { x: 300.0, y: 350.0, width: 200.0, height: 16.0 },
            Platform { x: 50.0, y: 250.0, width: 120.0, height: 16.0 },
            Platform { x: 630.0, y: 250.0, width: 120.0, height: 16.0 },
        ],
        spawn_points: vec![
            Vec2::new(100.0, 536.0),
            Vec2::new(700.0, 536.0),
            Vec2::new(350.0, 318.0),
            Vec2::new(400.0, 218.0),
        ],
        weapon_spawn_points: vec![
            Vec2::new(375.0, 330.0),
            Vec2::new(110.0, 430.0),
            Vec2::new(560.0, 430.0),
            Vec2::new(60.0, 230.0),
        ],
    }
}

/// A narrower arena with a single mid-height platform spanning most of its
/// width — favors close-range weapons over the open sightlines of `arena`.
pub fn causeway() -> GameMap {
    GameMap {
        width: 640.0,
        height: 520.0,
        platforms: vec![
            Platform { x: 0.0, y: 488.0, width: 640.0, height: 32.0 },
            Platform { x: 160.0, y: 360.0, width: 320.0, height: 16.0 },
            Platform { x: 40.0, y: 220.0, width: 120.0, height: 16.0 },
            Platform { x: 480.0, y: 220.0, width: 120.0, height: 16.0 },
        ],
        spawn_points: vec![
            Vec2::new(80.0, 456.0),
            Vec2::new(560.0, 456.0),
            Vec2::new(320.0, 328.0),
            Vec2::new(320.0, 188.0),
        ],
        weapon_spawn_points: vec![
            Vec2::new(320.0, 340.0),
            Vec2::new(100.0, 188.0),
            Vec2::new(540.0, 188.0),
        ],
    }
}

/// Tall, vertically-stacked arena with three narrow floating platforms and
/// no full-width ground — falling off the bottom platform is a ring-out.
pub fn spire() -> GameMap {
    GameMap {
        width: 720.0,
        height: 700.0,
        platforms: vec![
            Platform { x: 60.0, y: 600.0, width: 200.0, height: 16.0 },
            Platform { x: 460.0, y: 600.0, width: 200.0, height: 16.0 },
            Platform { x: 260.0, y: 430.0, width: 200.0, height: 16.0 },
            Platform { x: 60.0, y: 260.0, width: 160.0, height: 16.0 },
            Platform { x: 500.0, y: 260.0, width: 160.0, height: 16.0 },
        ],
        spawn_points: vec![
            Vec2::new(120.0, 568.0),
            Vec2::new(520.0, 568.0),
            Vec2::new(310.0, 398.0),
            Vec2::new(360.0, 228.0),
        ],
        weapon_spawn_points: vec![
            Vec2::new(360.0, 410.0),
            Vec2::new(130.0, 228.0),
            Vec2::new(570.0, 228.0),
        ],
    }
}

/// Every map a room's round order can be shuffled over, in a fixed base
/// order. `map_index` on the wire always refers to a position in this slice.
pub fn map_pool() -> Vec<GameMap> {
    vec![arena(), causeway(), spire()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_pool_indices_are_stable_and_nonempty() {
        let pool = map_pool();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[0], arena());
    }

    #[test]
    fn arena_has_expected_structure() {
        let map = arena();
        assert_eq!(map.width, 800.0);
        assert_eq!(map.height, 600.0);
        assert_eq!(map.platforms.len(), 6);
        assert_eq!(map.spawn_points.len(), 4);
        assert_eq!(map.weapon_spawn_points.len(), 4);
    }

    #[test]
    fn platform_edges() {
        let p = Platform { x: 100.0, y: 450.0, width: 150.0, height: 16.0 };
        assert_eq!(p.top(), 450.0);
        assert_eq!(p.left(), 100.0);
        assert_eq!(p.right(), 250.0);
    }
}
