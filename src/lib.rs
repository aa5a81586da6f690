//! Mutt Brigade - a side-scrolling squad platformer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tile physics, level generation, AI, screen flow)
//! - `roster`: Hero catalogue and persistent squad records
//! - `persistence`: Roster storage backends
//! - `settings`: Data-driven run configuration

pub mod persistence;
pub mod roster;
pub mod settings;
pub mod sim;

pub use roster::{HeroDef, Roster, RosterRecord, HEROES};
pub use settings::{LevelDimensions, QualityPreset, Settings, SettingsError};

/// Game configuration constants
///
/// World units are pixels with the origin at the top-left of the level and
/// y growing downward. Velocities are pixels per second.
pub mod consts {
    /// Simulation tick rate
    pub const TICK_RATE: u32 = 60;
    /// Fixed simulation timestep
    pub const SIM_DT: f32 = 1.0 / TICK_RATE as f32;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame the driver may report before it is clamped
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Level defaults
    pub const TILE_SIZE: f32 = 40.0;
    pub const LEVEL_WIDTH_TILES: usize = 400;
    pub const LEVEL_HEIGHT_TILES: usize = 60;

    /// Downward acceleration (pixels/s²)
    pub const GRAVITY: f32 = 2160.0;
    /// Maximum fall speed, keeps per-tick motion under one tile
    pub const TERMINAL_VELOCITY: f32 = 900.0;

    /// Player movement
    pub const PLAYER_WIDTH: f32 = 24.0;
    pub const PLAYER_HEIGHT: f32 = 30.0;
    pub const PLAYER_ACCEL: f32 = 2880.0;
    pub const PLAYER_MAX_SPEED: f32 = 300.0;
    /// Per-tick horizontal damping when no direction is held
    pub const PLAYER_FRICTION: f32 = 0.85;
    pub const PLAYER_JUMP_SPEED: f32 = 780.0;
    pub const PLAYER_CLIMB_SPEED: f32 = 180.0;
    pub const PLAYER_MAX_HEALTH: i32 = 3;
    /// Invincibility after a hit (ticks)
    pub const PLAYER_HIT_GRACE_TICKS: u32 = 60;
    /// Invincibility after a respawn (ticks)
    pub const PLAYER_RESPAWN_GRACE_TICKS: u32 = 120;
    pub const STARTING_LIVES: u32 = 3;
    pub const MAX_PLAYERS: usize = 4;

    /// Boss placement
    pub const BOSS_ARENA_LEVEL: u32 = 20;
    /// Columns kept clear of the boss on early levels
    pub const BOSS_TAIL_MARGIN_TILES: usize = 25;
    /// Boss anchor distance from the level end on arena levels
    pub const BOSS_ARENA_ANCHOR_TILES: usize = 20;
    /// Width of the flattened arena floor on arena levels
    pub const BOSS_ARENA_WIDTH_TILES: usize = 40;
    /// Distance at which a dormant boss wakes up
    pub const BOSS_WAKE_DISTANCE: f32 = 800.0;

    /// Flying enemy fire cooldown (ticks)
    pub const FLYER_FIRE_COOLDOWN_TICKS: u32 = 100;
    pub const FLYER_AGGRO_RADIUS: f32 = 500.0;
    pub const GRUNT_AGGRO_RADIUS: f32 = 400.0;

    /// Entities further than this outside the level columns are dropped
    pub const HORIZONTAL_MARGIN: f32 = 10.0 * TILE_SIZE;

    /// Score awards
    pub const KILL_SCORE: u32 = 100;
    pub const RESCUE_SCORE: u32 = 500;
    pub const LEVEL_CLEAR_SCORE: u32 = 1000;

    /// Default particle cap
    pub const MAX_PARTICLES: usize = 512;
}

/// Axis-aligned rectangle overlap (half-open on the far edges)
#[inline]
pub fn rect_intersect(a_pos: glam::Vec2, a_size: glam::Vec2, b_pos: glam::Vec2, b_size: glam::Vec2) -> bool {
    b_pos.x < a_pos.x + a_size.x
        && b_pos.x + b_size.x > a_pos.x
        && b_pos.y < a_pos.y + a_size.y
        && b_pos.y + b_size.y > a_pos.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_rect_intersect_touching_edges_do_not_overlap() {
        let a = Vec2::new(0.0, 0.0);
        let size = Vec2::new(10.0, 10.0);
        assert!(!rect_intersect(a, size, Vec2::new(10.0, 0.0), size));
        assert!(!rect_intersect(a, size, Vec2::new(0.0, 10.0), size));
        assert!(rect_intersect(a, size, Vec2::new(9.5, 9.5), size));
    }
}
