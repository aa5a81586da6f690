//! Kinematic bodies and the integrate-and-collide step
//!
//! Every moving thing in a level owns a [`PhysicsBody`]. Position and velocity
//! are private: all writes go through setters that refuse non-finite values,
//! and [`integrate`] commits a step only if the whole result is finite.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Axis, depenetrate, standing_on_solid, sweep_axis};
use super::tiles::{TileCoord, TileGrid};
use crate::consts::{GRAVITY, HORIZONTAL_MARGIN, TERMINAL_VELOCITY};

/// Position, velocity and size of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    pos: Vec2,
    vel: Vec2,
    size: Vec2,
    /// Resting on a solid tile
    pub grounded: bool,
    /// Multiplier on gravity (0 for flyers and projectiles)
    pub gravity_scale: f32,
    /// Whether the body is resolved against solid tiles
    pub collides: bool,
    /// Left the world bounds; the owner is removed at commit
    out_of_world: bool,
    /// Rejected writes since the last [`PhysicsBody::take_rejections`]
    #[serde(skip)]
    rejections: u32,
}

impl PhysicsBody {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            size,
            grounded: false,
            gravity_scale: 1.0,
            collides: true,
            out_of_world: false,
            rejections: 0,
        }
    }

    /// Body that ignores gravity
    pub fn floating(pos: Vec2, size: Vec2) -> Self {
        Self {
            gravity_scale: 0.0,
            ..Self::new(pos, size)
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn vel(&self) -> Vec2 {
        self.vel
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    #[inline]
    pub fn out_of_world(&self) -> bool {
        self.out_of_world
    }

    /// Set velocity. Non-finite values are rejected and counted.
    pub fn set_velocity(&mut self, vel: Vec2) -> bool {
        if vel.is_finite() {
            self.vel = vel;
            true
        } else {
            self.reject();
            false
        }
    }

    /// Set one velocity component
    pub fn set_vel_x(&mut self, vx: f32) -> bool {
        self.set_velocity(Vec2::new(vx, self.vel.y))
    }

    pub fn set_vel_y(&mut self, vy: f32) -> bool {
        self.set_velocity(Vec2::new(self.vel.x, vy))
    }

    /// Teleport the body. Non-finite values are rejected and counted.
    pub fn set_position(&mut self, pos: Vec2) -> bool {
        if pos.is_finite() {
            self.pos = pos;
            self.grounded = false;
            true
        } else {
            self.reject();
            false
        }
    }

    /// Place the body at rest at `pos`, bringing it back into the world
    pub fn reset_at(&mut self, pos: Vec2) {
        if self.set_position(pos) {
            self.vel = Vec2::ZERO;
            self.out_of_world = false;
        }
    }

    /// Number of rejected writes since the last call, resetting the count
    pub fn take_rejections(&mut self) -> u32 {
        std::mem::take(&mut self.rejections)
    }

    fn reject(&mut self) {
        self.rejections += 1;
        log::trace!("rejected non-finite update at {:?}", self.pos);
    }
}

/// What happened during one [`integrate`] call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    pub hit_x: bool,
    pub hit_y: bool,
    /// Transitioned from airborne to grounded this step
    pub landed: bool,
    /// First tile that blocked the motion
    pub tile_hit: Option<TileCoord>,
    /// The step produced a non-finite value and was discarded
    pub rejected: bool,
}

/// Advance a body by `dt` seconds against `grid`
///
/// Gravity is applied unless the body rests on the ground without moving up.
/// Horizontal motion is resolved before vertical motion; the velocity
/// component of a blocked axis is zeroed and a downward block grounds the
/// body. A body that drops below the grid or strays past the horizontal
/// margin is flagged out of world and no longer collided.
pub fn integrate(body: &mut PhysicsBody, dt: f32, grid: &TileGrid) -> StepOutcome {
    let mut outcome = StepOutcome::default();
    if body.out_of_world {
        return outcome;
    }
    if !dt.is_finite() || dt < 0.0 {
        body.reject();
        outcome.rejected = true;
        return outcome;
    }

    let mut vel = body.vel;
    let mut pos = body.pos;
    let mut grounded = body.grounded;

    if body.collides {
        // Sweeps ignore tiles the box starts in, so push out of them first
        if let Some(clear) = depenetrate(grid, pos, body.size) {
            log::trace!("pushed body out of terrain {:?} -> {:?}", pos, clear);
            if clear.x != pos.x {
                vel.x = 0.0;
            }
            if clear.y != pos.y {
                vel.y = 0.0;
            }
            pos = clear;
        }
    }

    if !(grounded && vel.y >= 0.0) {
        vel.y = (vel.y + GRAVITY * body.gravity_scale * dt).min(TERMINAL_VELOCITY);
    }

    if body.collides {
        let sx = sweep_axis(grid, pos, body.size, vel.x * dt, Axis::X);
        pos.x = sx.coord;
        if sx.blocked {
            vel.x = 0.0;
            outcome.hit_x = true;
            outcome.tile_hit = sx.tile;
        }

        let sy = sweep_axis(grid, pos, body.size, vel.y * dt, Axis::Y);
        pos.y = sy.coord;
        if sy.blocked {
            outcome.hit_y = true;
            outcome.tile_hit = outcome.tile_hit.or(sy.tile);
            if vel.y > 0.0 {
                outcome.landed = !grounded;
                grounded = true;
            }
            vel.y = 0.0;
        } else {
            grounded = vel.y >= 0.0 && standing_on_solid(grid, pos, body.size);
        }
    } else {
        pos += vel * dt;
        grounded = false;
    }

    if !(pos.is_finite() && vel.is_finite()) {
        body.reject();
        outcome = StepOutcome {
            rejected: true,
            ..StepOutcome::default()
        };
        return outcome;
    }

    body.pos = pos;
    body.vel = vel;
    body.grounded = grounded;
    body.out_of_world = pos.y > grid.pixel_height()
        || pos.x + body.size.x < -HORIZONTAL_MARGIN
        || pos.x > grid.pixel_width() + HORIZONTAL_MARGIN;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::tiles::{Biome, TileKind};
    use proptest::prelude::*;

    fn floor_grid() -> TileGrid {
        let mut g = TileGrid::new(20, 12, 40.0, Biome::Forest);
        for col in 0..20 {
            g.set(col, 11, TileKind::Stone);
        }
        for row in 7..11 {
            g.set(12, row, TileKind::Dirt);
        }
        g
    }

    fn body_at(x: f32, y: f32) -> PhysicsBody {
        PhysicsBody::new(Vec2::new(x, y), Vec2::new(24.0, 30.0))
    }

    #[test]
    fn test_falls_and_lands() {
        let g = floor_grid();
        let mut b = body_at(80.0, 100.0);
        let mut landed = 0;
        for _ in 0..180 {
            if integrate(&mut b, SIM_DT, &g).landed {
                landed += 1;
            }
        }
        assert!(b.grounded);
        assert_eq!(landed, 1);
        assert_eq!(b.pos().y, 440.0 - 30.0);
        assert_eq!(b.vel().y, 0.0);
    }

    #[test]
    fn test_resting_body_is_idempotent() {
        let g = floor_grid();
        let mut b = body_at(80.0, 410.0);
        integrate(&mut b, SIM_DT, &g);
        let settled = b.clone();
        for _ in 0..10 {
            integrate(&mut b, SIM_DT, &g);
        }
        assert_eq!(b, settled);
        assert!(b.grounded);
    }

    #[test]
    fn test_wall_zeroes_horizontal_velocity() {
        let g = floor_grid();
        let mut b = body_at(440.0, 410.0);
        b.grounded = true;
        b.set_velocity(Vec2::new(300.0, 0.0));
        let mut hit = false;
        for _ in 0..30 {
            hit |= integrate(&mut b, SIM_DT, &g).hit_x;
        }
        assert!(hit);
        assert_eq!(b.vel().x, 0.0);
        assert_eq!(b.pos().x, 480.0 - 24.0);
    }

    #[test]
    fn test_walking_off_ledge_ungrounds() {
        let mut g = TileGrid::new(10, 12, 40.0, Biome::Forest);
        g.set(0, 11, TileKind::Stone);
        g.set(1, 11, TileKind::Stone);
        let mut b = body_at(40.0, 410.0);
        b.grounded = true;
        b.set_velocity(Vec2::new(200.0, 0.0));
        for _ in 0..20 {
            integrate(&mut b, SIM_DT, &g);
        }
        assert!(!b.grounded);
        assert!(b.vel().y > 0.0);
    }

    #[test]
    fn test_non_finite_writes_rejected() {
        let g = floor_grid();
        let mut b = body_at(80.0, 100.0);
        assert!(!b.set_velocity(Vec2::new(f32::NAN, 0.0)));
        assert!(!b.set_position(Vec2::new(0.0, f32::INFINITY)));
        assert_eq!(b.pos(), Vec2::new(80.0, 100.0));
        assert_eq!(b.take_rejections(), 2);
        assert_eq!(b.take_rejections(), 0);

        let before = b.clone();
        let outcome = integrate(&mut b, f32::NAN, &g);
        assert!(outcome.rejected);
        assert_eq!(b.pos(), before.pos());
    }

    #[test]
    fn test_falling_below_grid_leaves_world() {
        let g = TileGrid::new(10, 5, 40.0, Biome::Forest);
        let mut b = body_at(80.0, 150.0);
        for _ in 0..120 {
            integrate(&mut b, SIM_DT, &g);
        }
        assert!(b.out_of_world());
        let frozen = b.pos();
        integrate(&mut b, SIM_DT, &g);
        assert_eq!(b.pos(), frozen);
    }

    #[test]
    fn test_embedded_body_is_pushed_onto_floor() {
        let g = floor_grid();
        // 10 px into the stone floor
        let mut b = body_at(80.0, 420.0);
        b.set_velocity(Vec2::new(0.0, 200.0));
        for _ in 0..600 {
            integrate(&mut b, SIM_DT, &g);
        }
        assert!(!b.out_of_world());
        assert_eq!(b.pos(), Vec2::new(80.0, 440.0 - 30.0));
        assert!(b.grounded);
        assert!(!g.overlaps_solid(b.pos(), b.size()));
    }

    #[test]
    fn test_non_colliding_body_passes_through() {
        let g = floor_grid();
        let mut b = PhysicsBody::floating(Vec2::new(400.0, 300.0), Vec2::splat(4.0));
        b.collides = false;
        b.set_velocity(Vec2::new(600.0, 0.0));
        integrate(&mut b, 0.2, &g);
        assert_eq!(b.pos().x, 520.0);
    }

    proptest! {
        #[test]
        fn prop_no_overlap_after_settling(x in 0.0f32..700.0, y in 0.0f32..400.0, vx in -400.0f32..400.0) {
            let g = floor_grid();
            let size = Vec2::new(24.0, 30.0);
            // Start outside any solid tile
            prop_assume!(!g.overlaps_solid(Vec2::new(x, y), size));
            let mut b = PhysicsBody::new(Vec2::new(x, y), size);
            b.set_velocity(Vec2::new(vx, 0.0));
            for _ in 0..240 {
                integrate(&mut b, SIM_DT, &g);
                prop_assert!(b.pos().is_finite());
                prop_assert!(!g.overlaps_solid(b.pos(), b.size()));
            }
        }
    }
}
