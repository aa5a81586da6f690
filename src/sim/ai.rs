//! Per-kind behaviour updates
//!
//! Behaviours run before any body is integrated. They read a snapshot of the
//! players taken at the start of the tick, write only their own entity's
//! velocity and timers, and push everything else (shots, explosions, events)
//! into [`Commands`] for the world to apply.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::boss;
use super::entity::{
    Entity, EntityId, EntityKind, EnemyVariant, Faction, FlyerBrain, GroundBrain, ItemKind, PlayerData,
    ProjectileData, ProjectileMotion,
};
use super::physics::PhysicsBody;
use super::tick::PlayerInput;
use super::tiles::{TileCoord, TileGrid, TileKind};
use super::world::GameEvent;
use crate::consts::*;

/// Kamikaze detonation trigger distance
const KAMIKAZE_TRIGGER: f32 = 50.0;
const KAMIKAZE_BLAST_RADIUS: f32 = 80.0;
/// Flyer hovers this far above its target
const FLYER_HOVER_HEIGHT: f32 = 100.0;

/// An active player as seen by behaviours this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: EntityId,
    pub slot: usize,
    pub center: Vec2,
}

/// Read-only inputs shared by all behaviours in a tick
pub struct AiContext<'a> {
    pub grid: &'a TileGrid,
    pub targets: &'a [Target],
}

impl AiContext<'_> {
    /// Closest active player and its distance
    pub fn nearest_target(&self, from: Vec2) -> Option<(&Target, f32)> {
        self.targets
            .iter()
            .map(|t| (t, t.center.distance(from)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn target(&self, id: EntityId) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }
}

/// A projectile to create at commit
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRequest {
    pub owner: EntityId,
    pub owner_slot: Option<usize>,
    pub faction: Faction,
    /// Centre of the projectile
    pub pos: Vec2,
    pub size: Vec2,
    pub vel: Vec2,
    pub damage: i32,
    pub ttl: u32,
    pub motion: ProjectileMotion,
    /// Falls under gravity (bombs)
    pub gravity: bool,
}

impl ShotRequest {
    /// Standard hostile bullet fired along `angle`
    pub fn aimed(owner: EntityId, faction: Faction, pos: Vec2, angle: f32, speed: f32, damage: i32) -> Self {
        Self {
            owner,
            owner_slot: None,
            faction,
            pos,
            size: Vec2::new(15.0, 5.0),
            vel: Vec2::from_angle(angle) * speed,
            damage,
            ttl: 80,
            motion: ProjectileMotion::Straight,
            gravity: false,
        }
    }

    /// Turn the request into an entity
    pub fn into_entity(self, id: EntityId) -> Entity {
        let data = ProjectileData {
            owner: self.owner,
            owner_slot: self.owner_slot,
            faction: self.faction,
            damage: self.damage,
            ttl: self.ttl,
            breaks_tiles: true,
            motion: self.motion,
        };
        let top_left = self.pos - self.size * 0.5;
        let mut e = Entity::projectile(id, top_left, self.size, self.vel, data);
        if self.gravity {
            e.body.gravity_scale = 1.0;
        }
        e
    }
}

/// Area damage request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explosion {
    pub center: Vec2,
    pub radius: f32,
    pub damage: i32,
    /// Side that is *not* hurt
    pub source: Faction,
}

/// Deferred side effects of one tick
#[derive(Debug, Default)]
pub struct Commands {
    pub shots: Vec<ShotRequest>,
    /// Cosmetic particles: position, velocity
    pub particles: Vec<(Vec2, Vec2)>,
    pub explosions: Vec<Explosion>,
    pub items: Vec<(ItemKind, Vec2)>,
    pub tile_breaks: Vec<TileCoord>,
    pub events: Vec<GameEvent>,
}

impl Commands {
    /// Queue a small particle burst
    pub fn burst(&mut self, at: Vec2, count: usize, rng: &mut Pcg32) {
        for _ in 0..count {
            let vel = Vec2::new(rng.random_range(-240.0..240.0), rng.random_range(-360.0..60.0));
            self.particles.push((at, vel));
        }
    }
}

/// Run the behaviour for one entity
pub fn update(entity: &mut Entity, input: &PlayerInput, ctx: &AiContext, rng: &mut Pcg32, cmds: &mut Commands) {
    if !entity.alive {
        return;
    }
    let id = entity.id;
    match &mut entity.kind {
        EntityKind::Player(data) => update_player(id, data, &mut entity.body, input, ctx, cmds),
        EntityKind::Enemy(brain) => {
            if update_ground(id, brain, &mut entity.body, ctx, rng, cmds) {
                entity.alive = false;
                entity.health = 0;
            }
        }
        EntityKind::FlyingEnemy(brain) => update_flyer(id, brain, &mut entity.body, ctx, rng, cmds),
        EntityKind::Boss(brain) => boss::update(id, brain, &mut entity.body, ctx, rng, cmds),
        EntityKind::Projectile(data) => {
            if !update_projectile(data, &mut entity.body, ctx) {
                entity.alive = false;
            }
        }
        EntityKind::Particle { ttl } => {
            *ttl = ttl.saturating_sub(1);
            if *ttl == 0 {
                entity.alive = false;
            }
        }
        EntityKind::Item(_) => {}
    }
}

fn update_player(
    id: EntityId,
    data: &mut PlayerData,
    body: &mut PhysicsBody,
    input: &PlayerInput,
    ctx: &AiContext,
    cmds: &mut Commands,
) {
    data.fire_cooldown = data.fire_cooldown.saturating_sub(1);
    data.invincible_ticks = data.invincible_ticks.saturating_sub(1);

    let vel = body.vel();
    if data.downed {
        body.set_vel_x(vel.x * PLAYER_FRICTION);
        return;
    }

    let move_x = if input.move_x.is_finite() { input.move_x.clamp(-1.0, 1.0) } else { 0.0 };
    let mut vx = if move_x != 0.0 {
        data.facing = move_x.signum();
        (vel.x + move_x * PLAYER_ACCEL * SIM_DT).clamp(-PLAYER_MAX_SPEED, PLAYER_MAX_SPEED)
    } else {
        vel.x * PLAYER_FRICTION
    };
    if vx.abs() < 1.0 {
        vx = 0.0;
    }
    let mut vy = vel.y;

    let on_ladder = ctx.grid.overlaps_kind(body.pos(), body.size(), TileKind::Ladder);
    let climb = if input.climb.is_finite() { input.climb.clamp(-1.0, 1.0) } else { 0.0 };
    if !on_ladder {
        data.climbing = false;
    } else if climb != 0.0 {
        data.climbing = true;
    }
    if data.climbing {
        body.gravity_scale = 0.0;
        vy = climb * PLAYER_CLIMB_SPEED;
    } else {
        body.gravity_scale = 1.0;
    }

    if input.jump && (body.grounded || data.climbing) {
        vy = -PLAYER_JUMP_SPEED;
        data.climbing = false;
        body.gravity_scale = 1.0;
        body.grounded = false;
    }
    body.set_velocity(Vec2::new(vx, vy));

    if input.fire && data.fire_cooldown == 0 {
        let profile = data.weapon.profile();
        data.fire_cooldown = profile.cooldown_ticks;
        let muzzle = body.center() + Vec2::new(data.facing * body.size().x * 0.5, -4.0);
        let half = (profile.pellets as f32 - 1.0) * 0.5;
        for i in 0..profile.pellets {
            let vy = (i as f32 - half) * profile.pellet_spread;
            cmds.shots.push(ShotRequest {
                owner: id,
                owner_slot: Some(data.slot),
                faction: Faction::Squad,
                pos: muzzle,
                size: profile.size,
                vel: Vec2::new(data.facing * profile.speed, vy),
                damage: profile.damage,
                ttl: profile.ttl_ticks,
                motion: profile.motion,
                gravity: false,
            });
        }
    }
}

/// Ground enemy step. Returns true if the enemy destroyed itself.
fn update_ground(
    id: EntityId,
    brain: &mut GroundBrain,
    body: &mut PhysicsBody,
    ctx: &AiContext,
    rng: &mut Pcg32,
    cmds: &mut Commands,
) -> bool {
    let profile = brain.variant.profile();
    let center = body.center();
    let nearest = ctx.nearest_target(center);

    let close = nearest.is_some_and(|(_, dist)| dist < KAMIKAZE_TRIGGER);
    if brain.variant == EnemyVariant::Kamikaze && close {
        cmds.explosions.push(Explosion {
            center,
            radius: KAMIKAZE_BLAST_RADIUS,
            damage: 2,
            source: Faction::Hostile,
        });
        cmds.burst(center, 12, rng);
        log::debug!("kamikaze {id} detonated");
        return true;
    }

    let mut vx;
    if brain.blocked_timer > 0 {
        brain.blocked_timer -= 1;
        vx = brain.facing * profile.patrol_speed;
    } else {
        let engaged = nearest.filter(|(t, dist)| match brain.variant {
            // Snipers only care about horizontal range
            EnemyVariant::Sniper => (t.center.x - center.x).abs() < profile.aggro_radius,
            _ => *dist < profile.aggro_radius,
        });
        brain.chasing = engaged.is_some();
        match engaged {
            Some((target, _)) => {
                brain.facing = if target.center.x < center.x { -1.0 } else { 1.0 };
                vx = brain.facing * profile.chase_speed;
                if profile.fire_cooldown > 0 {
                    brain.shoot_timer += 1;
                    if brain.shoot_timer > profile.fire_cooldown {
                        brain.shoot_timer = 0;
                        let muzzle = Vec2::new(center.x, body.pos().y + 20.0);
                        let jitter = rng.random_range(-0.1..0.1);
                        let angle = (target.center - muzzle).to_angle() + jitter;
                        cmds.shots.push(ShotRequest::aimed(
                            id,
                            Faction::Hostile,
                            muzzle,
                            angle,
                            profile.shot_speed,
                            1,
                        ));
                    }
                }
            }
            None => {
                brain.shoot_timer = 0;
                if brain.patrol_timer == 0 {
                    brain.patrol_timer = rng.random_range(60..120);
                    brain.facing = if rng.random_bool(0.5) { -1.0 } else { 1.0 };
                }
                brain.patrol_timer -= 1;
                vx = brain.facing * profile.patrol_speed;
            }
        }
    }

    if body.grounded && vx != 0.0 && obstacle_ahead(ctx.grid, body, vx) {
        vx = 0.0;
        brain.facing = -brain.facing;
        brain.blocked_timer = 60;
    }
    body.set_vel_x(vx);
    false
}

/// Wall in front of the leading edge, or no floor under it
fn obstacle_ahead(grid: &TileGrid, body: &PhysicsBody, vx: f32) -> bool {
    let pos = body.pos();
    let size = body.size();
    let next_x = pos.x + vx * SIM_DT;
    let lead_x = if vx > 0.0 { next_x + size.x } else { next_x };
    let col = (lead_x / grid.tile_size()).floor() as i64;
    if col < 0 || col >= grid.width_tiles() as i64 {
        return true;
    }
    let (r0, r1) = grid.span(pos.y, size.y);
    let wall = (r0..=r1).any(|row| grid.is_solid(col, row));
    let below = ((pos.y + size.y + 2.0) / grid.tile_size()).floor() as i64;
    let ledge = !grid.is_solid(col, below);
    wall || ledge
}

fn update_flyer(
    id: EntityId,
    brain: &mut FlyerBrain,
    body: &mut PhysicsBody,
    ctx: &AiContext,
    rng: &mut Pcg32,
    cmds: &mut Commands,
) {
    brain.age += 1;
    let center = body.center();
    let mut target_vel = Vec2::ZERO;

    match ctx.nearest_target(center) {
        Some((target, dist)) if dist < FLYER_AGGRO_RADIUS => {
            let offset = target.center - center - Vec2::new(0.0, FLYER_HOVER_HEIGHT);
            target_vel = offset * 1.2;
            brain.shoot_timer += 1;
            if brain.shoot_timer >= FLYER_FIRE_COOLDOWN_TICKS {
                brain.shoot_timer = 0;
                let jitter = rng.random_range(-0.1..0.1);
                let angle = (target.center - center).to_angle() + jitter;
                cmds.shots.push(ShotRequest::aimed(id, Faction::Hostile, center, angle, 480.0, 1));
            }
        }
        _ => {
            target_vel.y = (brain.age as f32 * 0.08).sin() * 60.0;
        }
    }

    // Back off from terrain ahead
    let probe = center + target_vel * SIM_DT * 4.0;
    let (col, row) = ctx.grid.cell_of(probe);
    if ctx.grid.is_solid(col, row) {
        target_vel *= -1.5;
    }

    let vel = body.vel();
    body.set_velocity(vel + (target_vel - vel) * 0.1);
}

/// Projectile step. Returns false once the projectile has expired.
fn update_projectile(data: &mut ProjectileData, body: &mut PhysicsBody, ctx: &AiContext) -> bool {
    data.ttl = data.ttl.saturating_sub(1);
    if data.ttl == 0 {
        return false;
    }
    match &mut data.motion {
        ProjectileMotion::Straight => {}
        ProjectileMotion::Wave { phase } => {
            *phase += 1;
            body.set_vel_y((*phase as f32 * 0.2).cos() * 240.0);
        }
        ProjectileMotion::Boomerang { returning } => {
            let vel = body.vel();
            if !*returning {
                body.set_vel_x(vel.x * 0.95);
                if vel.x.abs() < 60.0 {
                    *returning = true;
                }
            } else {
                let Some(owner) = ctx.target(data.owner) else {
                    return false;
                };
                let to_owner = owner.center - body.center();
                if to_owner.length() < 20.0 {
                    return false;
                }
                body.set_velocity(to_owner.normalize_or_zero() * 900.0);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::WeaponKind;
    use crate::sim::tiles::Biome;
    use rand::SeedableRng;

    fn flat_grid() -> TileGrid {
        let mut g = TileGrid::new(30, 12, 40.0, Biome::Forest);
        for col in 0..30 {
            g.set(col, 11, TileKind::Stone);
        }
        g
    }

    #[test]
    fn test_nearest_target() {
        let g = flat_grid();
        let targets = [
            Target { id: 1, slot: 0, center: Vec2::new(100.0, 0.0) },
            Target { id: 2, slot: 1, center: Vec2::new(300.0, 0.0) },
        ];
        let ctx = AiContext { grid: &g, targets: &targets };
        let (t, d) = ctx.nearest_target(Vec2::new(250.0, 0.0)).unwrap();
        assert_eq!(t.id, 2);
        assert_eq!(d, 50.0);
    }

    #[test]
    fn test_player_fires_on_cooldown() {
        let g = flat_grid();
        let ctx = AiContext { grid: &g, targets: &[] };
        let mut p = Entity::player(1, 0, 0, WeaponKind::Gun, Vec2::new(80.0, 410.0));
        let mut rng = Pcg32::seed_from_u64(1);
        let mut cmds = Commands::default();
        let input = PlayerInput { fire: true, ..Default::default() };
        for _ in 0..10 {
            update(&mut p, &input, &ctx, &mut rng, &mut cmds);
        }
        // Cooldown of ten ticks: fired on the first tick only
        assert_eq!(cmds.shots.len(), 1);
        assert_eq!(cmds.shots[0].faction, Faction::Squad);
        assert!(cmds.shots[0].vel.x > 0.0);
    }

    #[test]
    fn test_grunt_turns_at_wall() {
        let mut g = flat_grid();
        g.set(5, 10, TileKind::Stone);
        let ctx = AiContext { grid: &g, targets: &[] };
        let mut e = Entity::enemy(1, EnemyVariant::Grunt, Vec2::new(158.0, 380.0));
        e.body.grounded = true;
        if let EntityKind::Enemy(brain) = &mut e.kind {
            brain.facing = 1.0;
            brain.patrol_timer = 100;
        }
        let mut rng = Pcg32::seed_from_u64(1);
        let mut cmds = Commands::default();
        update(&mut e, &PlayerInput::default(), &ctx, &mut rng, &mut cmds);
        let EntityKind::Enemy(brain) = &e.kind else { panic!("not an enemy") };
        assert_eq!(brain.facing, -1.0);
        assert_eq!(brain.blocked_timer, 60);
        assert_eq!(e.body.vel().x, 0.0);
    }

    #[test]
    fn test_kamikaze_detonates_near_player() {
        let g = flat_grid();
        let targets = [Target { id: 9, slot: 0, center: Vec2::new(140.0, 410.0) }];
        let ctx = AiContext { grid: &g, targets: &targets };
        let mut e = Entity::enemy(1, EnemyVariant::Kamikaze, Vec2::new(100.0, 380.0));
        let mut rng = Pcg32::seed_from_u64(1);
        let mut cmds = Commands::default();
        update(&mut e, &PlayerInput::default(), &ctx, &mut rng, &mut cmds);
        assert!(!e.alive);
        assert_eq!(cmds.explosions.len(), 1);
    }

    #[test]
    fn test_projectile_expires() {
        let g = flat_grid();
        let ctx = AiContext { grid: &g, targets: &[] };
        let shot = ShotRequest::aimed(1, Faction::Hostile, Vec2::new(100.0, 100.0), 0.0, 480.0, 1);
        let mut e = shot.into_entity(2);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut cmds = Commands::default();
        for _ in 0..79 {
            update(&mut e, &PlayerInput::default(), &ctx, &mut rng, &mut cmds);
        }
        assert!(e.alive);
        update(&mut e, &PlayerInput::default(), &ctx, &mut rng, &mut cmds);
        assert!(!e.alive);
    }
}
