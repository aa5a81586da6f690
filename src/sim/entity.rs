//! Entity records
//!
//! An entity is a [`PhysicsBody`] plus a kind-specific payload. Kinds are a
//! closed enum; behaviour dispatch is a `match` in [`super::ai`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::boss::{BossBrain, BossPhase};
use super::physics::PhysicsBody;
use crate::consts::*;

pub type EntityId = u32;

/// Bounding box of a flying enemy
pub const FLYER_SIZE: Vec2 = Vec2::new(40.0, 40.0);

/// Which side a projectile or body fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Squad,
    Hostile,
}

/// Kind tag without payload, for snapshots and queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    Player,
    Enemy,
    FlyingEnemy,
    Boss,
    Projectile,
    Particle,
    Item,
}

/// Player weapon families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Gun,
    Laser,
    Spread,
    Magic,
    Boomerang,
    Melee,
}

/// Projectile parameters for one weapon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponProfile {
    pub speed: f32,
    pub size: Vec2,
    pub damage: i32,
    pub ttl_ticks: u32,
    pub cooldown_ticks: u32,
    /// Projectiles per trigger pull
    pub pellets: u32,
    /// Vertical speed step between pellets
    pub pellet_spread: f32,
    pub motion: ProjectileMotion,
}

impl WeaponKind {
    pub fn profile(self) -> WeaponProfile {
        let base = WeaponProfile {
            speed: 900.0,
            size: Vec2::new(15.0, 5.0),
            damage: 1,
            ttl_ticks: 80,
            cooldown_ticks: 10,
            pellets: 1,
            pellet_spread: 0.0,
            motion: ProjectileMotion::Straight,
        };
        match self {
            WeaponKind::Gun => base,
            WeaponKind::Laser => WeaponProfile {
                speed: 1500.0,
                size: Vec2::new(40.0, 5.0),
                damage: 2,
                ..base
            },
            WeaponKind::Spread => WeaponProfile {
                size: Vec2::new(8.0, 8.0),
                pellets: 3,
                pellet_spread: 120.0,
                cooldown_ticks: 14,
                ..base
            },
            WeaponKind::Magic => WeaponProfile {
                speed: 720.0,
                size: Vec2::new(10.0, 10.0),
                damage: 2,
                motion: ProjectileMotion::Wave { phase: 0 },
                ..base
            },
            WeaponKind::Boomerang => WeaponProfile {
                size: Vec2::new(20.0, 20.0),
                damage: 2,
                ttl_ticks: 100,
                motion: ProjectileMotion::Boomerang { returning: false },
                ..base
            },
            WeaponKind::Melee => WeaponProfile {
                speed: 300.0,
                size: Vec2::new(40.0, 40.0),
                damage: 4,
                ttl_ticks: 12,
                cooldown_ticks: 20,
                ..base
            },
        }
    }
}

/// How a projectile moves beyond plain ballistic flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileMotion {
    Straight,
    /// Sine bob around the firing height
    Wave { phase: u32 },
    /// Decelerates, then homes back to its owner
    Boomerang { returning: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileData {
    pub owner: EntityId,
    /// Player slot credited with kills
    pub owner_slot: Option<usize>,
    pub faction: Faction,
    pub damage: i32,
    pub ttl: u32,
    /// Dirt tiles hit by this projectile are removed at commit
    pub breaks_tiles: bool,
    pub motion: ProjectileMotion,
}

/// Ground enemy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyVariant {
    Grunt,
    Kamikaze,
    Sniper,
    Heavy,
    ShieldBearer,
}

/// Tuning for a ground enemy variant (speeds in px/s, timers in ticks)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyProfile {
    pub health: i32,
    pub size: Vec2,
    pub patrol_speed: f32,
    pub chase_speed: f32,
    pub aggro_radius: f32,
    pub fire_cooldown: u32,
    pub shot_speed: f32,
}

impl EnemyVariant {
    pub fn profile(self) -> EnemyProfile {
        let grunt = EnemyProfile {
            health: 3,
            size: Vec2::new(40.0, 60.0),
            patrol_speed: 120.0,
            chase_speed: 180.0,
            aggro_radius: GRUNT_AGGRO_RADIUS,
            fire_cooldown: 60,
            shot_speed: 480.0,
        };
        match self {
            EnemyVariant::Grunt => grunt,
            EnemyVariant::Kamikaze => EnemyProfile {
                health: 1,
                patrol_speed: 240.0,
                chase_speed: 300.0,
                fire_cooldown: 0,
                ..grunt
            },
            EnemyVariant::Sniper => EnemyProfile {
                health: 2,
                patrol_speed: 60.0,
                chase_speed: 0.0,
                aggro_radius: 800.0,
                fire_cooldown: 180,
                shot_speed: 1200.0,
                ..grunt
            },
            EnemyVariant::Heavy => EnemyProfile {
                health: 10,
                size: Vec2::new(50.0, 70.0),
                patrol_speed: 0.0,
                chase_speed: 0.0,
                aggro_radius: 500.0,
                fire_cooldown: 10,
                shot_speed: 600.0,
            },
            EnemyVariant::ShieldBearer => EnemyProfile {
                health: 8,
                patrol_speed: 60.0,
                chase_speed: 60.0,
                ..grunt
            },
        }
    }
}

/// Ground enemy behaviour state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundBrain {
    pub variant: EnemyVariant,
    /// -1 or 1
    pub facing: f32,
    /// Ticks until the next patrol direction roll
    pub patrol_timer: u32,
    /// Ticks of forced movement after turning at a wall or ledge
    pub blocked_timer: u32,
    pub shoot_timer: u32,
    pub chasing: bool,
}

impl GroundBrain {
    pub fn new(variant: EnemyVariant) -> Self {
        Self {
            variant,
            facing: -1.0,
            patrol_timer: 0,
            blocked_timer: 0,
            shoot_timer: 0,
            chasing: false,
        }
    }
}

/// Flying enemy behaviour state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyerBrain {
    pub shoot_timer: u32,
    /// Ticks alive, drives the idle hover
    pub age: u32,
}

/// Player slot payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub slot: usize,
    /// Index into the hero catalogue
    pub hero: usize,
    pub weapon: WeaponKind,
    pub facing: f32,
    pub fire_cooldown: u32,
    pub invincible_ticks: u32,
    pub downed: bool,
    pub climbing: bool,
}

/// Collectables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Health,
    /// Caged hero; freeing it counts a rescue
    Rescue,
    /// Boss drop; touching it clears the level
    Extraction,
}

impl ItemKind {
    pub fn size(self) -> Vec2 {
        match self {
            ItemKind::Extraction => Vec2::new(120.0, 60.0),
            ItemKind::Rescue => Vec2::new(40.0, 40.0),
            ItemKind::Health => Vec2::new(20.0, 20.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player(PlayerData),
    Enemy(GroundBrain),
    FlyingEnemy(FlyerBrain),
    Boss(BossBrain),
    Projectile(ProjectileData),
    Particle { ttl: u32 },
    Item(ItemKind),
}

impl EntityKind {
    pub fn tag(&self) -> EntityTag {
        match self {
            EntityKind::Player(_) => EntityTag::Player,
            EntityKind::Enemy(_) => EntityTag::Enemy,
            EntityKind::FlyingEnemy(_) => EntityTag::FlyingEnemy,
            EntityKind::Boss(_) => EntityTag::Boss,
            EntityKind::Projectile(_) => EntityTag::Projectile,
            EntityKind::Particle { .. } => EntityTag::Particle,
            EntityKind::Item(_) => EntityTag::Item,
        }
    }
}

/// A live actor in the level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub body: PhysicsBody,
    pub health: i32,
    pub max_health: i32,
    pub kind: EntityKind,
    /// Cleared when the entity is destroyed; removal happens at commit
    pub alive: bool,
    /// Player slot that landed the latest hit
    #[serde(default)]
    pub last_hit_slot: Option<usize>,
}

impl Entity {
    fn with(id: EntityId, body: PhysicsBody, health: i32, kind: EntityKind) -> Self {
        Self {
            id,
            body,
            health,
            max_health: health,
            kind,
            alive: true,
            last_hit_slot: None,
        }
    }

    pub fn player(id: EntityId, slot: usize, hero: usize, weapon: WeaponKind, pos: Vec2) -> Self {
        let body = PhysicsBody::new(pos, Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT));
        let data = PlayerData {
            slot,
            hero,
            weapon,
            facing: 1.0,
            fire_cooldown: 0,
            invincible_ticks: 0,
            downed: false,
            climbing: false,
        };
        Self::with(id, body, PLAYER_MAX_HEALTH, EntityKind::Player(data))
    }

    pub fn enemy(id: EntityId, variant: EnemyVariant, pos: Vec2) -> Self {
        let profile = variant.profile();
        let body = PhysicsBody::new(pos, profile.size);
        Self::with(id, body, profile.health, EntityKind::Enemy(GroundBrain::new(variant)))
    }

    pub fn flyer(id: EntityId, pos: Vec2) -> Self {
        let body = PhysicsBody::floating(pos, FLYER_SIZE);
        let brain = FlyerBrain {
            shoot_timer: 0,
            age: 0,
        };
        Self::with(id, body, 2, EntityKind::FlyingEnemy(brain))
    }

    pub fn boss(id: EntityId, brain: BossBrain, pos: Vec2) -> Self {
        let mut body = PhysicsBody::floating(pos, brain.variant.size());
        body.collides = false;
        let health = brain.variant.max_health(brain.level);
        Self::with(id, body, health, EntityKind::Boss(brain))
    }

    pub fn projectile(id: EntityId, pos: Vec2, size: Vec2, vel: Vec2, data: ProjectileData) -> Self {
        let mut body = PhysicsBody::floating(pos, size);
        body.set_velocity(vel);
        Self::with(id, body, 1, EntityKind::Projectile(data))
    }

    pub fn particle(id: EntityId, pos: Vec2, vel: Vec2, ttl: u32) -> Self {
        let mut body = PhysicsBody::new(pos, Vec2::splat(4.0));
        body.collides = false;
        body.gravity_scale = 0.5;
        body.set_velocity(vel);
        Self::with(id, body, 1, EntityKind::Particle { ttl })
    }

    pub fn item(id: EntityId, kind: ItemKind, pos: Vec2) -> Self {
        let size = kind.size();
        let body = match kind {
            // Cages hang from their island
            ItemKind::Rescue => PhysicsBody::floating(pos, size),
            ItemKind::Health | ItemKind::Extraction => PhysicsBody::new(pos, size),
        };
        Self::with(id, body, 1, EntityKind::Item(kind))
    }

    #[inline]
    pub fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    /// Hostile body that hurts players on contact
    pub fn is_hostile_body(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Enemy(_) | EntityKind::FlyingEnemy(_) | EntityKind::Boss(_)
        )
    }

    /// Player that can act this tick
    pub fn is_active_player(&self) -> bool {
        matches!(&self.kind, EntityKind::Player(p) if !p.downed) && self.alive
    }

    /// Apply damage from a hit arriving from `source_x`. Returns the damage
    /// actually dealt.
    pub fn apply_damage(&mut self, amount: i32, source_x: f32) -> i32 {
        if !self.alive || amount <= 0 {
            return 0;
        }
        let center_x = self.body.center().x;
        let dealt = match &mut self.kind {
            EntityKind::Player(p) => {
                if p.downed || p.invincible_ticks > 0 {
                    return 0;
                }
                p.invincible_ticks = PLAYER_HIT_GRACE_TICKS;
                amount
            }
            EntityKind::Enemy(brain) if brain.variant == EnemyVariant::ShieldBearer => {
                let from_front = (source_x - center_x).signum() == brain.facing;
                if from_front {
                    // 10% rounded up so a blocked hit still chips
                    (amount + 9) / 10
                } else {
                    amount
                }
            }
            EntityKind::Enemy(brain) => {
                brain.blocked_timer = brain.blocked_timer.max(10);
                amount
            }
            EntityKind::Boss(brain) => match brain.phase {
                BossPhase::Idle | BossPhase::Defeated => return 0,
                BossPhase::Vulnerable => amount * 2,
                BossPhase::Attack => amount,
            },
            EntityKind::FlyingEnemy(_) => amount,
            EntityKind::Projectile(_) | EntityKind::Particle { .. } | EntityKind::Item(_) => {
                return 0;
            }
        };
        self.health = (self.health - dealt).max(0);
        dealt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::BossVariant;

    #[test]
    fn test_shield_blocks_frontal_hits() {
        let mut e = Entity::enemy(1, EnemyVariant::ShieldBearer, Vec2::new(100.0, 0.0));
        // Facing left, hit from the left
        assert_eq!(e.apply_damage(10, 0.0), 1);
        assert_eq!(e.health, 7);
        // Hit from behind
        assert_eq!(e.apply_damage(3, 500.0), 3);
        assert_eq!(e.health, 4);
    }

    #[test]
    fn test_player_invincibility_after_hit() {
        let mut p = Entity::player(1, 0, 0, WeaponKind::Gun, Vec2::ZERO);
        assert_eq!(p.apply_damage(1, 0.0), 1);
        assert_eq!(p.apply_damage(1, 0.0), 0);
        assert_eq!(p.health, PLAYER_MAX_HEALTH - 1);
    }

    #[test]
    fn test_boss_damage_depends_on_phase() {
        let brain = BossBrain::new(BossVariant::Ground, 1);
        let mut b = Entity::boss(1, brain, Vec2::ZERO);
        let full = b.health;
        assert_eq!(b.apply_damage(5, 0.0), 0);
        if let EntityKind::Boss(brain) = &mut b.kind {
            brain.phase = BossPhase::Vulnerable;
        }
        assert_eq!(b.apply_damage(5, 0.0), 10);
        assert_eq!(b.health, full - 10);
    }

    #[test]
    fn test_weapon_profiles() {
        assert_eq!(WeaponKind::Spread.profile().pellets, 3);
        assert!(WeaponKind::Laser.profile().speed > WeaponKind::Gun.profile().speed);
        assert_eq!(WeaponKind::Gun.profile().ttl_ticks, 80);
    }
}
