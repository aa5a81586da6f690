//! Boss phase machine and attack patterns
//!
//! Bosses move through `Idle -> Attack <-> Vulnerable -> Defeated`. Every phase
//! change goes through [`BossBrain::transition`], which refuses edges that are
//! not in the allowed table.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ai::{AiContext, Commands, ShotRequest};
use super::entity::{EntityId, Faction, ProjectileMotion};
use super::physics::PhysicsBody;
use super::world::GameEvent;
use crate::consts::BOSS_WAKE_DISTANCE;

/// Ticks a boss stays open to double damage
pub const VULNERABLE_TICKS: u32 = 120;
/// Attack volleys before a boss exposes itself
pub const VOLLEYS_PER_CYCLE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossPhase {
    /// Dormant until a player comes close; takes no damage
    Idle,
    Attack,
    /// Stops attacking and takes double damage
    Vulnerable,
    Defeated,
}

impl BossPhase {
    /// Allowed edges of the phase machine
    pub fn can_transition(self, to: BossPhase) -> bool {
        use BossPhase::*;
        matches!(
            (self, to),
            (Idle, Attack)
                | (Attack, Vulnerable)
                | (Attack, Defeated)
                | (Vulnerable, Attack)
                | (Vulnerable, Defeated)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossVariant {
    /// Hovering ground boss with aimed volleys
    Ground,
    /// Helicopter with minigun and bombs
    Helicopter,
}

impl BossVariant {
    pub fn size(self) -> Vec2 {
        match self {
            BossVariant::Ground => Vec2::new(120.0, 120.0),
            BossVariant::Helicopter => Vec2::new(150.0, 80.0),
        }
    }

    pub fn max_health(self, level: u32) -> i32 {
        let level = level as i32;
        match self {
            BossVariant::Ground => 50 + 15 * level,
            BossVariant::Helicopter => 200 + 20 * level,
        }
    }

    /// Variant for a level below the arena threshold
    pub fn for_level(level: u32) -> Self {
        if level >= 4 && level % 2 == 0 {
            BossVariant::Helicopter
        } else {
            BossVariant::Ground
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossBrain {
    pub variant: BossVariant,
    pub level: u32,
    pub phase: BossPhase,
    /// Ticks spent in the current phase
    pub phase_ticks: u32,
    pub fire_timer: u32,
    pub volleys: u32,
    /// Hover direction for the ground boss (-1 or 1)
    pub dir_y: f32,
    /// Spawn height the hover is centred on
    pub home_y: f32,
    /// Helicopter chase target, refreshed once a second
    pub target_x: f32,
}

impl BossBrain {
    pub fn new(variant: BossVariant, level: u32) -> Self {
        Self {
            variant,
            level,
            phase: BossPhase::Idle,
            phase_ticks: 0,
            fire_timer: 0,
            volleys: 0,
            dir_y: 1.0,
            home_y: 0.0,
            target_x: 0.0,
        }
    }

    /// Move to `to` if the edge is allowed. Returns false otherwise.
    pub fn transition(&mut self, id: EntityId, to: BossPhase) -> bool {
        if !self.phase.can_transition(to) {
            log::warn!("boss {id}: refused phase change {:?} -> {:?}", self.phase, to);
            return false;
        }
        log::debug!("boss {id}: {:?} -> {:?}", self.phase, to);
        self.phase = to;
        self.phase_ticks = 0;
        self.fire_timer = 0;
        true
    }

    /// Ticks between ground boss volleys
    fn fire_rate(&self) -> u32 {
        match self.level {
            15.. => 40,
            10.. => 60,
            5.. => 80,
            _ => 100,
        }
    }

    fn bomb_rate(&self) -> u32 {
        if self.level >= 10 { 120 } else { 180 }
    }
}

/// Run one tick of boss behaviour: phase bookkeeping, movement intent and attacks
pub fn update(
    id: EntityId,
    brain: &mut BossBrain,
    body: &mut PhysicsBody,
    ctx: &AiContext,
    rng: &mut Pcg32,
    cmds: &mut Commands,
) {
    brain.phase_ticks += 1;
    let center = body.center();

    match brain.phase {
        BossPhase::Idle => {
            body.set_velocity(Vec2::ZERO);
            let woken = ctx
                .targets
                .iter()
                .any(|t| (t.center.x - center.x).abs() < BOSS_WAKE_DISTANCE);
            if woken && brain.transition(id, BossPhase::Attack) {
                brain.home_y = body.pos().y;
                brain.target_x = body.pos().x;
                cmds.events.push(GameEvent::BossAwake { id });
            }
        }
        BossPhase::Attack => {
            let Some((target, _)) = ctx.nearest_target(center) else {
                body.set_velocity(Vec2::ZERO);
                return;
            };
            let aim = target.center;
            match brain.variant {
                BossVariant::Ground => ground_attack(id, brain, body, aim, cmds),
                BossVariant::Helicopter => heli_attack(id, brain, body, aim, rng, cmds),
            }
            if brain.volleys >= VOLLEYS_PER_CYCLE {
                brain.volleys = 0;
                if brain.transition(id, BossPhase::Vulnerable) {
                    cmds.events.push(GameEvent::BossPhaseChanged {
                        id,
                        phase: BossPhase::Vulnerable,
                    });
                }
            }
        }
        BossPhase::Vulnerable => {
            body.set_velocity(Vec2::ZERO);
            if brain.phase_ticks >= VULNERABLE_TICKS && brain.transition(id, BossPhase::Attack) {
                cmds.events.push(GameEvent::BossPhaseChanged {
                    id,
                    phase: BossPhase::Attack,
                });
            }
        }
        BossPhase::Defeated => {
            body.set_velocity(Vec2::ZERO);
        }
    }
}

fn ground_attack(id: EntityId, brain: &mut BossBrain, body: &mut PhysicsBody, aim: Vec2, cmds: &mut Commands) {
    // Hover band around the spawn height
    let y = body.pos().y;
    if y > brain.home_y + 40.0 {
        brain.dir_y = -1.0;
    } else if y < brain.home_y - 160.0 {
        brain.dir_y = 1.0;
    }
    body.set_velocity(Vec2::new(0.0, brain.dir_y * 120.0));

    brain.fire_timer += 1;
    if brain.fire_timer <= brain.fire_rate() {
        return;
    }
    brain.fire_timer = 0;
    brain.volleys += 1;

    let origin = body.center();
    let angle = (aim - origin).to_angle();
    let speed = (8.0 + brain.level as f32 * 0.2) * 60.0;
    let mut offsets = vec![0.0];
    if brain.level >= 3 {
        offsets.extend([-0.2, 0.2]);
    }
    if brain.level >= 6 {
        offsets.extend([-0.4, 0.4]);
    }
    for offset in offsets {
        cmds.shots.push(ShotRequest::aimed(id, Faction::Hostile, origin, angle + offset, speed, 2));
    }
}

fn heli_attack(
    id: EntityId,
    brain: &mut BossBrain,
    body: &mut PhysicsBody,
    aim: Vec2,
    rng: &mut Pcg32,
    cmds: &mut Commands,
) {
    if brain.phase_ticks % 60 == 0 {
        brain.target_x = aim.x;
    }
    let pos = body.pos();
    let mut vx = (brain.target_x - pos.x) * 1.2;
    if brain.level >= 15 {
        vx += (aim.x - pos.x) * 0.6;
    }
    let vy = (brain.phase_ticks as f32 * 0.05).sin() * 120.0;
    body.set_velocity(Vec2::new(vx, vy));

    let origin = body.center() + Vec2::new(0.0, 20.0);
    if brain.phase_ticks % 10 == 0 {
        let jitter = rng.random_range(-0.1..0.1);
        let angle = (aim - origin).to_angle() + jitter;
        cmds.shots.push(ShotRequest::aimed(id, Faction::Hostile, origin, angle, 900.0, 1));
    }

    brain.fire_timer += 1;
    if brain.fire_timer >= brain.bomb_rate() {
        brain.fire_timer = 0;
        brain.volleys += 1;
        let toss = if brain.level >= 5 { (aim.x - pos.x) * 3.0 } else { 0.0 };
        let bottom = Vec2::new(body.center().x, pos.y + body.size().y);
        cmds.shots.push(ShotRequest {
            owner: id,
            owner_slot: None,
            faction: Faction::Hostile,
            pos: bottom,
            size: Vec2::splat(20.0),
            vel: Vec2::new(toss, 0.0),
            damage: 2,
            ttl: 240,
            motion: ProjectileMotion::Straight,
            gravity: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_edges() {
        use BossPhase::*;
        assert!(Idle.can_transition(Attack));
        assert!(Attack.can_transition(Vulnerable));
        assert!(Vulnerable.can_transition(Defeated));
        assert!(!Idle.can_transition(Defeated));
        assert!(!Defeated.can_transition(Attack));
        assert!(!Vulnerable.can_transition(Idle));
    }

    #[test]
    fn test_refused_transition_keeps_phase() {
        let mut brain = BossBrain::new(BossVariant::Ground, 1);
        assert!(!brain.transition(1, BossPhase::Defeated));
        assert_eq!(brain.phase, BossPhase::Idle);
        assert!(brain.transition(1, BossPhase::Attack));
        assert_eq!(brain.phase, BossPhase::Attack);
    }

    #[test]
    fn test_variant_for_level() {
        assert_eq!(BossVariant::for_level(1), BossVariant::Ground);
        assert_eq!(BossVariant::for_level(2), BossVariant::Ground);
        assert_eq!(BossVariant::for_level(4), BossVariant::Helicopter);
        assert_eq!(BossVariant::for_level(7), BossVariant::Ground);
        assert_eq!(BossVariant::Ground.max_health(2), 80);
    }
}
