//! The live level: tile grid plus every entity in it
//!
//! One [`World::step`] runs, in order: behaviours for every entity, physics for
//! every entity, interactions, deaths, then a single commit that applies tile
//! breaks, drops dead entities and adds new ones. Nothing is inserted into or
//! removed from the entity list before the commit.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ai::{self, AiContext, Commands, Target};
use super::boss::{BossBrain, BossPhase};
use super::entity::{Entity, EntityId, EntityKind, EntityTag, Faction, ItemKind, ProjectileMotion, WeaponKind};
use super::collision::depenetrate;
use super::level::{Level, SpawnKind};
use super::physics::integrate;
use super::tick::PlayerInput;
use super::tiles::{TileCoord, TileGrid, TileKind};
use crate::consts::*;
use crate::rect_intersect;

/// Ticks between a boss going down and the level counting as cleared
pub const EXTRACTION_DELAY_TICKS: u32 = 180;
/// Damage from touching a hazard tile
const HAZARD_DAMAGE: i32 = 1;
/// Gap between squad members at a spawn point
const SLOT_SPACING: f32 = PLAYER_WIDTH + 8.0;

/// Something that happened during a step, for the driver and the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    ProjectileFired { owner: EntityId },
    EnemyKilled { id: EntityId, tag: EntityTag, by_slot: Option<usize> },
    BossAwake { id: EntityId },
    BossPhaseChanged { id: EntityId, phase: BossPhase },
    BossDefeated { id: EntityId, by_slot: Option<usize> },
    HeroRescued { slot: usize },
    ItemCollected { slot: usize, item: ItemKind },
    CheckpointReached { tile: TileCoord },
    PlayerDowned { slot: usize },
    PlayerRevived { slot: usize },
    SquadRespawned { lives_left: u32 },
    SquadDefeated,
    LevelComplete,
}

/// Counters for conditions that are absorbed rather than surfaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Non-finite position/velocity writes that were discarded
    pub rejected_updates: u64,
    /// Non-player entities removed for leaving the world
    pub left_world: u64,
}

/// Per-slot tallies for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStats {
    pub kills: u32,
    pub rescues: u32,
    pub downs: u32,
    pub score: u32,
}

/// A player entering a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquadMember {
    pub slot: usize,
    pub hero: usize,
    pub weapon: WeaponKind,
}

pub struct World {
    level_index: u32,
    grid: TileGrid,
    /// Sorted by id
    entities: Vec<Entity>,
    next_id: EntityId,
    rng: Pcg32,
    spawn_point: Vec2,
    last_checkpoint: Option<TileCoord>,
    lives: u32,
    extraction_countdown: Option<u32>,
    level_complete: bool,
    squad_defeated: bool,
    max_particles: usize,
    ticks: u64,
    stats: [SlotStats; MAX_PLAYERS],
    diagnostics: Diagnostics,
    events: Vec<GameEvent>,
}

impl World {
    /// Populate a world from a generated level
    pub fn new(level: Level, squad: &[SquadMember], lives: u32, seed: u64, max_particles: usize) -> Self {
        let Level {
            index,
            grid,
            spawns,
            player_spawn,
        } = level;
        let mut world = Self::empty(grid, index, seed, max_particles);
        world.lives = lives;
        world.spawn_point = player_spawn;

        for member in squad {
            let pos = world.slot_position(member.slot);
            world.add_entity(|id| Entity::player(id, member.slot, member.hero, member.weapon, pos));
        }
        for spawn in spawns {
            let pos = spawn.pos;
            match spawn.kind {
                SpawnKind::Enemy(variant) => world.add_entity(|id| Entity::enemy(id, variant, pos)),
                SpawnKind::Flyer => world.add_entity(|id| Entity::flyer(id, pos)),
                SpawnKind::Boss(variant) => {
                    world.add_entity(|id| Entity::boss(id, BossBrain::new(variant, index), pos))
                }
                SpawnKind::Item(kind) => world.add_entity(|id| Entity::item(id, kind, pos)),
            };
        }
        world
    }

    /// A world over `grid` with no entities
    pub(crate) fn sandbox(grid: TileGrid, seed: u64) -> Self {
        let mut world = Self::empty(grid, 1, seed, MAX_PARTICLES);
        world.spawn_point = Vec2::splat(world.grid.tile_size() * 2.0);
        world
    }

    fn empty(grid: TileGrid, level_index: u32, seed: u64, max_particles: usize) -> Self {
        Self {
            level_index,
            grid,
            entities: Vec::new(),
            next_id: 1,
            rng: Pcg32::seed_from_u64(seed ^ 0x5EED_0F_F00D),
            spawn_point: Vec2::ZERO,
            last_checkpoint: None,
            lives: STARTING_LIVES,
            extraction_countdown: None,
            level_complete: false,
            squad_defeated: false,
            max_particles,
            ticks: 0,
            stats: [SlotStats::default(); MAX_PLAYERS],
            diagnostics: Diagnostics::default(),
            events: Vec::new(),
        }
    }

    /// Insert an entity outside of a step. The closure receives the new id.
    pub(crate) fn add_entity(&mut self, make: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.next_entity_id();
        self.entities.push(make(id));
        id
    }

    fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Where a squad member appears: beside the spawn point on whichever side
    /// is clear of terrain, or on the spawn point itself
    fn slot_position(&self, slot: usize) -> Vec2 {
        let base = self.spawn_point;
        let offset = Vec2::new(slot as f32 * SLOT_SPACING, 0.0);
        let size = Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT);
        [base + offset, base - offset]
            .into_iter()
            .find(|&p| p.x >= 0.0 && p.x + size.x <= self.grid.pixel_width() && !self.grid.overlaps_solid(p, size))
            .unwrap_or(base)
    }

    /// Nearest spot around `pos` where a box of `size` does not overlap terrain
    fn clear_spot(&self, pos: Vec2, size: Vec2) -> Vec2 {
        depenetrate(&self.grid, pos, size).unwrap_or(pos)
    }

    pub fn level_index(&self) -> u32 {
        self.level_index
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &self.entities[i])
    }

    /// Position and velocity still go through the body's checked setters
    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|i| &mut self.entities[i])
    }

    pub fn count(&self, tag: EntityTag) -> usize {
        self.entities.iter().filter(|e| e.tag() == tag).count()
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn spawn_point(&self) -> Vec2 {
        self.spawn_point
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_level_complete(&self) -> bool {
        self.level_complete
    }

    pub fn is_squad_defeated(&self) -> bool {
        self.squad_defeated
    }

    pub fn stats(&self) -> &[SlotStats; MAX_PLAYERS] {
        &self.stats
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// The level's boss, while it is alive
    pub fn boss(&self) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| matches!(e.kind, EntityKind::Boss(_)) && e.alive)
    }

    /// A boss is awake and fighting
    pub fn boss_engaged(&self) -> bool {
        self.boss().is_some_and(|e| {
            matches!(&e.kind, EntityKind::Boss(b) if matches!(b.phase, BossPhase::Attack | BossPhase::Vulnerable))
        })
    }

    /// Events produced since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Squad score for the level so far
    pub fn score(&self) -> u32 {
        self.stats.iter().map(|s| s.score).sum()
    }

    /// Mark the level cleared and pay the clear bonus to everyone in it
    pub(crate) fn complete_level(&mut self) {
        if self.level_complete {
            return;
        }
        self.level_complete = true;
        for entity in &self.entities {
            if let EntityKind::Player(p) = &entity.kind {
                self.stats[p.slot].score += LEVEL_CLEAR_SCORE;
            }
        }
        self.events.push(GameEvent::LevelComplete);
    }

    fn targets(&self) -> Vec<Target> {
        self.entities
            .iter()
            .filter(|e| e.is_active_player())
            .filter_map(|e| match &e.kind {
                EntityKind::Player(p) => Some(Target {
                    id: e.id,
                    slot: p.slot,
                    center: e.body.center(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Advance the world by one fixed tick
    pub fn step(&mut self, inputs: &[PlayerInput]) {
        if self.squad_defeated {
            return;
        }
        self.ticks += 1;
        let mut cmds = Commands::default();

        self.run_behaviours(inputs, &mut cmds);
        self.run_physics(&mut cmds);
        self.resolve_projectile_hits();
        self.resolve_explosions(&cmds);
        self.resolve_player_contacts();
        self.resolve_deaths(&mut cmds);
        self.update_squad();
        self.commit(cmds);
    }

    fn run_behaviours(&mut self, inputs: &[PlayerInput], cmds: &mut Commands) {
        let targets = self.targets();
        let ctx = AiContext {
            grid: &self.grid,
            targets: &targets,
        };
        let idle = PlayerInput::default();
        for entity in self.entities.iter_mut() {
            let input = match &entity.kind {
                EntityKind::Player(p) => inputs.get(p.slot).unwrap_or(&idle),
                _ => &idle,
            };
            ai::update(entity, input, &ctx, &mut self.rng, cmds);
        }
    }

    fn run_physics(&mut self, cmds: &mut Commands) {
        for entity in self.entities.iter_mut().filter(|e| e.alive) {
            let outcome = integrate(&mut entity.body, SIM_DT, &self.grid);
            self.diagnostics.rejected_updates += u64::from(entity.body.take_rejections());

            let EntityKind::Projectile(shot) = &mut entity.kind else {
                continue;
            };
            if !(outcome.hit_x || outcome.hit_y) {
                continue;
            }
            if let Some(tile) = outcome.tile_hit {
                let kind = self.grid.get(tile.col as i64, tile.row as i64);
                if shot.breaks_tiles && kind.is_destructible() {
                    cmds.tile_breaks.push(tile);
                }
            }
            match &mut shot.motion {
                ProjectileMotion::Boomerang { returning } if !*returning => *returning = true,
                _ => entity.alive = false,
            }
        }
    }

    fn resolve_projectile_hits(&mut self) {
        let mut hits = Vec::new();
        for (i, shot) in self.entities.iter().enumerate() {
            let EntityKind::Projectile(data) = &shot.kind else {
                continue;
            };
            if !shot.alive {
                continue;
            }
            let victim = self.entities.iter().position(|other| {
                let opposed = match data.faction {
                    Faction::Squad => other.is_hostile_body() && other.alive,
                    Faction::Hostile => other.is_active_player(),
                };
                opposed
                    && rect_intersect(shot.body.pos(), shot.body.size(), other.body.pos(), other.body.size())
            });
            if let Some(j) = victim {
                hits.push((i, j, data.damage, data.owner_slot, shot.body.center().x));
            }
        }

        for (i, j, damage, slot, source_x) in hits {
            let target = &mut self.entities[j];
            if !target.alive {
                continue;
            }
            if target.apply_damage(damage, source_x) > 0 && slot.is_some() {
                target.last_hit_slot = slot;
            }
            self.entities[i].alive = false;
        }
    }

    fn resolve_explosions(&mut self, cmds: &Commands) {
        for blast in &cmds.explosions {
            for entity in self.entities.iter_mut().filter(|e| e.alive) {
                let hurt = match blast.source {
                    Faction::Hostile => entity.is_active_player(),
                    Faction::Squad => entity.is_hostile_body(),
                };
                if hurt && entity.body.center().distance(blast.center) <= blast.radius {
                    entity.apply_damage(blast.damage, blast.center.x);
                }
            }
        }
    }

    fn resolve_player_contacts(&mut self) {
        let players: Vec<usize> = (0..self.entities.len())
            .filter(|&i| self.entities[i].is_active_player())
            .collect();

        for i in players {
            let (pos, size, slot) = {
                let p = &self.entities[i];
                let slot = match &p.kind {
                    EntityKind::Player(data) => data.slot,
                    _ => continue,
                };
                (p.body.pos(), p.body.size(), slot)
            };

            // Bodies and pickups touching this player
            let mut contact_x = None;
            let mut pickups = Vec::new();
            for (j, other) in self.entities.iter().enumerate() {
                if !other.alive || !rect_intersect(pos, size, other.body.pos(), other.body.size()) {
                    continue;
                }
                if other.is_hostile_body() {
                    contact_x.get_or_insert(other.body.center().x);
                } else if let EntityKind::Item(kind) = other.kind {
                    pickups.push((j, kind));
                }
            }

            if let Some(x) = contact_x {
                self.entities[i].apply_damage(1, x);
            }
            if self.grid.overlaps_kind(pos, size, TileKind::Hazard) {
                let x = self.entities[i].body.center().x;
                self.entities[i].apply_damage(HAZARD_DAMAGE, x);
            }
            for (j, kind) in pickups {
                self.collect(i, j, slot, kind);
            }

            let checkpoint = self.grid.first_overlap(pos, size, |k| k == TileKind::Checkpoint);
            if let Some(tile) = checkpoint.filter(|&t| self.last_checkpoint != Some(t)) {
                self.reach_checkpoint(tile);
            }
        }
    }

    fn collect(&mut self, player: usize, item: usize, slot: usize, kind: ItemKind) {
        match kind {
            ItemKind::Health => {
                let p = &mut self.entities[player];
                if p.health >= p.max_health {
                    return;
                }
                p.health += 1;
            }
            ItemKind::Rescue => {
                // A freed hero joins as an extra life
                self.stats[slot].rescues += 1;
                self.stats[slot].score += RESCUE_SCORE;
                self.lives += 1;
                self.events.push(GameEvent::HeroRescued { slot });
            }
            ItemKind::Extraction => self.complete_level(),
        }
        self.entities[item].alive = false;
        self.events.push(GameEvent::ItemCollected { slot, item: kind });
    }

    fn reach_checkpoint(&mut self, tile: TileCoord) {
        let ts = self.grid.tile_size();
        self.last_checkpoint = Some(tile);
        self.spawn_point = Vec2::new(
            tile.col as f32 * ts + (ts - PLAYER_WIDTH) * 0.5,
            (tile.row + 1) as f32 * ts - PLAYER_HEIGHT,
        );
        self.events.push(GameEvent::CheckpointReached { tile });
        log::debug!("checkpoint at column {}", tile.col);

        let spots: [Vec2; MAX_PLAYERS] = std::array::from_fn(|slot| self.slot_position(slot));
        for entity in self.entities.iter_mut() {
            let EntityKind::Player(p) = &mut entity.kind else {
                continue;
            };
            if p.downed {
                p.downed = false;
                p.invincible_ticks = PLAYER_RESPAWN_GRACE_TICKS;
                entity.health = entity.max_health;
                entity.body.reset_at(spots.get(p.slot).copied().unwrap_or(self.spawn_point));
                self.events.push(GameEvent::PlayerRevived { slot: p.slot });
            }
        }
    }

    fn resolve_deaths(&mut self, cmds: &mut Commands) {
        let spawn = self.spawn_point;
        for entity in self.entities.iter_mut() {
            let fell = entity.body.out_of_world();
            let id = entity.id;
            let tag = entity.tag();
            match &mut entity.kind {
                EntityKind::Player(p) => {
                    if fell {
                        entity.health = 0;
                        entity.body.reset_at(spawn);
                    }
                    if entity.health <= 0 && !p.downed {
                        p.downed = true;
                        p.climbing = false;
                        self.stats[p.slot].downs += 1;
                        self.events.push(GameEvent::PlayerDowned { slot: p.slot });
                    }
                }
                _ if !entity.alive => {}
                _ if fell => {
                    entity.alive = false;
                    self.diagnostics.left_world += 1;
                }
                EntityKind::Enemy(_) | EntityKind::FlyingEnemy(_) if entity.health <= 0 => {
                    entity.alive = false;
                    let by_slot = entity.last_hit_slot;
                    if let Some(slot) = by_slot {
                        self.stats[slot].kills += 1;
                        self.stats[slot].score += KILL_SCORE;
                    }
                    cmds.burst(entity.body.center(), 8, &mut self.rng);
                    self.events.push(GameEvent::EnemyKilled {
                        id,
                        tag,
                        by_slot,
                    });
                }
                EntityKind::Boss(brain) if entity.health <= 0 => {
                    if brain.transition(id, BossPhase::Defeated) {
                        entity.alive = false;
                        let by_slot = entity.last_hit_slot;
                        if let Some(slot) = by_slot {
                            self.stats[slot].kills += 1;
                            self.stats[slot].score += KILL_SCORE;
                        }
                        cmds.burst(entity.body.center(), 24, &mut self.rng);
                        cmds.items.push((ItemKind::Extraction, entity.body.pos()));
                        self.extraction_countdown = Some(EXTRACTION_DELAY_TICKS);
                        self.events.push(GameEvent::BossDefeated { id, by_slot });
                        log::info!("level {}: boss {id} defeated", self.level_index);
                    }
                }
                _ => {}
            }
        }

        if let Some(left) = self.extraction_countdown {
            if left == 0 {
                self.extraction_countdown = None;
                self.complete_level();
            } else {
                self.extraction_countdown = Some(left - 1);
            }
        }
    }

    /// Whole-squad wipe handling
    fn update_squad(&mut self) {
        let mut players = self
            .entities
            .iter()
            .filter_map(|e| match &e.kind {
                EntityKind::Player(p) => Some(p.downed),
                _ => None,
            })
            .peekable();
        if players.peek().is_none() || !players.all(|downed| downed) {
            return;
        }

        if self.lives == 0 {
            self.squad_defeated = true;
            self.events.push(GameEvent::SquadDefeated);
            log::info!("level {}: squad defeated", self.level_index);
            return;
        }

        self.lives -= 1;
        let spots: [Vec2; MAX_PLAYERS] = std::array::from_fn(|slot| self.slot_position(slot));
        for entity in self.entities.iter_mut() {
            if let EntityKind::Player(p) = &mut entity.kind {
                let pos = spots.get(p.slot).copied().unwrap_or(self.spawn_point);
                p.downed = false;
                p.invincible_ticks = PLAYER_RESPAWN_GRACE_TICKS;
                entity.health = entity.max_health;
                entity.body.reset_at(pos);
            }
        }
        self.events.push(GameEvent::SquadRespawned { lives_left: self.lives });
        log::info!("level {}: squad respawned, {} lives left", self.level_index, self.lives);
    }

    fn commit(&mut self, cmds: Commands) {
        let Commands {
            shots,
            particles,
            items,
            mut tile_breaks,
            events,
            ..
        } = cmds;

        tile_breaks.sort_by_key(|t| (t.row, t.col));
        tile_breaks.dedup();
        for tile in tile_breaks {
            self.grid.destroy(tile.col, tile.row);
        }

        self.entities
            .retain(|e| e.alive || matches!(e.kind, EntityKind::Player(_)));

        self.events.extend(events);
        for shot in shots {
            let id = self.next_entity_id();
            self.events.push(GameEvent::ProjectileFired { owner: shot.owner });
            self.entities.push(shot.into_entity(id));
        }
        for (kind, pos) in items {
            let pos = self.clear_spot(pos, kind.size());
            let id = self.next_entity_id();
            self.entities.push(Entity::item(id, kind, pos));
        }
        let live_particles = self.count(EntityTag::Particle);
        let room = self.max_particles.saturating_sub(live_particles);
        for (pos, vel) in particles.into_iter().take(room) {
            let id = self.next_entity_id();
            self.entities.push(Entity::particle(id, pos, vel, 20));
        }

        self.normalize_order();
    }

    /// Keep entities sorted by id for deterministic iteration
    fn normalize_order(&mut self) {
        self.entities.sort_by_key(|e| e.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::BossVariant;
    use crate::sim::entity::EnemyVariant;
    use crate::sim::tiles::Biome;

    fn arena() -> TileGrid {
        let mut g = TileGrid::new(40, 12, 40.0, Biome::Forest);
        for col in 0..40 {
            g.set(col, 11, TileKind::Stone);
        }
        g
    }

    fn player(world: &mut World, x: f32) -> EntityId {
        world.add_entity(|id| Entity::player(id, 0, 0, WeaponKind::Gun, Vec2::new(x, 410.0)))
    }

    #[test]
    fn test_projectile_kills_enemy_and_credits_slot() {
        let mut world = World::sandbox(arena(), 1);
        player(&mut world, 80.0);
        let enemy = world.add_entity(|id| Entity::enemy(id, EnemyVariant::Kamikaze, Vec2::new(400.0, 380.0)));
        let fire = [PlayerInput { fire: true, ..Default::default() }];
        for _ in 0..60 {
            world.step(&fire);
        }
        assert!(world.entity(enemy).is_none());
        assert_eq!(world.stats()[0].kills, 1);
        assert_eq!(world.stats()[0].score, KILL_SCORE);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::EnemyKilled { id, by_slot: Some(0), .. } if *id == enemy)));
    }

    #[test]
    fn test_dead_entities_removed_at_commit() {
        let mut world = World::sandbox(arena(), 1);
        let id = world.add_entity(|id| Entity::particle(id, Vec2::new(200.0, 100.0), Vec2::ZERO, 2));
        world.step(&[]);
        assert!(world.entity(id).is_some());
        world.step(&[]);
        assert!(world.entity(id).is_none());
    }

    #[test]
    fn test_squad_wipe_costs_a_life() {
        let mut world = World::sandbox(arena(), 1);
        let p = player(&mut world, 80.0);
        if let Some(e) = world.entity_mut(p) {
            e.health = 0;
        }
        world.step(&[]);
        assert_eq!(world.lives(), STARTING_LIVES - 1);
        let e = world.entity(p).unwrap();
        assert_eq!(e.health, PLAYER_MAX_HEALTH);
        assert!(e.is_active_player());
    }

    #[test]
    fn test_last_life_lost_defeats_squad() {
        let mut world = World::sandbox(arena(), 1);
        world.lives = 0;
        let p = player(&mut world, 80.0);
        world.entity_mut(p).unwrap().health = 0;
        world.step(&[]);
        assert!(world.is_squad_defeated());
        assert!(world.drain_events().contains(&GameEvent::SquadDefeated));
    }

    #[test]
    fn test_falling_out_downs_player() {
        let grid = TileGrid::new(20, 8, 40.0, Biome::Forest);
        let mut world = World::sandbox(grid, 1);
        let a = world.add_entity(|id| Entity::player(id, 0, 0, WeaponKind::Gun, Vec2::new(80.0, 100.0)));
        let b = world.add_entity(|id| Entity::player(id, 1, 0, WeaponKind::Gun, Vec2::new(80.0, 100.0)));
        // Slot 1 stands on a private ledge
        world.grid.set(3, 5, TileKind::Stone);
        world.entity_mut(b).unwrap().body.reset_at(Vec2::new(120.0, 170.0));
        for _ in 0..120 {
            world.step(&[]);
        }
        let downed = |id| matches!(&world.entity(id).unwrap().kind, EntityKind::Player(p) if p.downed);
        assert!(downed(a));
        assert!(!downed(b));
        assert_eq!(world.lives(), STARTING_LIVES);
    }

    #[test]
    fn test_particle_cap() {
        let mut world = World::sandbox(arena(), 1);
        world.max_particles = 3;
        let mut cmds = Commands::default();
        for _ in 0..10 {
            cmds.particles.push((Vec2::new(100.0, 100.0), Vec2::ZERO));
        }
        world.commit(cmds);
        assert_eq!(world.count(EntityTag::Particle), 3);
    }

    #[test]
    fn test_checkpoint_moves_spawn_point() {
        let mut grid = arena();
        grid.set(6, 10, TileKind::Checkpoint);
        let mut world = World::sandbox(grid, 1);
        player(&mut world, 240.0);
        world.step(&[]);
        assert_eq!(world.spawn_point(), Vec2::new(248.0, 410.0));
        assert!(world
            .drain_events()
            .contains(&GameEvent::CheckpointReached { tile: TileCoord { col: 6, row: 10 } }));
    }

    #[test]
    fn test_flyer_fires_once_after_cooldown() {
        let empty = ".".repeat(60);
        let floor = "#".repeat(60);
        let mut rows = vec![empty.as_str(); 15];
        rows.push(floor.as_str());
        let mut world = World::sandbox(TileGrid::from_rows(&rows, 40.0, Biome::Forest), 5);
        world.add_entity(|id| Entity::player(id, 0, 0, WeaponKind::Gun, Vec2::new(400.0, 600.0 - PLAYER_HEIGHT)));
        let flyer = world.add_entity(|id| Entity::flyer(id, Vec2::new(650.0, 400.0)));

        let mut fired = 0;
        for _ in 0..150 {
            world.step(&[]);
            fired += world
                .drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::ProjectileFired { owner } if *owner == flyer))
                .count();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_respawn_beside_step_stays_clear() {
        // Checkpoint at column 4 with a one-tile step two columns to its right
        let grid = TileGrid::from_rows(&["....C.####", "##########"], 40.0, Biome::Forest);
        let mut world = World::sandbox(grid, 1);
        let squad: Vec<EntityId> = (0..3)
            .map(|slot| world.add_entity(|id| Entity::player(id, slot, 0, WeaponKind::Gun, Vec2::new(168.0, 10.0))))
            .collect();
        world.step(&[]);
        assert_eq!(world.spawn_point(), Vec2::new(168.0, 10.0));

        for &id in &squad {
            world.entity_mut(id).unwrap().health = 0;
        }
        world.step(&[]);
        assert_eq!(world.lives(), STARTING_LIVES - 1);

        let size = Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT);
        let positions: Vec<Vec2> = squad.iter().map(|&id| world.entity(id).unwrap().body.pos()).collect();
        assert_eq!(positions, vec![Vec2::new(168.0, 10.0), Vec2::new(200.0, 10.0), Vec2::new(104.0, 10.0)]);

        for _ in 0..60 {
            world.step(&[]);
        }
        for &id in &squad {
            let e = world.entity(id).unwrap();
            assert!(!world.grid().overlaps_solid(e.body.pos(), size), "{:?} inside terrain", e.body.pos());
            assert!(e.is_active_player());
        }
    }

    #[test]
    fn test_boss_drop_lands_clear_of_terrain() {
        let mut world = World::sandbox(arena(), 1);
        // Bosses ignore terrain, so this one has sunk into the floor
        let boss = world.add_entity(|id| Entity::boss(id, BossBrain::new(BossVariant::Ground, 1), Vec2::new(400.0, 420.0)));
        {
            let e = world.entity_mut(boss).unwrap();
            if let EntityKind::Boss(brain) = &mut e.kind {
                brain.phase = BossPhase::Attack;
            }
            e.health = 0;
        }
        world.step(&[]);

        let drop = world
            .entities()
            .iter()
            .find(|e| e.kind == EntityKind::Item(ItemKind::Extraction))
            .map(|e| e.id)
            .unwrap();
        for _ in 0..120 {
            world.step(&[]);
            let item = world.entity(drop).unwrap();
            assert!(!world.grid().overlaps_solid(item.body.pos(), item.body.size()));
        }
        let item = world.entity(drop).unwrap();
        assert_eq!(item.body.pos().y, 440.0 - 60.0);
        assert!(item.body.grounded);
    }

    #[test]
    fn test_score_for_rescue_and_clear() {
        let mut world = World::sandbox(arena(), 1);
        player(&mut world, 80.0);
        world.add_entity(|id| Entity::item(id, ItemKind::Rescue, Vec2::new(80.0, 400.0)));
        world.step(&[]);
        assert_eq!(world.stats()[0].rescues, 1);
        assert_eq!(world.stats()[0].score, RESCUE_SCORE);
        assert_eq!(world.lives(), STARTING_LIVES + 1);

        world.complete_level();
        world.complete_level();
        assert_eq!(world.stats()[0].score, RESCUE_SCORE + LEVEL_CLEAR_SCORE);
        assert_eq!(world.score(), RESCUE_SCORE + LEVEL_CLEAR_SCORE);
        let events = world.drain_events();
        assert_eq!(events.iter().filter(|e| **e == GameEvent::LevelComplete).count(), 1);
    }

    #[test]
    fn test_rejected_updates_are_counted() {
        let mut world = World::sandbox(arena(), 1);
        let item = world.add_entity(|id| Entity::item(id, ItemKind::Health, Vec2::new(200.0, 420.0)));
        assert_eq!(world.diagnostics().rejected_updates, 0);

        let body = &mut world.entity_mut(item).unwrap().body;
        assert!(!body.set_velocity(Vec2::new(f32::NAN, 0.0)));
        assert!(!body.set_position(Vec2::new(f32::INFINITY, 0.0)));
        world.step(&[]);

        assert_eq!(world.diagnostics().rejected_updates, 2);
        let e = world.entity(item).unwrap();
        assert_eq!(e.body.pos(), Vec2::new(200.0, 420.0));
        assert!(e.body.vel().is_finite());
    }

    #[test]
    fn test_entities_leaving_the_world_are_removed() {
        let mut world = World::sandbox(arena(), 1);
        let spark = world.add_entity(|id| Entity::particle(id, Vec2::new(200.0, 470.0), Vec2::new(0.0, 600.0), 100));
        world.step(&[]);
        assert!(world.entity(spark).is_none());
        assert_eq!(world.diagnostics().left_world, 1);

        for _ in 0..10 {
            world.step(&[]);
        }
        assert_eq!(world.diagnostics().left_world, 1);
    }
}
