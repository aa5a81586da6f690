//! Procedural level generation
//!
//! `generate` builds the tile grid and initial spawn list for one level. All
//! randomness comes from a PCG stream seeded by the run seed and the level
//! index, so the same pair always yields the same level.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::boss::BossVariant;
use super::collision::lift_clear;
use super::entity::{EnemyVariant, FLYER_SIZE, ItemKind};
use super::tiles::{Biome, TileGrid, TileKind};
use crate::consts::*;
use crate::settings::LevelDimensions;

/// Columns of flat stone at the start of every level
const SAFE_ZONE_COLS: usize = 15;
/// Pits never open before this column
const FIRST_PIT_COL: usize = 20;
/// Spacing between candidate ladder shafts
const SHAFT_SPACING: usize = 40;
/// Most rescue cages in one level
const MAX_RESCUES: u32 = 5;
/// Furthest a blocked spawn is nudged upward (tiles)
const MAX_NUDGE_TILES: u32 = 5;

/// What a spawn point creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Enemy(EnemyVariant),
    Flyer,
    Boss(BossVariant),
    Item(ItemKind),
}

impl SpawnKind {
    /// Bounding box of the entity this spawn creates
    pub fn size(self) -> Vec2 {
        match self {
            SpawnKind::Enemy(variant) => variant.profile().size,
            SpawnKind::Flyer => FLYER_SIZE,
            SpawnKind::Boss(variant) => variant.size(),
            SpawnKind::Item(kind) => kind.size(),
        }
    }
}

/// An initial entity placement (top-left corner in world pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawn {
    pub kind: SpawnKind,
    pub pos: Vec2,
}

/// A generated level
#[derive(Debug, Clone)]
pub struct Level {
    pub index: u32,
    pub grid: TileGrid,
    pub spawns: Vec<Spawn>,
    /// Where player slot 0 appears; further slots stand to its right
    pub player_spawn: Vec2,
}

impl Level {
    pub fn boss_spawn(&self) -> Option<&Spawn> {
        self.spawns.iter().find(|s| matches!(s.kind, SpawnKind::Boss(_)))
    }

    /// Number of hostile spawns (ground enemies, flyers and bosses)
    pub fn hostile_count(&self) -> usize {
        self.spawns
            .iter()
            .filter(|s| !matches!(s.kind, SpawnKind::Item(_)))
            .count()
    }
}

/// Seed for one level of a run
pub fn level_seed(run_seed: u64, level_index: u32) -> u64 {
    run_seed ^ (level_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Build the level for `level_index` (1-based)
pub fn generate(level_index: u32, run_seed: u64, dims: &LevelDimensions) -> Level {
    let level_index = level_index.max(1);
    let dims = dims.sanitized();
    let mut rng = Pcg32::seed_from_u64(level_seed(run_seed, level_index));
    let biome = Biome::for_level(level_index);
    let mut builder = Generator {
        grid: TileGrid::new(dims.width_tiles, dims.height_tiles, dims.tile_size, biome),
        surface: vec![None; dims.width_tiles],
        spawns: Vec::new(),
        rescues: 0,
        last_rescue_col: None,
        level: level_index,
        w: dims.width_tiles,
        h: dims.height_tiles,
        ts: dims.tile_size,
    };

    builder.terrain(&mut rng);
    builder.shafts(&mut rng);
    builder.surface_objects(&mut rng);
    builder.borders();
    builder.boss(&mut rng);

    let spawns = builder.validate_spawns();
    let base_row = builder.surface[2].unwrap_or(builder.base_row());
    let player_spawn = Vec2::new(2.0 * builder.ts, base_row as f32 * builder.ts - PLAYER_HEIGHT);

    let level = Level {
        index: level_index,
        grid: builder.grid,
        spawns,
        player_spawn,
    };
    log::info!(
        "level {}: biome={} size={}x{} spawns={} hostiles={}",
        level.index,
        biome.as_str(),
        level.grid.width_tiles(),
        level.grid.height_tiles(),
        level.spawns.len(),
        level.hostile_count()
    );
    level
}

struct Generator {
    grid: TileGrid,
    /// Surface row per column; `None` for pits
    surface: Vec<Option<usize>>,
    spawns: Vec<Spawn>,
    rescues: u32,
    last_rescue_col: Option<usize>,
    level: u32,
    w: usize,
    h: usize,
    ts: f32,
}

impl Generator {
    fn base_row(&self) -> usize {
        10.min(self.h - 8)
    }

    fn arena_level(&self) -> bool {
        self.level >= BOSS_ARENA_LEVEL
    }

    /// First column of the end arena
    fn arena_start(&self) -> usize {
        self.w - BOSS_ARENA_WIDTH_TILES
    }

    fn arena_floor(&self) -> usize {
        12.min(self.h - 8)
    }

    fn rescue_spaced(&self, col: usize) -> bool {
        self.rescues < MAX_RESCUES && self.last_rescue_col.is_none_or(|last| col.abs_diff(last) > 50)
    }

    /// Place a spawn standing on `surface_row` at `col`
    fn stand(&mut self, kind: SpawnKind, col: usize, surface_row: usize) {
        let size = kind.size();
        let x = col as f32 * self.ts + (self.ts - size.x).max(0.0) * 0.5;
        let y = surface_row as f32 * self.ts - size.y;
        self.spawns.push(Spawn {
            kind,
            pos: Vec2::new(x, y),
        });
    }

    fn terrain(&mut self, rng: &mut Pcg32) {
        let d = self.level as f32;
        let roughness = (0.2 + d * 0.05) as f64;
        let pit_chance = (0.02 + d * 0.01) as f64;
        let (min_row, max_row) = (6, self.h - 10);
        let hazard_row = self.h - 1;
        let mut height = self.base_row();

        for x in 0..self.w {
            let in_arena = self.arena_level() && x >= self.arena_start();
            if in_arena {
                height = self.arena_floor();
            } else if x < SAFE_ZONE_COLS {
                height = self.base_row();
            } else {
                if rng.random_bool(roughness.min(1.0)) {
                    height = if rng.random_bool(0.5) { height + 1 } else { height - 1 };
                }
                height = height.clamp(min_row, max_row);

                let near_boss_zone = x + BOSS_TAIL_MARGIN_TILES >= self.w;
                if x > FIRST_PIT_COL && !near_boss_zone && rng.random_bool(pit_chance.min(1.0)) {
                    // Open pit down to the hazard floor
                    self.grid.set(x, hazard_row, TileKind::Hazard);
                    continue;
                }

                if self.rescue_spaced(x) && rng.random_bool(0.05) && rng.random_bool(0.5) && height > 6 {
                    let island = height - 4;
                    self.grid.set(x, island, TileKind::Dirt);
                    self.push_rescue(x, island);
                }
            }

            self.surface[x] = Some(height);
            for y in height..self.h {
                let kind = if x < SAFE_ZONE_COLS || in_arena || y >= self.h - 2 {
                    TileKind::Stone
                } else {
                    TileKind::Dirt
                };
                self.grid.set(x, y, kind);
            }
        }

        if self.arena_level() {
            // Low entrance wall, clearable with a jump
            let col = self.arena_start();
            let floor = self.arena_floor();
            for row in floor.saturating_sub(2)..floor {
                self.grid.set(col, row, TileKind::Stone);
            }
        }
    }

    /// Cage hanging under an island tile
    fn push_rescue(&mut self, col: usize, island_row: usize) {
        self.spawns.push(Spawn {
            kind: SpawnKind::Item(ItemKind::Rescue),
            pos: Vec2::new(col as f32 * self.ts, (island_row + 1) as f32 * self.ts),
        });
        self.rescues += 1;
        self.last_rescue_col = Some(col);
    }

    /// Ladder shafts with side tunnels
    fn shafts(&mut self, rng: &mut Pcg32) {
        if self.w < SHAFT_SPACING + 60 || self.h < 30 {
            return;
        }
        let bottom = self.h - 5;
        for col in (SHAFT_SPACING..self.w - 60).step_by(SHAFT_SPACING) {
            let Some(top) = self.surface[col] else { continue };
            if !rng.random_bool(0.7) || top + 15 >= self.h {
                continue;
            }
            for row in top..bottom {
                self.grid.set(col, row, TileKind::Ladder);
            }

            let tunnels = rng.random_range(2..=4);
            for _ in 0..tunnels {
                let tunnel_row = top + 10 + rng.random_range(0..(bottom - top).saturating_sub(15).max(1));
                let len = rng.random_range(10..25);
                let dir: i64 = if rng.random_bool(0.5) { 1 } else { -1 };
                for j in 1..len {
                    let tx = col as i64 + j * dir;
                    if tx <= SAFE_ZONE_COLS as i64 || tx >= self.w as i64 - 1 {
                        break;
                    }
                    let tx = tx as usize;
                    for row in tunnel_row..tunnel_row + 3 {
                        if self.grid.get(tx as i64, row as i64) == TileKind::Dirt {
                            self.grid.set(tx, row, TileKind::Empty);
                        }
                    }
                    if j > 5 && rng.random_bool(0.05) {
                        let variant = if self.level >= 3 && rng.random_bool(0.3) {
                            EnemyVariant::Kamikaze
                        } else {
                            EnemyVariant::Grunt
                        };
                        self.stand(SpawnKind::Enemy(variant), tx, tunnel_row + 3);
                    }
                }
            }
        }
    }

    /// Checkpoints, cages, pickups and surface enemies
    fn surface_objects(&mut self, rng: &mut Pcg32) {
        let d = self.level;
        let cp_interval = (self.w / 6).max(1);
        let cp_step = (self.w / if d >= 5 { 4 } else { 6 }).max(1);
        let cp_cap = if d >= 5 { 3 } else { 5 };
        let mut next_cp = cp_interval;
        let mut checkpoints = 0;

        for x in FIRST_PIT_COL..self.w.saturating_sub(BOSS_ARENA_WIDTH_TILES) {
            let Some(y) = self.surface[x] else { continue };
            if self.grid.get(x as i64, y as i64) == TileKind::Ladder {
                continue;
            }

            if x >= next_cp && checkpoints < cp_cap {
                self.grid.set(x, y, TileKind::Stone);
                self.grid.set(x, y - 1, TileKind::Checkpoint);
                next_cp += cp_step;
                checkpoints += 1;
            } else if rng.random_bool(0.1) && self.rescue_spaced(x) {
                if y > 11 && self.grid.get(x as i64, y as i64 - 6) == TileKind::Empty {
                    let island = y - 7;
                    self.grid.set(x, island, TileKind::Dirt);
                    self.push_rescue(x, island);
                }
            } else if rng.random_bool((0.03 + d as f64 * 0.01).min(1.0)) {
                self.stand(SpawnKind::Item(ItemKind::Health), x, y);
            } else if rng.random_bool((0.06 + d as f64 * 0.01).min(1.0)) {
                let r: f32 = rng.random();
                let variant = if d >= 2 && r < 0.2 {
                    EnemyVariant::Sniper
                } else if d >= 3 && r < 0.4 {
                    EnemyVariant::ShieldBearer
                } else if d >= 4 && r < 0.6 {
                    EnemyVariant::Heavy
                } else if d >= 3 && r < 0.8 {
                    EnemyVariant::Kamikaze
                } else {
                    EnemyVariant::Grunt
                };
                self.stand(SpawnKind::Enemy(variant), x, y);
            } else if rng.random_bool(0.04) {
                let row = y.saturating_sub(5);
                self.spawns.push(Spawn {
                    kind: SpawnKind::Flyer,
                    pos: Vec2::new(x as f32 * self.ts, row as f32 * self.ts),
                });
            }
        }
    }

    fn borders(&mut self) {
        for row in 0..self.h {
            self.grid.set(0, row, TileKind::Stone);
            self.grid.set(self.w - 1, row, TileKind::Stone);
        }
    }

    fn boss(&mut self, rng: &mut Pcg32) {
        if self.arena_level() {
            let floor = self.arena_floor();
            let variant = BossVariant::Ground;
            let size = variant.size();
            let x = (self.w - BOSS_ARENA_ANCHOR_TILES) as f32 * self.ts;
            let y = floor as f32 * self.ts - size.y - self.ts;
            self.spawns.push(Spawn {
                kind: SpawnKind::Boss(variant),
                pos: Vec2::new(x, y),
            });
            for col in [self.w - 35, self.w - 5] {
                self.stand(SpawnKind::Enemy(EnemyVariant::Heavy), col, floor);
            }
            return;
        }

        let latest = self.w - BOSS_TAIL_MARGIN_TILES;
        let earliest = ((self.w as f32 * 0.7) as usize).min(latest);
        let drawn = rng.random_range(earliest..=latest);
        let (col, surface) = match self.nearest_ground(drawn, earliest, latest) {
            Some(found) => found,
            None => {
                log::warn!(
                    "level {}: no ground between columns {earliest} and {latest}, boss placed at default height",
                    self.level
                );
                (drawn, self.base_row())
            }
        };

        let variant = BossVariant::for_level(self.level);
        let lift = match variant {
            BossVariant::Ground => 5,
            BossVariant::Helicopter => 10,
        };
        let row = surface.saturating_sub(lift).max(1);
        self.spawns.push(Spawn {
            kind: SpawnKind::Boss(variant),
            pos: Vec2::new(col as f32 * self.ts, row as f32 * self.ts),
        });
        log::debug!("level {}: {:?} boss at column {col}", self.level, variant);

        let defenders = 3 + self.level / 2;
        for _ in 0..defenders {
            let offset = rng.random_range(-15i64..=15);
            let want = (col as i64 + offset).clamp(5, self.w as i64 - 5) as usize;
            let Some((dx, dy)) = self.nearest_ground(want, 1, self.w - 2) else {
                continue;
            };
            let variant = if self.level >= 5 && rng.random_bool(0.5) {
                EnemyVariant::Heavy
            } else if self.level >= 3 {
                EnemyVariant::ShieldBearer
            } else {
                EnemyVariant::Grunt
            };
            self.stand(SpawnKind::Enemy(variant), dx, dy);
        }
    }

    /// Closest column to `col` within `[lo, hi]` that has ground
    fn nearest_ground(&self, col: usize, lo: usize, hi: usize) -> Option<(usize, usize)> {
        let span = hi.saturating_sub(lo);
        (0..=span).find_map(|step| {
            [col.checked_sub(step), col.checked_add(step)]
                .into_iter()
                .flatten()
                .filter(|c| (lo..=hi).contains(c))
                .find_map(|c| self.surface.get(c).copied().flatten().map(|row| (c, row)))
        })
    }

    /// Drop or lift spawns that would start inside solid tiles
    fn validate_spawns(&mut self) -> Vec<Spawn> {
        let mut valid = Vec::with_capacity(self.spawns.len());
        for mut spawn in std::mem::take(&mut self.spawns) {
            match lift_clear(&self.grid, spawn.pos, spawn.kind.size(), MAX_NUDGE_TILES) {
                Some(pos) => {
                    spawn.pos = pos;
                    valid.push(spawn);
                }
                None if matches!(spawn.kind, SpawnKind::Boss(_)) => {
                    // The boss must exist; float it above the tallest possible terrain
                    log::warn!("level {}: boss spawn blocked, moved to the sky", self.level);
                    spawn.pos.y = self.ts;
                    valid.push(spawn);
                }
                None => log::debug!("level {}: dropped blocked {:?} spawn", self.level, spawn.kind),
            }
        }
        valid
    }
}
