//! Tile grid and biome tags
//!
//! A level is a fixed-size grid of tiles indexed `[row][col]`. The grid is
//! read-only while a tick runs; destructible tiles are only removed through
//! [`TileGrid::destroy`], which the world calls at its commit point.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tolerance (pixels) for boxes resting exactly on a tile edge
pub const EDGE_EPSILON: f32 = 0.01;

/// Kind of a single tile cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Empty,
    /// Solid, can be blasted away
    Dirt,
    /// Solid, indestructible (safe zones, bedrock, arena floor, borders)
    Stone,
    /// Spikes or lava at the bottom of pits
    Hazard,
    /// Climbable shaft
    Ladder,
    /// Moves the squad spawn point when touched
    Checkpoint,
}

impl TileKind {
    /// Blocks movement
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, TileKind::Dirt | TileKind::Stone)
    }

    #[inline]
    pub fn is_destructible(self) -> bool {
        self == TileKind::Dirt
    }
}

/// Visual/behavioral theme of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Biome {
    Forest,
    City,
    Volcano,
}

impl Biome {
    /// Biome for a 1-based level index
    pub fn for_level(level_index: u32) -> Self {
        match level_index {
            0..=2 => Biome::Forest,
            3..=4 => Biome::City,
            _ => Biome::Volcano,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Biome::Forest => "forest",
            Biome::City => "city",
            Biome::Volcano => "volcano",
        }
    }
}

/// Row/column address of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: usize,
    pub row: usize,
}

/// The tile map of one level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width_tiles: usize,
    height_tiles: usize,
    tile_size: f32,
    biome: Biome,
    /// Row-major cells
    cells: Vec<TileKind>,
}

impl TileGrid {
    /// Create an all-empty grid
    pub fn new(width_tiles: usize, height_tiles: usize, tile_size: f32, biome: Biome) -> Self {
        Self {
            width_tiles,
            height_tiles,
            tile_size,
            biome,
            cells: vec![TileKind::Empty; width_tiles * height_tiles],
        }
    }

    /// Build a grid from text rows, for tools and tests
    ///
    /// `#` stone, `d` dirt, `^` hazard, `H` ladder, `C` checkpoint, anything
    /// else empty. Short rows are padded with empty tiles.
    pub fn from_rows(rows: &[&str], tile_size: f32, biome: Biome) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut grid = Self::new(width, rows.len(), tile_size, biome);
        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let kind = match ch {
                    '#' => TileKind::Stone,
                    'd' => TileKind::Dirt,
                    '^' => TileKind::Hazard,
                    'H' => TileKind::Ladder,
                    'C' => TileKind::Checkpoint,
                    _ => TileKind::Empty,
                };
                grid.set(col, row, kind);
            }
        }
        grid
    }

    #[inline]
    pub fn width_tiles(&self) -> usize {
        self.width_tiles
    }

    #[inline]
    pub fn height_tiles(&self) -> usize {
        self.height_tiles
    }

    #[inline]
    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    #[inline]
    pub fn biome(&self) -> Biome {
        self.biome
    }

    /// Level width in pixels
    pub fn pixel_width(&self) -> f32 {
        self.width_tiles as f32 * self.tile_size
    }

    /// Level height in pixels
    pub fn pixel_height(&self) -> f32 {
        self.height_tiles as f32 * self.tile_size
    }

    /// Tile at signed coordinates; anything outside the grid reads as empty
    pub fn get(&self, col: i64, row: i64) -> TileKind {
        if col < 0 || row < 0 {
            return TileKind::Empty;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width_tiles || row >= self.height_tiles {
            return TileKind::Empty;
        }
        self.cells[row * self.width_tiles + col]
    }

    #[inline]
    pub fn is_solid(&self, col: i64, row: i64) -> bool {
        self.get(col, row).is_solid()
    }

    /// Tile containing a world-space point
    pub fn tile_at(&self, point: Vec2) -> TileKind {
        let (col, row) = self.cell_of(point);
        self.get(col, row)
    }

    /// Signed cell index of a world-space point
    pub fn cell_of(&self, point: Vec2) -> (i64, i64) {
        (
            (point.x / self.tile_size).floor() as i64,
            (point.y / self.tile_size).floor() as i64,
        )
    }

    /// Top-left corner of a cell in world space
    pub fn cell_origin(&self, col: usize, row: usize) -> Vec2 {
        Vec2::new(col as f32 * self.tile_size, row as f32 * self.tile_size)
    }

    /// True if any solid tile overlaps the given box
    pub fn overlaps_solid(&self, pos: Vec2, size: Vec2) -> bool {
        self.first_overlap(pos, size, TileKind::is_solid).is_some()
    }

    /// True if any tile of `kind` overlaps the given box
    pub fn overlaps_kind(&self, pos: Vec2, size: Vec2, kind: TileKind) -> bool {
        self.first_overlap(pos, size, |k| k == kind).is_some()
    }

    /// First tile (row-major) overlapping the box that satisfies `pred`
    pub fn first_overlap(
        &self,
        pos: Vec2,
        size: Vec2,
        pred: impl Fn(TileKind) -> bool,
    ) -> Option<TileCoord> {
        let (c0, c1) = self.span(pos.x, size.x);
        let (r0, r1) = self.span(pos.y, size.y);
        for row in r0..=r1 {
            for col in c0..=c1 {
                if col < 0 || row < 0 {
                    continue;
                }
                if pred(self.get(col, row)) {
                    return Some(TileCoord {
                        col: col as usize,
                        row: row as usize,
                    });
                }
            }
        }
        None
    }

    /// Inclusive cell range covered by the half-open interval `[start, start + len)`
    ///
    /// Edges within [`EDGE_EPSILON`] of a tile boundary count as touching, not overlapping.
    pub fn span(&self, start: f32, len: f32) -> (i64, i64) {
        let first = ((start + EDGE_EPSILON) / self.tile_size).floor() as i64;
        let last = ((start + len - EDGE_EPSILON) / self.tile_size).ceil() as i64 - 1;
        (first, last.max(first))
    }

    /// Write a tile during generation
    pub(crate) fn set(&mut self, col: usize, row: usize, kind: TileKind) {
        if col < self.width_tiles && row < self.height_tiles {
            self.cells[row * self.width_tiles + col] = kind;
        }
    }

    /// Remove a destructible tile. Returns true if a tile was removed.
    pub fn destroy(&mut self, col: usize, row: usize) -> bool {
        if col >= self.width_tiles || row >= self.height_tiles {
            return false;
        }
        let idx = row * self.width_tiles + col;
        if self.cells[idx].is_destructible() {
            self.cells[idx] = TileKind::Empty;
            true
        } else {
            false
        }
    }

    /// Topmost solid row in a column, if any
    pub fn surface_row(&self, col: usize) -> Option<usize> {
        (0..self.height_tiles).find(|&row| self.get(col as i64, row as i64).is_solid())
    }

    /// Count tiles of a kind (used by tests and the harness)
    pub fn count(&self, kind: TileKind) -> usize {
        self.cells.iter().filter(|&&k| k == kind).count()
    }
}
