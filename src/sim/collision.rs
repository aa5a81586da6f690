//! Collision detection and response against the tile grid
//!
//! Boxes move one axis at a time. Each sweep looks at every tile the box
//! passes over (not just where it ends up), so a fast body cannot tunnel
//! through a one-tile wall, and stops flush against the first solid column or
//! row in its path.

use glam::Vec2;

use super::tiles::{EDGE_EPSILON, TileCoord, TileGrid, TileKind};

/// Movement axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Result of sweeping a box along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepResult {
    /// Resolved coordinate along the swept axis (top-left corner)
    pub coord: f32,
    /// Whether a solid tile stopped the motion
    pub blocked: bool,
    /// The tile that stopped the motion
    pub tile: Option<TileCoord>,
}

impl SweepResult {
    fn free(coord: f32) -> Self {
        Self {
            coord,
            blocked: false,
            tile: None,
        }
    }
}

/// Move a box by `delta` along `axis`, stopping at the first solid tile
///
/// Tiles the box already overlaps at the start are ignored, so a body that
/// was pushed into a wall can still move out of it.
pub fn sweep_axis(grid: &TileGrid, pos: Vec2, size: Vec2, delta: f32, axis: Axis) -> SweepResult {
    let (start, len, cross_start, cross_len) = match axis {
        Axis::X => (pos.x, size.x, pos.y, size.y),
        Axis::Y => (pos.y, size.y, pos.x, size.x),
    };
    let target = start + delta;
    if delta == 0.0 {
        return SweepResult::free(target);
    }

    let ts = grid.tile_size();
    let (cross0, cross1) = grid.span(cross_start, cross_len);
    let lane_blocked = |lane: i64| -> Option<TileCoord> {
        (cross0..=cross1).find_map(|cross| {
            let (col, row) = match axis {
                Axis::X => (lane, cross),
                Axis::Y => (cross, lane),
            };
            if grid.is_solid(col, row) {
                Some(TileCoord {
                    col: col as usize,
                    row: row as usize,
                })
            } else {
                None
            }
        })
    };

    if delta > 0.0 {
        let leading = start + len;
        let (first, last) = grid.span(start, delta + len);
        for lane in first..=last {
            let lane_edge = lane as f32 * ts;
            if lane_edge < leading - EDGE_EPSILON {
                continue;
            }
            if let Some(tile) = lane_blocked(lane) {
                return SweepResult {
                    coord: lane_edge - len,
                    blocked: true,
                    tile: Some(tile),
                };
            }
        }
    } else {
        let (first, last) = grid.span(target, -delta + len);
        for lane in (first..=last).rev() {
            let lane_edge = (lane + 1) as f32 * ts;
            if lane_edge > start + EDGE_EPSILON {
                continue;
            }
            if let Some(tile) = lane_blocked(lane) {
                return SweepResult {
                    coord: lane_edge,
                    blocked: true,
                    tile: Some(tile),
                };
            }
        }
    }

    SweepResult::free(target)
}

/// Move a box that overlaps solid tiles to the nearest clear spot
///
/// Candidates are the four flush positions around every overlapped tile,
/// taken shallowest first. When none of them is clear the box is lifted a
/// tile at a time from the top of the first overlapped tile. Returns `None`
/// if the box was already clear or no clear spot exists in the grid.
pub fn depenetrate(grid: &TileGrid, pos: Vec2, size: Vec2) -> Option<Vec2> {
    let first = grid.first_overlap(pos, size, TileKind::is_solid)?;
    let ts = grid.tile_size();
    let (c0, c1) = grid.span(pos.x, size.x);
    let (r0, r1) = grid.span(pos.y, size.y);

    let mut candidates = Vec::new();
    for row in r0..=r1 {
        for col in c0..=c1 {
            if !grid.is_solid(col, row) {
                continue;
            }
            let origin = Vec2::new(col as f32 * ts, row as f32 * ts);
            candidates.push(Vec2::new(pos.x, origin.y - size.y));
            candidates.push(Vec2::new(pos.x, origin.y + ts));
            candidates.push(Vec2::new(origin.x - size.x, pos.y));
            candidates.push(Vec2::new(origin.x + ts, pos.y));
        }
    }
    // Stable sort keeps "up" ahead of other pushes of the same depth
    candidates.sort_by(|a, b| a.distance_squared(pos).total_cmp(&b.distance_squared(pos)));
    if let Some(clear) = candidates.into_iter().find(|&c| !grid.overlaps_solid(c, size)) {
        return Some(clear);
    }

    let top = Vec2::new(pos.x, first.row as f32 * ts - size.y);
    lift_clear(grid, top, size, grid.height_tiles() as u32)
}

/// Raise a box a whole tile at a time until it clears every solid tile
///
/// Tries `pos` itself first and gives up after `max_tiles` lifts.
pub fn lift_clear(grid: &TileGrid, pos: Vec2, size: Vec2, max_tiles: u32) -> Option<Vec2> {
    let ts = grid.tile_size();
    (0..=max_tiles)
        .map(|k| pos - Vec2::new(0.0, k as f32 * ts))
        .find(|&p| !grid.overlaps_solid(p, size))
}

/// True if a box sits on solid ground (probe just below its feet)
pub fn standing_on_solid(grid: &TileGrid, pos: Vec2, size: Vec2) -> bool {
    let probe = EDGE_EPSILON * 4.0;
    let (c0, c1) = grid.span(pos.x, size.x);
    let (r0, r1) = grid.span(pos.y + size.y - probe, probe * 2.0);
    (r0..=r1).any(|row| (c0..=c1).any(|col| grid.is_solid(col, row)))
}
