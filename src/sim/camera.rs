//! Viewport tracking
//!
//! The camera only maps world pixels to screen pixels. World coordinates never
//! depend on the viewport size.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Fraction of the remaining distance covered per tick
const EASE: f32 = 0.1;
/// Lead player sits this far across the viewport
const LEAD_OFFSET_X: f32 = 0.3;
const LEAD_OFFSET_Y: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World position of the viewport's top-left corner
    pub pos: Vec2,
    viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

impl Camera {
    pub fn new(width: f32, height: f32) -> Self {
        let mut cam = Self {
            pos: Vec2::ZERO,
            viewport: Vec2::ONE,
        };
        cam.set_viewport(width, height);
        cam
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Resize the output surface. Degenerate sizes clamp to one pixel.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        let clean = |v: f32| if v.is_finite() { v.max(1.0) } else { 1.0 };
        self.viewport = Vec2::new(clean(width), clean(height));
    }

    /// Ease toward `lead`, never left of `min_x` (boss lock) or above/left of
    /// the world origin
    pub fn follow(&mut self, lead: Vec2, min_x: Option<f32>) {
        if !lead.is_finite() {
            return;
        }
        let mut target = Vec2::new(
            lead.x - self.viewport.x * LEAD_OFFSET_X,
            lead.y - self.viewport.y * LEAD_OFFSET_Y,
        )
        .max(Vec2::ZERO);
        if let Some(floor) = min_x.filter(|f| f.is_finite()) {
            target.x = target.x.max(floor);
        }
        self.pos += (target - self.pos) * EASE;
    }

    /// Jump straight to the follow target
    pub fn snap(&mut self, lead: Vec2) {
        if lead.is_finite() {
            self.pos = Vec2::new(
                lead.x - self.viewport.x * LEAD_OFFSET_X,
                lead.y - self.viewport.y * LEAD_OFFSET_Y,
            )
            .max(Vec2::ZERO);
        }
    }

    #[inline]
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        p - self.pos
    }

    #[inline]
    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        p + self.pos
    }

    /// Whether a box is at least partly on screen
    pub fn is_visible(&self, pos: Vec2, size: Vec2) -> bool {
        crate::rect_intersect(pos, size, self.pos, self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_viewport_clamps() {
        let mut cam = Camera::new(0.0, -5.0);
        assert_eq!(cam.viewport(), Vec2::ONE);
        cam.set_viewport(f32::NAN, 300.0);
        assert_eq!(cam.viewport(), Vec2::new(1.0, 300.0));
    }

    #[test]
    fn test_mapping_roundtrips_for_any_viewport() {
        for (w, h) in [(1.0, 1.0), (320.0, 200.0), (3840.0, 2160.0)] {
            let mut cam = Camera::new(w, h);
            cam.snap(Vec2::new(5000.0, 900.0));
            let p = Vec2::new(5012.5, 913.0);
            assert_eq!(cam.screen_to_world(cam.world_to_screen(p)), p);
        }
    }

    #[test]
    fn test_follow_clamps_at_origin() {
        let mut cam = Camera::new(800.0, 600.0);
        for _ in 0..200 {
            cam.follow(Vec2::new(10.0, 10.0), None);
        }
        assert_eq!(cam.pos, Vec2::ZERO);
    }

    #[test]
    fn test_boss_lock_holds_camera_right() {
        let mut cam = Camera::new(800.0, 600.0);
        cam.snap(Vec2::new(14_000.0, 300.0));
        for _ in 0..200 {
            cam.follow(Vec2::new(13_000.0, 300.0), Some(15_000.0));
        }
        assert!(cam.pos.x > 14_900.0);
    }
}
