//! Pull-based render snapshot
//!
//! Renderers read a [`FrameView`] once per frame. It is plain data and never
//! hands out references into the simulation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, EntityTag};
use super::state::{GameState, LobbySlot, Screen};
use super::tiles::Biome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: u32,
    pub tag: EntityTag,
    pub pos: Vec2,
    pub size: Vec2,
    pub health: i32,
    /// Player slot, for players
    pub slot: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameView {
    pub screen: Screen,
    pub level: u32,
    pub biome: Option<Biome>,
    /// Level size in pixels
    pub world_size: Option<Vec2>,
    pub lives: Option<u32>,
    /// Squad score for the run so far
    pub score: Option<u32>,
    /// Current and maximum boss health while a boss is alive
    pub boss_health: Option<(i32, i32)>,
    pub camera: Vec2,
    pub lobby: Vec<LobbySlot>,
    pub entities: Vec<EntityView>,
}

impl GameState {
    /// Snapshot everything a renderer needs for this frame
    pub fn snapshot(&self) -> FrameView {
        let world = self.world();
        let entities = world
            .map(|w| {
                w.entities()
                    .iter()
                    .filter(|e| e.alive)
                    .map(|e| EntityView {
                        id: e.id,
                        tag: e.tag(),
                        pos: e.body.pos(),
                        size: e.body.size(),
                        health: e.health,
                        slot: match &e.kind {
                            EntityKind::Player(p) => Some(p.slot),
                            _ => None,
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        FrameView {
            screen: self.screen(),
            level: self.current_level(),
            biome: world.map(|w| w.grid().biome()),
            world_size: world.map(|w| Vec2::new(w.grid().pixel_width(), w.grid().pixel_height())),
            lives: world.map(|w| w.lives()),
            score: self.run_score(),
            boss_health: world.and_then(|w| w.boss()).map(|b| (b.health, b.max_health)),
            camera: self.camera.pos,
            lobby: self.lobby().map(|l| l.slots().to_vec()).unwrap_or_default(),
            entities,
        }
    }
}

impl FrameView {
    pub fn count(&self, tag: EntityTag) -> usize {
        self.entities.iter().filter(|e| e.tag == tag).count()
    }

    pub fn is_playing(&self) -> bool {
        self.screen == Screen::Game
    }
}
