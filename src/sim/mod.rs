//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod ai;
pub mod boss;
pub mod camera;
pub mod collision;
pub mod entity;
pub mod level;
pub mod physics;
pub mod state;
pub mod tick;
pub mod tiles;
pub mod view;
pub mod world;

pub use boss::{BossBrain, BossPhase, BossVariant};
pub use camera::Camera;
pub use entity::{EnemyVariant, Entity, EntityId, EntityKind, EntityTag, Faction, ItemKind, WeaponKind};
pub use level::{Level, Spawn, SpawnKind, generate};
pub use physics::{PhysicsBody, StepOutcome, integrate};
pub use state::{GameState, LobbySession, LobbySlot, Screen, TransitionError};
pub use tick::{FrameClock, PlayerInput, TickInput, tick};
pub use tiles::{Biome, TileCoord, TileGrid, TileKind};
pub use view::{EntityView, FrameView};
pub use world::{Diagnostics, GameEvent, SlotStats, SquadMember, World};
