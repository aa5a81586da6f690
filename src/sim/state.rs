//! Screen flow and run state
//!
//! `GameState` owns everything a run needs: the screen, the lobby while one is
//! open, the live [`World`] while playing, and the roster. Every screen change
//! goes through a transition method that either applies completely or returns
//! a [`TransitionError`] and leaves the state untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::camera::Camera;
use super::entity::{EntityKind, WeaponKind};
use super::level::{self, generate};
use super::tick::FrameClock;
use super::world::{GameEvent, SlotStats, SquadMember, World};
use crate::consts::*;
use crate::roster::{HEROES, Roster};
use crate::settings::Settings;

/// Top-level screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Menu,
    Roster,
    Lobby,
    Game,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Menu => "MENU",
            Screen::Roster => "ROSTER",
            Screen::Lobby => "LOBBY",
            Screen::Game => "GAME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} from {}", .from.as_str())]
    NotAllowed { from: Screen, action: &'static str },
    #[error("{waiting} connected player(s) not ready")]
    PlayersNotReady { waiting: usize },
    #[error("no player is connected")]
    NoPlayers,
    #[error("no lobby slot {0}")]
    InvalidSlot(usize),
    #[error("hero {0} is locked")]
    HeroLocked(usize),
}

/// One seat in the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySlot {
    pub connected: bool,
    pub ready: bool,
    pub hero: usize,
}

/// Ready-up session, alive only while the lobby screen is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySession {
    slots: Vec<LobbySlot>,
}

impl LobbySession {
    /// Slot 0 starts connected; nobody starts ready
    pub fn new(slot_count: usize) -> Self {
        let mut slots = vec![
            LobbySlot {
                connected: false,
                ready: false,
                hero: 0,
            };
            slot_count.clamp(1, MAX_PLAYERS)
        ];
        slots[0].connected = true;
        Self { slots }
    }

    pub fn slots(&self) -> &[LobbySlot] {
        &self.slots
    }

    pub fn connected(&self) -> impl Iterator<Item = (usize, &LobbySlot)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.connected)
    }

    /// Every connected slot is ready, and at least one is connected
    pub fn all_ready(&self) -> bool {
        self.waiting() == 0 && self.connected().next().is_some()
    }

    fn waiting(&self) -> usize {
        self.connected().filter(|(_, s)| !s.ready).count()
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut LobbySlot, TransitionError> {
        self.slots.get_mut(slot).ok_or(TransitionError::InvalidSlot(slot))
    }
}

/// Run state that only exists on the game screen
struct Session {
    world: World,
    squad: Vec<SquadMember>,
    /// Tallies from levels already folded out of `world`
    run: [SlotStats; MAX_PLAYERS],
}

pub struct GameState {
    screen: Screen,
    current_level: u32,
    settings: Settings,
    roster: Roster,
    lobby: Option<LobbySession>,
    session: Option<Session>,
    pub camera: Camera,
    pub(crate) clock: FrameClock,
    /// Heroes unlocked since the last call to [`GameState::take_unlocks`]
    unlocks: Vec<usize>,
    /// Events from the most recent fixed step
    last_events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(settings: Settings, roster: Roster) -> Self {
        Self {
            screen: Screen::Menu,
            current_level: 1,
            settings,
            roster: roster.normalized(),
            lobby: None,
            session: None,
            camera: Camera::default(),
            clock: FrameClock::default(),
            unlocks: Vec::new(),
            last_events: Vec::new(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn lobby(&self) -> Option<&LobbySession> {
        self.lobby.as_ref()
    }

    /// The live level, on the game screen only
    pub fn world(&self) -> Option<&World> {
        self.session.as_ref().map(|s| &s.world)
    }

    pub(crate) fn world_mut(&mut self) -> Option<&mut World> {
        self.session.as_mut().map(|s| &mut s.world)
    }

    pub fn squad(&self) -> &[SquadMember] {
        self.session.as_ref().map_or(&[], |s| &s.squad)
    }

    /// Squad score for the run so far, including the live level
    pub fn run_score(&self) -> Option<u32> {
        self.session
            .as_ref()
            .map(|s| s.run.iter().map(|t| t.score).sum::<u32>() + s.world.score())
    }

    pub fn last_events(&self) -> &[GameEvent] {
        &self.last_events
    }

    pub fn take_unlocks(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.unlocks)
    }

    fn require(&self, screen: Screen, action: &'static str) -> Result<(), TransitionError> {
        if self.screen == screen {
            Ok(())
        } else {
            Err(TransitionError::NotAllowed {
                from: self.screen,
                action,
            })
        }
    }

    fn enter(&mut self, screen: Screen) {
        log::info!("screen {} -> {}", self.screen.as_str(), screen.as_str());
        self.screen = screen;
    }

    /// MENU -> LOBBY with a fresh, all-unready session
    pub fn deploy(&mut self) -> Result<(), TransitionError> {
        self.require(Screen::Menu, "deploy")?;
        self.lobby = Some(LobbySession::new(self.settings.slot_count()));
        self.current_level = 1;
        self.enter(Screen::Lobby);
        Ok(())
    }

    /// MENU -> ROSTER
    pub fn view_roster(&mut self) -> Result<(), TransitionError> {
        self.require(Screen::Menu, "view the roster")?;
        self.enter(Screen::Roster);
        Ok(())
    }

    /// Any screen -> MENU, dropping the lobby and any running level together
    pub fn back_to_menu(&mut self) {
        if self.screen == Screen::Menu {
            return;
        }
        if let Some(session) = self.session.take() {
            self.fold_run(session, false);
        }
        self.lobby = None;
        self.clock.reset();
        self.enter(Screen::Menu);
    }

    fn lobby_mut(&mut self, action: &'static str) -> Result<&mut LobbySession, TransitionError> {
        self.require(Screen::Lobby, action)?;
        self.lobby.as_mut().ok_or(TransitionError::NotAllowed {
            from: Screen::Lobby,
            action,
        })
    }

    pub fn connect(&mut self, slot: usize) -> Result<(), TransitionError> {
        let lobby = self.lobby_mut("connect")?;
        let seat = lobby.slot_mut(slot)?;
        if !seat.connected {
            seat.connected = true;
            seat.ready = false;
        }
        Ok(())
    }

    pub fn disconnect(&mut self, slot: usize) -> Result<(), TransitionError> {
        let lobby = self.lobby_mut("disconnect")?;
        let seat = lobby.slot_mut(slot)?;
        seat.connected = false;
        seat.ready = false;
        Ok(())
    }

    /// Mark a connected slot ready or not
    pub fn set_ready(&mut self, slot: usize, ready: bool) -> Result<(), TransitionError> {
        let lobby = self.lobby_mut("ready up")?;
        let seat = lobby.slot_mut(slot)?;
        if !seat.connected {
            return Err(TransitionError::InvalidSlot(slot));
        }
        seat.ready = ready;
        Ok(())
    }

    /// Pick an unlocked hero for a slot
    pub fn choose_hero(&mut self, slot: usize, hero: usize) -> Result<(), TransitionError> {
        self.require(Screen::Lobby, "choose a hero")?;
        if !self.roster.is_unlocked(hero) {
            return Err(TransitionError::HeroLocked(hero));
        }
        let lobby = self.lobby_mut("choose a hero")?;
        lobby.slot_mut(slot)?.hero = hero;
        Ok(())
    }

    /// LOBBY -> GAME once every connected slot is ready
    pub fn start(&mut self) -> Result<(), TransitionError> {
        let lobby = self.lobby_mut("start")?;
        let waiting = lobby.waiting();
        if waiting > 0 {
            return Err(TransitionError::PlayersNotReady { waiting });
        }
        let squad: Vec<SquadMember> = lobby
            .connected()
            .map(|(slot, seat)| SquadMember {
                slot,
                hero: seat.hero,
                weapon: HEROES.get(seat.hero).map_or(WeaponKind::Gun, |h| h.weapon),
            })
            .collect();
        if squad.is_empty() {
            return Err(TransitionError::NoPlayers);
        }

        let world = self.build_world(&squad, self.settings.starting_lives);
        self.lobby = None;
        self.session = Some(Session {
            world,
            squad,
            run: [SlotStats::default(); MAX_PLAYERS],
        });
        self.clock.reset();
        self.enter(Screen::Game);
        self.snap_camera();
        Ok(())
    }

    /// GAME -> GAME(next): the old level is dropped whole and replaced
    pub fn advance_level(&mut self) -> Result<(), TransitionError> {
        self.require(Screen::Game, "advance the level")?;
        let Some(mut session) = self.session.take() else {
            return Err(TransitionError::NotAllowed {
                from: self.screen,
                action: "advance the level",
            });
        };
        let cleared = session.world.is_level_complete();
        Self::bank_level(&mut session, &mut self.roster, &mut self.unlocks, cleared);

        let lives = session.world.lives();
        self.current_level += 1;
        session.world = self.build_world(&session.squad, lives);
        self.session = Some(session);
        log::info!("advanced to level {}", self.current_level);
        self.snap_camera();
        Ok(())
    }

    fn build_world(&self, squad: &[SquadMember], lives: u32) -> World {
        let seed = level::level_seed(self.settings.run_seed, self.current_level);
        let built = generate(self.current_level, self.settings.run_seed, &self.settings.level);
        World::new(built, squad, lives, seed, self.settings.max_particles())
    }

    /// Fold a finished level's tallies into the roster and reset them
    fn bank_level(session: &mut Session, roster: &mut Roster, unlocks: &mut Vec<usize>, cleared: bool) {
        let squad: Vec<(usize, usize)> = session.squad.iter().map(|m| (m.slot, m.hero)).collect();
        let stats = session.world.stats();
        unlocks.extend(roster.fold_stats(&squad, stats, cleared));
        for (total, level) in session.run.iter_mut().zip(stats) {
            total.kills += level.kills;
            total.rescues += level.rescues;
            total.downs += level.downs;
            total.score += level.score;
        }
    }

    fn fold_run(&mut self, mut session: Session, cleared: bool) {
        Self::bank_level(&mut session, &mut self.roster, &mut self.unlocks, cleared);
        let kills: u32 = session.run.iter().map(|s| s.kills).sum();
        let rescues: u32 = session.run.iter().map(|s| s.rescues).sum();
        let score: u32 = session.run.iter().map(|s| s.score).sum();
        self.roster.record_run_score(score);
        log::info!(
            "run ended on level {}: {kills} kills, {rescues} rescues, score {score}",
            self.current_level
        );
    }

    /// One fixed step of the live level. Returns true if a screen change happened.
    pub(crate) fn step_world(&mut self, inputs: &[super::tick::PlayerInput]) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.world.step(inputs);
        self.last_events = session.world.drain_events();

        if session.world.is_squad_defeated() {
            if let Some(session) = self.session.take() {
                self.fold_run(session, false);
            }
            self.clock.reset();
            self.enter(Screen::Menu);
            return true;
        }
        if session.world.is_level_complete() {
            // advance_level only fails off the game screen
            return self.advance_level().is_ok();
        }

        let lead = session
            .world
            .entities()
            .iter()
            .find(|e| e.is_active_player())
            .map(|e| e.body.center());
        let boss_floor = session.world.boss_engaged().then(|| {
            let grid = session.world.grid();
            if self.current_level >= BOSS_ARENA_LEVEL {
                (grid.width_tiles() - BOSS_TAIL_MARGIN_TILES) as f32 * grid.tile_size()
            } else {
                let boss_x = session.world.boss().map_or(0.0, |b| b.body.pos().x);
                (boss_x - self.camera.viewport().x * 0.5).max(0.0)
            }
        });
        if let Some(lead) = lead {
            self.camera.follow(lead, boss_floor);
        }
        false
    }

    fn snap_camera(&mut self) {
        let lead = self.world().and_then(|w| {
            w.entities()
                .iter()
                .find(|e| matches!(e.kind, EntityKind::Player(_)))
                .map(|e| e.body.center())
        });
        if let Some(lead) = lead {
            self.camera.snap(lead);
        }
    }
}
