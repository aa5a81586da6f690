//! Fixed timestep simulation tick
//!
//! The frame driver reports wall-clock time; [`tick`] turns it into whole
//! fixed steps of [`SIM_DT`] and advances the live level once per step.

use serde::{Deserialize, Serialize};

use super::state::{GameState, Screen};
use crate::consts::*;

/// Input for one player slot (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Horizontal direction, -1 (left) to 1 (right)
    pub move_x: f32,
    pub jump: bool,
    pub fire: bool,
    /// Ladder direction, -1 (up) to 1 (down)
    pub climb: f32,
}

/// Input commands for a single tick, one entry per lobby slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub players: [PlayerInput; MAX_PLAYERS],
}

impl TickInput {
    /// Input with only `slot` set
    pub fn single(slot: usize, input: PlayerInput) -> Self {
        let mut all = Self::default();
        if let Some(p) = all.players.get_mut(slot) {
            *p = input;
        }
        all
    }
}

/// Wall-clock accumulator for the fixed step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    accumulator: f32,
    /// Frames whose dt was not a finite, non-negative number
    rejected_frames: u64,
}

impl FrameClock {
    /// Add a frame's elapsed time and return how many fixed steps to run
    ///
    /// Long frames are clamped to [`MAX_FRAME_DT`] and a single call never
    /// asks for more than [`MAX_SUBSTEPS`] steps.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !dt.is_finite() || dt < 0.0 {
            self.rejected_frames += 1;
            log::trace!("rejected frame dt {dt}");
            return 0;
        }
        self.accumulator += dt.min(MAX_FRAME_DT);

        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            // Spiral of death guard: drop the backlog
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }
}

/// Advance the game state by `dt` seconds of wall-clock time
///
/// Only the game screen has anything to simulate. Returns the number of fixed
/// steps that ran.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) -> u32 {
    let steps = state.clock.advance(dt);
    if state.screen() != Screen::Game {
        return 0;
    }
    for ran in 0..steps {
        if state.step_world(&input.players) {
            // Screen or level changed; drop the rest of this frame
            state.clock.reset();
            return ran + 1;
        }
    }
    steps
}

impl GameState {
    /// Frame driver entry point, see [`tick`]
    pub fn tick(&mut self, input: &TickInput, dt: f32) -> u32 {
        tick(self, input, dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::settings::{LevelDimensions, Settings};

    fn playing_state() -> GameState {
        let settings = Settings {
            level: LevelDimensions {
                width_tiles: 100,
                height_tiles: 30,
                tile_size: 40.0,
            },
            ..Settings::default()
        };
        let mut state = GameState::new(settings, Roster::new());
        state.deploy().unwrap();
        state.set_ready(0, true).unwrap();
        state.start().unwrap();
        state
    }

    #[test]
    fn test_clock_fixed_steps() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.advance(SIM_DT * 0.5), 0);
        assert_eq!(clock.advance(SIM_DT * 0.6), 1);
        // Clamped to 0.1 s = 6 steps
        assert_eq!(clock.advance(5.0), 6);
    }

    #[test]
    fn test_clock_rejects_bad_dt() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.advance(f32::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.advance(f32::INFINITY), 0);
        assert_eq!(clock.rejected_frames(), 3);
        assert_eq!(clock.advance(SIM_DT), 1);
    }

    #[test]
    fn test_tick_only_runs_in_game() {
        let mut state = GameState::new(Settings::default(), Roster::new());
        assert_eq!(tick(&mut state, &TickInput::default(), 0.055), 0);
        assert_eq!(state.screen(), Screen::Menu);

        let mut state = playing_state();
        let ran = tick(&mut state, &TickInput::default(), 0.055);
        assert_eq!(ran, 3);
        assert_eq!(state.world().unwrap().ticks(), 3);
    }

    #[test]
    fn test_determinism() {
        let mut state1 = playing_state();
        let mut state2 = playing_state();

        let inputs = [
            TickInput::single(0, PlayerInput { move_x: 1.0, ..Default::default() }),
            TickInput::single(0, PlayerInput { jump: true, fire: true, ..Default::default() }),
            TickInput::single(0, PlayerInput { move_x: -0.5, fire: true, ..Default::default() }),
            TickInput::default(),
        ];

        for _ in 0..30 {
            for input in &inputs {
                tick(&mut state1, input, SIM_DT);
                tick(&mut state2, input, SIM_DT);
            }
        }

        let (w1, w2) = (state1.world().unwrap(), state2.world().unwrap());
        assert_eq!(w1.ticks(), w2.ticks());
        assert_eq!(w1.entities().len(), w2.entities().len());
        for (a, b) in w1.entities().iter().zip(w2.entities()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.body.pos(), b.body.pos());
        }
    }
}
