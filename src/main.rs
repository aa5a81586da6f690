//! Mutt Brigade headless harness
//!
//! Drives a bot squad through the menu, the lobby and a number of levels, then
//! prints the final frame view as JSON.
//!
//! Usage: `mutt-brigade [levels] [settings.json] [roster.json] [low|medium|high]`

use std::process::ExitCode;

use mutt_brigade::persistence::{JsonFileStore, RosterStore};
use mutt_brigade::sim::{EntityKind, GameState, PlayerInput, Screen, TickInput};
use mutt_brigade::{QualityPreset, Settings, consts::*};

/// Give up on a level after this many simulated seconds
const LEVEL_TIME_LIMIT_SECS: u32 = 240;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let levels: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(2);
    let settings_path = args.next().unwrap_or_else(|| "mutt-brigade-settings.json".to_string());
    let roster_path = args.next().unwrap_or_else(|| "mutt-brigade-roster.json".to_string());

    let mut settings = match Settings::load(&settings_path) {
        Ok(s) => s,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(quality) = args.next() {
        match quality.parse::<QualityPreset>() {
            Ok(preset) => settings.quality = preset,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    }
    let mut store = JsonFileStore::new(roster_path);
    let roster = match store.load_or_default() {
        Ok(r) => r,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Mutt Brigade (headless) starting, {levels} level(s), seed {:#x}, {} quality",
        settings.run_seed,
        settings.quality
    );
    let mut state = GameState::new(settings, roster);
    if let Err(err) = enter_game(&mut state) {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }

    let mut bot = Bot::default();
    while state.screen() == Screen::Game && state.current_level() <= levels {
        let level = state.current_level();
        let mut ticks = 0;
        while state.screen() == Screen::Game && state.current_level() == level {
            let input = bot.input(&state);
            ticks += state.tick(&input, SIM_DT);
            if ticks >= LEVEL_TIME_LIMIT_SECS * TICK_RATE {
                log::warn!("level {level}: time limit reached, skipping ahead");
                if let Err(err) = state.advance_level() {
                    log::error!("{err}");
                }
                break;
            }
        }
        for hero in state.take_unlocks() {
            log::info!("new hero: {}", mutt_brigade::HEROES[hero].name);
        }
    }

    let view = state.snapshot();
    state.back_to_menu();
    if let Err(err) = store.save(state.roster()) {
        log::warn!("{err}");
    }

    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    }
    log::info!(
        "{} kills on record, best score {}",
        state.roster().total_kills(),
        state.roster().best_score
    );
    ExitCode::SUCCESS
}

fn enter_game(state: &mut GameState) -> Result<(), mutt_brigade::sim::TransitionError> {
    state.deploy()?;
    state.set_ready(0, true)?;
    state.start()
}

/// Run right, shoot everything, hop when stuck
#[derive(Default)]
struct Bot {
    last_x: f32,
    stuck: u32,
    tick: u32,
}

impl Bot {
    fn input(&mut self, state: &GameState) -> TickInput {
        self.tick += 1;
        let player = state.world().and_then(|w| {
            w.entities()
                .iter()
                .find(|e| matches!(&e.kind, EntityKind::Player(p) if p.slot == 0))
        });
        let Some(player) = player else {
            return TickInput::default();
        };

        let x = player.body.pos().x;
        if (x - self.last_x).abs() < 0.5 {
            self.stuck += 1;
        } else {
            self.stuck = 0;
        }
        self.last_x = x;

        TickInput::single(
            0,
            PlayerInput {
                move_x: 1.0,
                jump: self.stuck > 10 || self.tick % 90 == 0,
                fire: true,
                climb: -1.0,
            },
        )
    }
}
