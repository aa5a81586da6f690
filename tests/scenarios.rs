//! End-to-end scenarios through the public API

use mutt_brigade::consts::*;
use mutt_brigade::roster::Roster;
use mutt_brigade::settings::{LevelDimensions, Settings};
use mutt_brigade::sim::{
    Biome, EntityTag, GameState, PlayerInput, Screen, SquadMember, TickInput, TransitionError, WeaponKind, World,
    generate,
};

fn small_settings() -> Settings {
    Settings {
        level: LevelDimensions {
            width_tiles: 160,
            height_tiles: 30,
            tile_size: 40.0,
        },
        ..Settings::default()
    }
}

fn start_game(settings: Settings) -> GameState {
    let mut state = GameState::new(settings, Roster::new());
    state.deploy().unwrap();
    state.set_ready(0, true).unwrap();
    state.start().unwrap();
    state
}

#[test]
fn test_level_one_enemies_settle_on_the_ground() {
    let level = generate(1, 1234, &LevelDimensions::default());
    let height = level.grid.pixel_height();
    let mut world = World::new(level, &[], STARTING_LIVES, 1234, MAX_PARTICLES);
    assert!(world.count(EntityTag::Enemy) > 0);

    for _ in 0..3 * TICK_RATE {
        world.step(&[]);
    }

    let enemies: Vec<_> = world.entities().iter().filter(|e| e.tag() == EntityTag::Enemy).collect();
    assert!(!enemies.is_empty());
    assert!(enemies.iter().all(|e| e.body.pos().is_finite()));
    assert!(enemies.iter().all(|e| e.body.pos().y <= height));
    assert!(enemies.iter().any(|e| e.body.grounded));
}

#[test]
fn test_boss_placement_rules() {
    let dims = LevelDimensions::default();
    for index in 1..20 {
        let level = generate(index, 99, &dims);
        let boss = level.boss_spawn().expect("boss spawned");
        let limit = (level.grid.width_tiles() - BOSS_TAIL_MARGIN_TILES) as f32 * level.grid.tile_size();
        assert!(boss.pos.x <= limit, "level {index}: {} > {limit}", boss.pos.x);
    }

    let level = generate(20, 99, &dims);
    let anchor = (level.grid.width_tiles() - BOSS_ARENA_ANCHOR_TILES) as f32 * level.grid.tile_size();
    let boss = level.boss_spawn().expect("boss spawned");
    assert!((boss.pos.x - anchor).abs() <= 200.0);

    assert_eq!(generate(3, 99, &dims).grid.biome(), Biome::City);
}

#[test]
fn test_positions_stay_finite_during_play() {
    let mut state = start_game(small_settings());
    let inputs = [
        TickInput::single(0, PlayerInput { move_x: 1.0, fire: true, ..Default::default() }),
        TickInput::single(0, PlayerInput { move_x: 1.0, jump: true, ..Default::default() }),
        TickInput::single(0, PlayerInput { move_x: f32::NAN, climb: f32::INFINITY, ..Default::default() }),
    ];
    for i in 0..900 {
        state.tick(&inputs[i % inputs.len()], SIM_DT);
        if let Some(world) = state.world() {
            assert!(world.entities().iter().all(|e| e.body.pos().is_finite() && e.body.vel().is_finite()));
        }
    }
}

#[test]
fn test_level_advance_replaces_world() {
    let mut state = start_game(small_settings());
    for _ in 0..120 {
        state.tick(&TickInput::single(0, PlayerInput { fire: true, ..Default::default() }), SIM_DT);
    }
    assert_eq!(state.current_level(), 1);
    let lives = state.world().unwrap().lives();
    let score = state.run_score().unwrap();

    state.advance_level().unwrap();
    assert_eq!(state.current_level(), 2);
    // Skipping a level pays no clear bonus
    assert_eq!(state.run_score(), Some(score));
    assert_eq!(state.snapshot().score, Some(score));

    let world = state.world().unwrap();
    assert_eq!(world.level_index(), 2);
    assert_eq!(world.ticks(), 0);
    assert_eq!(world.lives(), lives);
    assert_eq!(world.count(EntityTag::Projectile), 0);
    assert_eq!(world.count(EntityTag::Particle), 0);

    // Same contents as a fresh level two
    let settings = small_settings();
    let fresh = World::new(
        generate(2, settings.run_seed, &settings.level),
        state.squad(),
        lives,
        0,
        MAX_PARTICLES,
    );
    assert_eq!(world.entities().len(), fresh.entities().len());
}

#[test]
fn test_lobby_gating() {
    let mut state = GameState::new(small_settings(), Roster::new());
    state.deploy().unwrap();
    state.connect(2).unwrap();
    assert!(matches!(state.start(), Err(TransitionError::PlayersNotReady { waiting: 2 })));
    state.set_ready(0, true).unwrap();
    assert!(!state.lobby().unwrap().all_ready());
    assert!(state.start().is_err());
    state.set_ready(2, true).unwrap();
    assert!(state.lobby().unwrap().all_ready());
    state.start().unwrap();
    assert_eq!(state.screen(), Screen::Game);
    let slots: Vec<usize> = state.squad().iter().map(|m| m.slot).collect();
    assert_eq!(slots, vec![0, 2]);
}

#[test]
fn test_squad_spawns_side_by_side() {
    let level = generate(1, 3, &LevelDimensions::default());
    let spawn = level.player_spawn;
    let squad = [
        SquadMember { slot: 0, hero: 0, weapon: WeaponKind::Laser },
        SquadMember { slot: 1, hero: 0, weapon: WeaponKind::Gun },
    ];
    let world = World::new(level, &squad, STARTING_LIVES, 3, MAX_PARTICLES);
    let players: Vec<_> = world.entities().iter().filter(|e| e.tag() == EntityTag::Player).collect();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].body.pos(), spawn);
    assert!(players[1].body.pos().x > spawn.x);
}
