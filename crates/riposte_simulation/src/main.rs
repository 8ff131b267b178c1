//! Headless дуэль RIPOSTE
//!
//! Игрок (scripted input) против одного врага, без движка: headless bridge.
//! Первый аргумент (опционально): путь к TOML конфигу.

use bevy::prelude::*;
use riposte_simulation::bridge::{
    Button, KinematicNavigator, RecordingAnimator, ScriptedInput, LAYER_ENEMY, LAYER_PLAYER,
};
use riposte_simulation::{
    init_logger, log_error, log_info, AnimationEvent, CombatConfig, CombatSimulation, EnemySpawn,
    EnemyState, PlayerSpawn, PlayerState, WeaponHitbox,
};

/// Длина дуэли, секунды
const DUEL_SECONDS: f32 = 30.0;

fn main() {
    init_logger();

    let config = match std::env::args().nth(1) {
        Some(path) => match CombatConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log_error(&format!("Failed to load {}: {}", path, err));
                std::process::exit(1);
            }
        },
        None => CombatConfig::default(),
    };

    let dt = config.fixed_dt();
    let tick_hz = config.simulation.tick_hz;
    log_info(&format!(
        "Starting RIPOSTE headless duel (seed: {}, {} Hz)",
        config.simulation.seed, tick_hz
    ));

    let mut simulation = match CombatSimulation::headless(config) {
        Ok(simulation) => simulation,
        Err(err) => {
            log_error(&format!("Simulation setup failed: {}", err));
            std::process::exit(1);
        }
    };

    let input = ScriptedInput::new();
    let buttons = input.script();
    let player = PlayerSpawn::at(Transform::IDENTITY)
        .navigation(KinematicNavigator::new(0.0))
        .animator(RecordingAnimator::new())
        .input(input)
        .weapon(WeaponHitbox::sword(LAYER_ENEMY));

    // Враг в 6m перед игроком, смотрит на него
    let enemy = EnemySpawn::at(Transform::from_xyz(0.0, 0.0, -6.0).looking_at(Vec3::ZERO, Vec3::Y))
        .navigation(KinematicNavigator::new(1.0))
        .animator(RecordingAnimator::new())
        .weapon(WeaponHitbox::sword(LAYER_PLAYER));

    let (player, enemy) = match simulation.spawn_duel(player, enemy) {
        Ok(pair) => pair,
        Err(err) => {
            log_error(&format!("Duel setup failed: {}", err));
            std::process::exit(1);
        }
    };

    let total_ticks = (DUEL_SECONDS * tick_hz) as u64;
    let mut blocking = false;

    for tick in 0..total_ticks {
        let enemy_state = simulation.enemy_state(enemy);
        let player_state = simulation.player_state(player);

        // Враг замахнулся → держим блок, иначе бьём когда можно
        match (enemy_state, player_state) {
            (Some(EnemyState::Attack), Some(PlayerState::Idle)) if !blocking => {
                buttons.hold(Button::Parry);
                blocking = true;
            }
            (Some(EnemyState::Attack), _) => {}
            (_, Some(PlayerState::Blocking)) => {
                buttons.release(Button::Parry);
                blocking = false;
            }
            (Some(EnemyState::MoveTowards), Some(PlayerState::Idle)) => {
                buttons.tap(Button::Attack);
            }
            _ => {}
        }

        simulation.tick(dt);

        // Шаг каждые полсекунды, пока враг идёт
        if tick % (tick_hz as u64 / 2).max(1) == 0
            && simulation.enemy_state(enemy) == Some(EnemyState::MoveTowards)
        {
            simulation.on_animation_event(enemy, AnimationEvent::Footstep { weight: 1.0 });
        }

        for dealt in simulation.damage_events() {
            log_info(&format!(
                "Tick {}: {:?} → {:?}: {:?}",
                tick, dealt.attacker, dealt.target, dealt.outcome.kind
            ));
        }

        if tick % tick_hz as u64 == 0 {
            log_info(&format!(
                "Tick {}: player {:?} / enemy {:?}",
                tick,
                simulation.hud(player),
                simulation.hud(enemy)
            ));
        }

        if simulation.is_dead(player) || simulation.is_dead(enemy) {
            log_info(&format!("Duel over at tick {}", tick));
            break;
        }
    }

    log_info(&format!(
        "Simulation complete! player {:?}, enemy {:?}",
        simulation.hud(player),
        simulation.hud(enemy)
    ));
}
