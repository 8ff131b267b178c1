//! Combat integration test
//!
//! Headless дуэль через `CombatSimulation`:
//! - враг замечает игрока, подходит, бьёт
//! - parry / dodge / block меняют исход удара
//! - posture → stun → восстановление
//! - смерть терминальна
//! - стены блокируют perception

use bevy::math::EulerRot;
use bevy::prelude::*;
use riposte_simulation::bridge::{
    anim, AnimatorProbe, Button, HeadlessSpace, InputScript, KinematicNavigator, NavigationProbe,
    Obstacle, RecordingAnimator, ScriptedInput,
};
use riposte_simulation::*;

const DT: f32 = 1.0 / 64.0;

/// Helper: дуэль игрок (в начале координат, смотрит в -Z) против врага
struct Duel {
    simulation: CombatSimulation,
    player: Entity,
    enemy: Entity,
    buttons: InputScript,
    player_anim: AnimatorProbe,
    enemy_anim: AnimatorProbe,
    enemy_nav: NavigationProbe,
}

impl Duel {
    fn new(config: CombatConfig, space: HeadlessSpace, enemy_at: Vec3) -> Self {
        let mut simulation =
            CombatSimulation::new(config, Box::new(space)).expect("valid config");

        let input = ScriptedInput::new();
        let buttons = input.script();
        let player_animator = RecordingAnimator::new();
        let player_anim = player_animator.probe();
        let player = PlayerSpawn::at(Transform::IDENTITY)
            .navigation(KinematicNavigator::new(0.0))
            .animator(player_animator)
            .input(input)
            .weapon(WeaponHitbox::sword(LAYER_ENEMY));

        let enemy_animator = RecordingAnimator::new();
        let enemy_anim = enemy_animator.probe();
        let navigator = KinematicNavigator::new(1.0);
        let enemy_nav = navigator.probe();
        let enemy = EnemySpawn::at(Transform::from_translation(enemy_at).looking_at(Vec3::ZERO, Vec3::Y))
            .navigation(navigator)
            .animator(enemy_animator)
            .weapon(WeaponHitbox::sword(LAYER_PLAYER));

        let (player, enemy) = simulation.spawn_duel(player, enemy).expect("complete spawn");

        Self {
            simulation,
            player,
            enemy,
            buttons,
            player_anim,
            enemy_anim,
            enemy_nav,
        }
    }

    /// Враг в 6m перед игроком, смотрит на него
    fn facing(config: CombatConfig) -> Self {
        Self::new(config, HeadlessSpace::new(), Vec3::new(0.0, 0.0, -6.0))
    }

    fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.simulation.tick(DT);
        }
    }

    /// Тикает до выполнения условия. Возвращает число тиков.
    fn run_until(&mut self, max_ticks: usize, done: impl Fn(&CombatSimulation) -> bool) -> usize {
        for tick in 1..=max_ticks {
            self.simulation.tick(DT);
            if done(&self.simulation) {
                return tick;
            }
        }
        panic!("condition not reached in {} ticks", max_ticks);
    }

    /// Как `run_until`, но `button` нажимается перед каждым tick.
    fn run_until_tapping(
        &mut self,
        button: Button,
        max_ticks: usize,
        done: impl Fn(&CombatSimulation) -> bool,
    ) -> usize {
        for tick in 1..=max_ticks {
            self.buttons.tap(button);
            self.simulation.tick(DT);
            if done(&self.simulation) {
                return tick;
            }
        }
        panic!("condition not reached in {} ticks", max_ticks);
    }

    /// Тикает до первого удара врага по игроку.
    fn run_until_enemy_hit(&mut self, max_ticks: usize) -> DamageDealt {
        let enemy = self.enemy;
        self.run_until(max_ticks, |sim| {
            sim.damage_events().iter().any(|d| d.attacker == enemy)
        });
        self.simulation
            .damage_events()
            .into_iter()
            .find(|d| d.attacker == enemy)
            .expect("enemy hit this tick")
    }

    /// Тикает до начала замаха врага.
    fn run_until_swing(&mut self) {
        let enemy = self.enemy;
        self.run_until(10 * 64, |sim| sim.enemy_state(enemy) == Some(EnemyState::Attack));
    }
}

/// Config где игрок выдерживает много ударов
fn sturdy_player() -> CombatConfig {
    let mut config = CombatConfig::default();
    config.player.max_health = 1000;
    config
}

#[test]
fn test_enemy_spots_chases_and_strikes() {
    let mut duel = Duel::facing(CombatConfig::default());

    // Perception ещё не обновлялась (cadence 0.2s)
    duel.run(12);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(false));
    assert_eq!(duel.simulation.enemy_state(duel.enemy), Some(EnemyState::Idle));

    duel.run(1);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(true));
    assert_eq!(duel.simulation.enemy_state(duel.enemy), Some(EnemyState::MoveTowards));

    duel.run(32);
    assert_eq!(duel.enemy_anim.float(anim::SPEED), Some(2.0));
    assert_eq!(duel.enemy_nav.state().destination, Some(Vec3::ZERO));
    let z = duel.simulation.transform(duel.enemy).map(|t| t.translation.z);
    assert!(z.is_some_and(|z| z > -6.0), "enemy did not move: {:?}", z);

    duel.run_until_swing();
    assert!(duel.enemy_anim.flag(anim::ATTACK));
    assert_eq!(duel.enemy_anim.float(anim::SPEED), Some(0.0));
    let distance = duel
        .simulation
        .transform(duel.enemy)
        .map(|t| t.translation.distance(Vec3::ZERO));
    assert!(distance.is_some_and(|d| d <= 1.5 && d > 1.0), "distance {:?}", distance);

    let hit = duel.run_until_enemy_hit(3 * 64);
    assert_eq!(hit.target, duel.player);
    assert_eq!(hit.damage, 10);
    assert_eq!(hit.outcome.kind, HitOutcomeKind::Struck);

    let hud = duel.simulation.hud(duel.player).expect("player hud");
    assert_eq!(hud.health, 90);
    assert_eq!(hud.posture, 85.0);
    assert!(duel.player_anim.clips().contains(&anim::HIT_REACTION.to_string()));
}

#[test]
fn test_one_hit_per_swing() {
    let mut duel = Duel::facing(sturdy_player());
    duel.run_until_swing();
    duel.run_until_enemy_hit(3 * 64);

    // До reset'а (2.0s от начала замаха) второй проверки попадания нет
    let enemy = duel.enemy;
    for _ in 0..30 {
        duel.simulation.tick(DT);
        assert!(duel.simulation.damage_events().iter().all(|d| d.attacker != enemy));
    }
    assert_eq!(duel.simulation.health(duel.player).map(|h| h.current), Some(990));
}

#[test]
fn test_held_block_halves_health_damage() {
    let mut duel = Duel::facing(CombatConfig::default());
    duel.buttons.hold(Button::Parry);

    duel.run(70);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Blocking));

    let hit = duel.run_until_enemy_hit(8 * 64);
    assert_eq!(hit.outcome.kind, HitOutcomeKind::Blocked);

    let hud = duel.simulation.hud(duel.player).expect("player hud");
    assert_eq!(hud.health, 95);
    assert_eq!(hud.posture, 90.0);
    assert!(duel.player_anim.clips().is_empty());
}

#[test]
fn test_timed_parry_avoids_hit() {
    let mut duel = Duel::facing(CombatConfig::default());
    duel.run_until_swing();

    // Hit check через 1.5s после начала замаха, parry длится 1.0s
    duel.run(60);
    duel.buttons.tap(Button::Parry);

    let hit = duel.run_until_enemy_hit(64);
    assert_eq!(hit.outcome.kind, HitOutcomeKind::Parried);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Parrying));

    let hud = duel.simulation.hud(duel.player).expect("player hud");
    assert_eq!(hud.health, 100);
    assert_eq!(hud.posture, 100.0);
}

#[test]
fn test_timed_dodge_avoids_hit() {
    let mut duel = Duel::facing(CombatConfig::default());
    duel.run_until_swing();

    duel.run(80);
    duel.buttons.tap(Button::Dodge);

    let hit = duel.run_until_enemy_hit(64);
    assert_eq!(hit.outcome.kind, HitOutcomeKind::Dodged);
    assert_eq!(duel.simulation.health(duel.player).map(|h| h.current), Some(100));
}

#[test]
fn test_two_heavy_hits_stun_player_then_recover() {
    let mut config = sturdy_player();
    config.enemy.damage = 40;
    let mut duel = Duel::facing(config);

    let first = duel.run_until_enemy_hit(10 * 64);
    assert!(!first.outcome.stunned);
    assert_eq!(duel.simulation.posture(duel.player).map(|p| p.current), Some(40.0));

    let second = duel.run_until_enemy_hit(4 * 64);
    assert!(second.outcome.stunned);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Stunned));
    assert_eq!(
        duel.simulation.stun_events().iter().map(|s| s.entity).collect::<Vec<_>>(),
        vec![duel.player]
    );

    // Input во время stun игнорируется
    duel.buttons.tap(Button::Attack);
    duel.run(191);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Stunned));
    assert!(!duel.player_anim.flag(anim::ATTACK));

    duel.run(1);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Idle));
    // Ровно 2/3 max: регенерация стартует со следующего tick'а
    let posture = duel.simulation.posture(duel.player).map(|p| p.current).unwrap_or(0.0);
    assert!((posture - 100.0 * (2.0 / 3.0)).abs() < 1e-4, "posture {}", posture);
}

#[test]
fn test_player_breaks_enemy_posture() {
    let mut duel = Duel::new(
        CombatConfig::default(),
        HeadlessSpace::new(),
        Vec3::new(0.0, 0.0, -1.2),
    );
    let enemy = duel.enemy;

    // Удар каждый tick: cooldown пропускает один раз в секунду
    let ticks = duel.run_until_tapping(Button::Attack, 3 * 64, |sim| {
        sim.stun_events().iter().any(|s| s.entity == enemy)
    });
    assert_eq!(ticks, 129);
    assert_eq!(duel.simulation.health(enemy).map(|h| h.current), Some(25));
    assert_eq!(duel.simulation.posture(enemy).map(|p| p.current), Some(0.0));

    duel.run(1);
    assert!(!duel.enemy_anim.flag(anim::ATTACK));
    let health_at_stun = duel.simulation.health(duel.player);

    // Оглушённый враг не бьёт
    for _ in 0..150 {
        duel.simulation.tick(DT);
        assert!(duel.simulation.damage_events().iter().all(|d| d.attacker != enemy));
    }
    assert_eq!(duel.simulation.health(duel.player), health_at_stun);

    duel.run(50);
    let posture = duel.simulation.posture(enemy).map(|p| p.current).unwrap_or(0.0);
    assert!(posture >= 100.0 * 2.0 / 3.0 - 1e-3, "posture {}", posture);
    assert_eq!(duel.simulation.enemy_state(enemy), Some(EnemyState::Attack));
}

#[test]
fn test_enemy_death_is_terminal() {
    let mut config = CombatConfig::default();
    config.enemy.max_health = 50;
    let mut duel = Duel::new(config, HeadlessSpace::new(), Vec3::new(0.0, 0.0, -1.2));
    let (player, enemy) = (duel.player, duel.enemy);

    let ticks = duel.run_until_tapping(Button::Attack, 3 * 64, |sim| {
        !sim.death_events().is_empty()
    });
    // Второй удар, через attack cooldown
    assert_eq!(ticks, 65);

    assert_eq!(
        duel.simulation.death_events(),
        vec![EntityDied { entity: enemy, killer: Some(player) }]
    );
    assert!(duel.simulation.is_dead(enemy));

    // Состояние Dead выставляет decision loop в следующем tick
    duel.run(1);
    assert_eq!(duel.simulation.enemy_state(enemy), Some(EnemyState::Dead));

    for _ in 0..4 * 64 {
        duel.buttons.tap(Button::Attack);
        duel.simulation.tick(DT);
        assert!(duel.simulation.damage_events().is_empty());
        assert_eq!(duel.simulation.enemy_state(enemy), Some(EnemyState::Dead));
    }

    // Труп не успел ударить и не бьёт
    assert_eq!(duel.simulation.health(player).map(|h| h.current), Some(100));
    assert_eq!(duel.simulation.health(enemy).map(|h| h.current), Some(0));
    assert_eq!(duel.enemy_anim.float(anim::SPEED), Some(0.0));
    let hud = duel.simulation.hud(player).expect("player hud");
    assert_eq!(hud.opponent_posture, duel.simulation.posture(enemy).map(|p| p.current));
}

#[test]
fn test_swing_passes_through_corpse() {
    let mut config = CombatConfig::default();
    config.enemy.max_health = 25;
    let mut duel = Duel::new(config, HeadlessSpace::new(), Vec3::new(0.0, 0.0, -1.2));
    let (player, enemy) = (duel.player, duel.enemy);

    duel.buttons.tap(Button::Attack);
    duel.run(1);
    assert!(duel.simulation.is_dead(enemy));

    // Cooldown истёк, новый взмах через то же место
    duel.run(70);
    duel.buttons.tap(Button::Attack);
    duel.run(1);
    assert_eq!(duel.simulation.player_state(player), Some(PlayerState::Attacking));
    assert!(duel.player_anim.flag(anim::ATTACK));

    // Тело в капсуле не заканчивает взмах
    for _ in 0..32 {
        duel.simulation.tick(DT);
        assert!(duel.simulation.damage_events().is_empty());
        assert_eq!(duel.simulation.player_state(player), Some(PlayerState::Attacking));
    }
}

#[test]
fn test_enemy_keeps_checking_over_dead_player() {
    let mut config = CombatConfig::default();
    config.player.max_health = 10;
    let mut duel = Duel::facing(config);
    let (player, enemy) = (duel.player, duel.enemy);

    duel.run_until_enemy_hit(10 * 64);
    assert!(duel.simulation.is_dead(player));

    let hit_check_pending = |sim: &CombatSimulation| {
        sim.world()
            .get::<EnemyBrain>(enemy)
            .is_some_and(|brain| brain.hit_check_pending())
    };

    // Следующий замах по трупу
    duel.run_until(4 * 64, hit_check_pending);
    assert_eq!(duel.simulation.enemy_state(enemy), Some(EnemyState::Attack));

    // Проверки после windup (1.5s) идут, но попаданием не считаются
    for _ in 0..112 {
        duel.simulation.tick(DT);
        assert!(duel.simulation.damage_events().is_empty());
    }
    assert!(hit_check_pending(&duel.simulation));
}

#[test]
fn test_missed_swing_can_be_parried_out_of() {
    let mut duel = Duel::facing(CombatConfig::default());
    let player = duel.player;

    // Враг далеко: взмах в пустоту
    duel.buttons.tap(Button::Attack);
    duel.run(1);
    assert_eq!(duel.simulation.player_state(player), Some(PlayerState::Attacking));

    duel.buttons.tap(Button::Parry);
    duel.run(1);
    assert_eq!(duel.simulation.player_state(player), Some(PlayerState::Parrying));
    assert!(!duel.player_anim.flag(anim::ATTACK));
    assert!(duel.player_anim.flag(anim::PARRY));
}

#[test]
fn test_enemy_turns_on_yaw_only() {
    let mut duel = Duel::facing(CombatConfig::default());
    let enemy = duel.enemy;

    // Враг выше игрока и сбоку, смотрит прямо в -Z
    let start = Vec3::new(0.6, 0.8, -0.9);
    assert!(duel
        .simulation
        .set_transform(enemy, Transform::from_translation(start)));

    duel.run(1);
    assert_eq!(duel.simulation.enemy_state(enemy), Some(EnemyState::Attack));

    let transform = duel.simulation.transform(enemy).expect("enemy transform");
    let (_, pitch, roll) = transform.rotation.to_euler(EulerRot::YXZ);
    assert!(pitch.abs() < 1e-5, "pitch {}", pitch);
    assert!(roll.abs() < 1e-5, "roll {}", roll);
    assert!((transform.up().as_vec3() - Vec3::Y).length() < 1e-5);

    let expected = Vec3::new(-start.x, 0.0, -start.z).normalize();
    let forward = transform.forward().as_vec3();
    assert!(forward.y.abs() < 1e-5);
    assert!((forward - expected).length() < 1e-4, "forward {:?}", forward);
}

#[test]
fn test_dead_player_ignores_input() {
    let mut config = CombatConfig::default();
    config.player.max_health = 20;
    let mut duel = Duel::facing(config);
    let player = duel.player;

    duel.run_until(12 * 64, |sim| sim.is_dead(player));
    let state_at_death = duel.simulation.player_state(player);

    for _ in 0..64 {
        duel.buttons.tap(Button::Dodge);
        duel.simulation.tick(DT);
        assert_eq!(duel.simulation.player_state(player), state_at_death);
    }
    assert!(!duel.player_anim.flag(anim::DODGE));
    assert_eq!(duel.simulation.hud(player).map(|h| h.dead), Some(true));
}

#[test]
fn test_weapon_pose_moves_hitbox() {
    let mut duel = Duel::new(
        CombatConfig::default(),
        HeadlessSpace::new(),
        Vec3::new(0.0, 0.0, -1.2),
    );

    // Оружие поднято высоко над головой: взмах проходит мимо
    assert!(duel
        .simulation
        .set_weapon_pose(duel.player, Transform::from_xyz(0.0, 10.0, 0.0)));
    duel.buttons.tap(Button::Attack);
    duel.run(1);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Attacking));
    assert!(duel.simulation.damage_events().is_empty());

    // Опустили в руку: следующий tick того же взмаха попадает
    duel.simulation
        .set_weapon_pose(duel.player, Transform::from_xyz(0.0, 1.2, 0.0));
    duel.run(1);
    let dealt = duel.simulation.damage_events();
    assert_eq!(dealt.len(), 1);
    assert_eq!(dealt[0].target, duel.enemy);
    assert_eq!(dealt[0].damage, 25);
    assert_eq!(duel.simulation.player_state(duel.player), Some(PlayerState::Idle));
}

#[test]
fn test_teleported_player_is_chased() {
    let mut duel = Duel::facing(CombatConfig::default());
    duel.run(13);
    assert_eq!(duel.simulation.enemy_state(duel.enemy), Some(EnemyState::MoveTowards));

    let target = Vec3::new(1.0, 0.0, -1.0);
    assert!(duel
        .simulation
        .set_transform(duel.player, Transform::from_translation(target)));
    duel.run(1);
    assert_eq!(duel.enemy_nav.state().destination, Some(target));
}

#[test]
fn test_wall_near_enemy_blocks_sight() {
    // Стена в 0.5m перед врагом, внутри occlusion probe
    let wall = Obstacle::Aabb {
        min: Vec3::new(-2.0, -1.0, -5.6),
        max: Vec3::new(2.0, 3.0, -5.4),
        layers: LAYER_ENVIRONMENT,
    };
    let mut duel = Duel::new(
        CombatConfig::default(),
        HeadlessSpace::new().with_obstacle(wall),
        Vec3::new(0.0, 0.0, -6.0),
    );

    duel.run(2 * 64);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(false));
    assert_eq!(duel.simulation.enemy_state(duel.enemy), Some(EnemyState::Idle));
    assert_eq!(duel.enemy_nav.state().destination, None);
}

#[test]
fn test_wall_beyond_probe_does_not_block() {
    // Occlusion probe короче дистанции: дальняя стена не мешает
    let wall = Obstacle::Aabb {
        min: Vec3::new(-2.0, -1.0, -3.1),
        max: Vec3::new(2.0, 3.0, -2.9),
        layers: LAYER_ENVIRONMENT,
    };
    let mut duel = Duel::new(
        CombatConfig::default(),
        HeadlessSpace::new().with_obstacle(wall),
        Vec3::new(0.0, 0.0, -6.0),
    );

    duel.run(13);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(true));

    // С длинным probe та же стена закрывает обзор
    let mut config = CombatConfig::default();
    config.perception.occlusion_probe_distance = 10.0;
    let mut duel = Duel::new(
        config,
        HeadlessSpace::new().with_obstacle(wall),
        Vec3::new(0.0, 0.0, -6.0),
    );
    duel.run(13);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(false));
}

#[test]
fn test_enemy_facing_away_stays_idle() {
    let mut duel = Duel::facing(CombatConfig::default());
    // Развернуть врага спиной к игроку
    let away = Transform::from_xyz(0.0, 0.0, -6.0).looking_at(Vec3::new(0.0, 0.0, -12.0), Vec3::Y);
    duel.simulation.set_transform(duel.enemy, away);

    duel.run(2 * 64);
    assert_eq!(duel.simulation.can_see_target(duel.enemy), Some(false));
    assert_eq!(duel.simulation.enemy_state(duel.enemy), Some(EnemyState::Idle));
}

#[test]
fn test_setup_errors_spawn_nothing() {
    let mut simulation = CombatSimulation::headless(CombatConfig::default()).expect("valid config");

    let player = PlayerSpawn::default()
        .animator(RecordingAnimator::new())
        .input(ScriptedInput::new())
        .weapon(WeaponHitbox::sword(LAYER_ENEMY));
    let enemy = EnemySpawn::default()
        .navigation(KinematicNavigator::new(1.0))
        .animator(RecordingAnimator::new())
        .weapon(WeaponHitbox::sword(LAYER_PLAYER));

    let err = simulation.spawn_duel(player, enemy).unwrap_err();
    assert!(matches!(err, SetupError::MissingNavigation { actor: "player" }));
    assert!(err.to_string().contains("navigation"));

    let world = simulation.world_mut();
    assert_eq!(world.query::<&Actor>().iter(world).count(), 0);

    let err = CombatConfig::from_toml_str("[enemy]\nattack_reset = 0.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "enemy.attack_reset", .. }));
}

#[test]
fn test_hud_snapshot_serializes() {
    let mut duel = Duel::facing(CombatConfig::default());
    duel.run(1);

    let hud = duel.simulation.hud(duel.player).expect("player hud");
    let text = toml::to_string(&hud).expect("serializable");
    assert!(text.contains("health = 100"));
    assert!(text.contains("opponent_posture = 100.0"));
}
