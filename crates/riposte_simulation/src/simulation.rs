//! CombatSimulation: host-facing facade над bevy App
//!
//! Хост (engine shell или headless binary) делает три вещи:
//! 1. `new` / `headless` + `spawn_duel` (явная инициализация вместо engine Start)
//! 2. `tick(dt)` из своего fixed step
//! 3. пробрасывает animation events и authoritative transforms
//!
//! Всё остальное (perception cadence, таймеры, hit resolution) живёт внутри CombatTick.

use bevy::prelude::*;
use rand::Rng;
use serde::Serialize;

use crate::ai::{EnemyBrain, EnemyState, EnemyTuning, Perception};
use crate::bridge::{
    AnimationEvent, AnimationSink, Animator, BodyShape, HeadlessSpace, InputDevice, InputSource,
    Navigation, Navigator, SpatialQueries, SpatialQuery, LAYER_ENEMY, LAYER_PLAYER,
};
use crate::combat::{ActorStunned, DamageDealt, EntityDied, MeleeHit, WeaponHitbox};
use crate::components::{Actor, ActorKind, Attacker, Dead, Health, Opponent, Posture};
use crate::config::CombatConfig;
use crate::error::SetupError;
use crate::logger::{log, log_error, log_info, log_warning};
use crate::player::{PlayerCombat, PlayerState, PlayerTuning};
use crate::schedules::{CombatTick, SimClock};
use crate::{DeterministicRng, SimulationPlugin};

// ============================================================================
// Spawn descriptions
// ============================================================================

/// Everything needed to put the player into the fight.
///
/// Capabilities are checked at spawn time; a missing one rejects the whole spawn.
pub struct PlayerSpawn {
    transform: Transform,
    navigation: Option<Box<dyn Navigation>>,
    animator: Option<Box<dyn AnimationSink>>,
    input: Option<Box<dyn InputSource>>,
    weapon: Option<WeaponHitbox>,
    body: BodyShape,
}

impl Default for PlayerSpawn {
    fn default() -> Self {
        Self::at(Transform::IDENTITY)
    }
}

impl PlayerSpawn {
    pub fn at(transform: Transform) -> Self {
        Self {
            transform,
            navigation: None,
            animator: None,
            input: None,
            weapon: None,
            body: BodyShape::humanoid(LAYER_PLAYER),
        }
    }

    pub fn navigation(mut self, navigation: impl Navigation) -> Self {
        self.navigation = Some(Box::new(navigation));
        self
    }

    pub fn animator(mut self, animator: impl AnimationSink) -> Self {
        self.animator = Some(Box::new(animator));
        self
    }

    pub fn input(mut self, input: impl InputSource) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn weapon(mut self, weapon: WeaponHitbox) -> Self {
        self.weapon = Some(weapon);
        self
    }

    pub fn body(mut self, body: BodyShape) -> Self {
        self.body = body;
        self
    }
}

/// Everything needed to spawn an AI combatant.
pub struct EnemySpawn {
    transform: Transform,
    navigation: Option<Box<dyn Navigation>>,
    animator: Option<Box<dyn AnimationSink>>,
    weapon: Option<WeaponHitbox>,
    target: Option<Entity>,
    body: BodyShape,
}

impl Default for EnemySpawn {
    fn default() -> Self {
        Self::at(Transform::IDENTITY)
    }
}

impl EnemySpawn {
    pub fn at(transform: Transform) -> Self {
        Self {
            transform,
            navigation: None,
            animator: None,
            weapon: None,
            target: None,
            body: BodyShape::humanoid(LAYER_ENEMY),
        }
    }

    pub fn navigation(mut self, navigation: impl Navigation) -> Self {
        self.navigation = Some(Box::new(navigation));
        self
    }

    pub fn animator(mut self, animator: impl AnimationSink) -> Self {
        self.animator = Some(Box::new(animator));
        self
    }

    pub fn weapon(mut self, weapon: WeaponHitbox) -> Self {
        self.weapon = Some(weapon);
        self
    }

    /// Opponent to chase and attack. `spawn_duel` fills it in with the player.
    pub fn target(mut self, target: Entity) -> Self {
        self.target = Some(target);
        self
    }

    pub fn body(mut self, body: BodyShape) -> Self {
        self.body = body;
        self
    }
}

/// Player parts after validation.
struct PlayerParts {
    transform: Transform,
    navigation: Box<dyn Navigation>,
    animator: Box<dyn AnimationSink>,
    input: Box<dyn InputSource>,
    weapon: WeaponHitbox,
    body: BodyShape,
}

impl TryFrom<PlayerSpawn> for PlayerParts {
    type Error = SetupError;

    fn try_from(spawn: PlayerSpawn) -> Result<Self, SetupError> {
        const ACTOR: &str = "player";
        Ok(Self {
            transform: spawn.transform,
            navigation: spawn.navigation.ok_or(SetupError::MissingNavigation { actor: ACTOR })?,
            animator: spawn.animator.ok_or(SetupError::MissingAnimator { actor: ACTOR })?,
            input: spawn.input.ok_or(SetupError::MissingInput)?,
            weapon: spawn.weapon.ok_or(SetupError::MissingWeapon { actor: ACTOR })?,
            body: spawn.body,
        })
    }
}

/// Enemy parts after validation (target resolved separately).
struct EnemyParts {
    transform: Transform,
    navigation: Box<dyn Navigation>,
    animator: Box<dyn AnimationSink>,
    weapon: WeaponHitbox,
    body: BodyShape,
}

impl TryFrom<EnemySpawn> for EnemyParts {
    type Error = SetupError;

    fn try_from(spawn: EnemySpawn) -> Result<Self, SetupError> {
        const ACTOR: &str = "enemy";
        Ok(Self {
            transform: spawn.transform,
            navigation: spawn.navigation.ok_or(SetupError::MissingNavigation { actor: ACTOR })?,
            animator: spawn.animator.ok_or(SetupError::MissingAnimator { actor: ACTOR })?,
            weapon: spawn.weapon.ok_or(SetupError::MissingWeapon { actor: ACTOR })?,
            body: spawn.body,
        })
    }
}

// ============================================================================
// HUD
// ============================================================================

/// Read-only view of one actor for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HudSnapshot {
    pub health: u32,
    pub max_health: u32,
    pub posture: f32,
    pub max_posture: f32,
    /// Posture of the linked opponent (enemy guard bar)
    pub opponent_posture: Option<f32>,
    pub dead: bool,
}

// ============================================================================
// Facade
// ============================================================================

/// Running combat simulation.
pub struct CombatSimulation {
    app: App,
    config: CombatConfig,
    player: Option<Entity>,
}

impl CombatSimulation {
    /// Validate config and build the simulation around a host spatial backend.
    pub fn new(config: CombatConfig, spatial: Box<dyn SpatialQuery>) -> Result<Self, SetupError> {
        if let Err(err) = config.validate() {
            log_error(&format!("❌ Combat config rejected: {}", err));
            return Err(err.into());
        }

        let mut app = App::new();
        app.add_plugins(SimulationPlugin::new(config.clone()))
            .insert_resource(SpatialQueries(spatial));
        app.finish();
        app.cleanup();

        log_info(&format!(
            "⚔️ Combat simulation ready (seed {}, perception every {:.2}s)",
            config.simulation.seed, config.simulation.perception_interval
        ));

        Ok(Self {
            app,
            config,
            player: None,
        })
    }

    /// Simulation over the in-process spatial backend (no obstacles).
    pub fn headless(config: CombatConfig) -> Result<Self, SetupError> {
        Self::new(config, Box::new(HeadlessSpace::new()))
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    /// Player spawned by `spawn_duel`.
    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    /// Spawn the player and their opponent, linked to each other.
    ///
    /// Both descriptions are validated before anything is spawned.
    /// `enemy.target` is ignored: the duel opponent is always the player.
    pub fn spawn_duel(
        &mut self,
        player: PlayerSpawn,
        enemy: EnemySpawn,
    ) -> Result<(Entity, Entity), SetupError> {
        let player = PlayerParts::try_from(player).map_err(rejected)?;
        let enemy = EnemyParts::try_from(enemy).map_err(rejected)?;

        let player = self.spawn_player_parts(player);
        let enemy = self.spawn_enemy_parts(enemy, player);
        self.app.world_mut().entity_mut(player).insert(Opponent(enemy));
        self.player = Some(player);

        log_info(&format!("⚔️ Duel: player {:?} vs enemy {:?}", player, enemy));
        Ok((player, enemy))
    }

    /// Spawn an additional AI combatant against an existing actor.
    pub fn spawn_enemy(&mut self, enemy: EnemySpawn) -> Result<Entity, SetupError> {
        let target = enemy
            .target
            .ok_or(SetupError::MissingTarget { actor: "enemy" })
            .map_err(rejected)?;
        if self.app.world().get::<Actor>(target).is_none() {
            return Err(rejected(SetupError::UnknownTarget(target)));
        }

        let parts = EnemyParts::try_from(enemy).map_err(rejected)?;
        let entity = self.spawn_enemy_parts(parts, target);

        log_info(&format!("🤖 Enemy {:?} spawned against {:?}", entity, target));
        Ok(entity)
    }

    fn spawn_player_parts(&mut self, parts: PlayerParts) -> Entity {
        let config = &self.config;
        let world = self.app.world_mut();

        let entity = world
            .spawn((
                Actor {
                    kind: ActorKind::Player,
                },
                parts.transform,
                Health::new(config.player.max_health),
                Posture::new(config.player.max_posture).with_regen(
                    config.resources.posture_regen_rate,
                    config.resources.posture_regen_delay,
                ),
                Attacker {
                    base_damage: config.player.damage,
                },
                PlayerCombat::new(PlayerTuning::from_config(config)),
                parts.weapon,
                Navigator(parts.navigation),
                Animator(parts.animator),
                InputDevice(parts.input),
            ))
            .id();

        register_body(world, entity, parts.body, parts.transform.translation);
        entity
    }

    fn spawn_enemy_parts(&mut self, parts: EnemyParts, target: Entity) -> Entity {
        let config = &self.config;
        let world = self.app.world_mut();

        let entity = world
            .spawn((
                Actor {
                    kind: ActorKind::Enemy,
                },
                parts.transform,
                Health::new(config.enemy.max_health),
                Posture::new(config.enemy.max_posture).with_regen(
                    config.resources.posture_regen_rate,
                    config.resources.posture_regen_delay,
                ),
                Attacker {
                    base_damage: config.enemy.damage,
                },
                EnemyBrain::new(EnemyTuning::from_config(config)),
                Perception::from_config(&config.perception),
                parts.weapon,
                Navigator(parts.navigation),
                Animator(parts.animator),
                Opponent(target),
            ))
            .id();

        register_body(world, entity, parts.body, parts.transform.translation);
        entity
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// NaN / negative / infinite `dt` is dropped with a warning.
    pub fn tick(&mut self, dt: f32) {
        if !(dt >= 0.0) || !dt.is_finite() {
            log_warning(&format!("⚠️ tick({}) ignored: dt must be finite and >= 0", dt));
            return;
        }

        let world = self.app.world_mut();
        world.resource_mut::<SimClock>().advance(dt);

        // Main/First не запускаются, буферы событий крутим сами
        rotate_events::<MeleeHit>(world);
        rotate_events::<DamageDealt>(world);
        rotate_events::<EntityDied>(world);
        rotate_events::<ActorStunned>(world);

        world.run_schedule(CombatTick);
        world.clear_trackers();
    }

    /// Animation-event callback from the host animator.
    ///
    /// Returns the clip that was played, if any.
    pub fn on_animation_event(&mut self, actor: Entity, event: AnimationEvent) -> Option<String> {
        match event {
            AnimationEvent::Footstep { weight } => self.play_footstep(actor, weight),
        }
    }

    fn play_footstep(&mut self, actor: Entity, weight: f32) -> Option<String> {
        let footsteps = &self.config.footsteps;
        // Шаги из слабо смешанных клипов глушим
        if !(weight > footsteps.min_weight) || footsteps.clips.is_empty() {
            return None;
        }

        let world = self.app.world_mut();
        if world.get::<Dead>(actor).is_some() || world.get::<Animator>(actor).is_none() {
            return None;
        }

        let index = world
            .resource_mut::<DeterministicRng>()
            .rng
            .gen_range(0..footsteps.clips.len());
        let clip = footsteps.clips[index].clone();

        let mut animator = world.get_mut::<Animator>(actor)?;
        animator.0.play_clip(&clip);
        Some(clip)
    }

    /// Engine-authoritative actor transform (character controller, nav agent).
    pub fn set_transform(&mut self, actor: Entity, transform: Transform) -> bool {
        match self.app.world_mut().get_mut::<Transform>(actor) {
            Some(mut current) => {
                *current = transform;
                true
            }
            None => false,
        }
    }

    /// Weapon pose relative to the actor (hand bone / attachment point).
    pub fn set_weapon_pose(&mut self, actor: Entity, mount: Transform) -> bool {
        match self.app.world_mut().get_mut::<WeaponHitbox>(actor) {
            Some(mut weapon) => {
                weapon.mount = mount;
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn hud(&self, actor: Entity) -> Option<HudSnapshot> {
        let world = self.app.world();
        let health = world.get::<Health>(actor)?;
        let posture = world.get::<Posture>(actor)?;
        let opponent_posture = world
            .get::<Opponent>(actor)
            .and_then(|opponent| world.get::<Posture>(opponent.0))
            .map(|posture| posture.current);

        Some(HudSnapshot {
            health: health.current,
            max_health: health.max,
            posture: posture.current,
            max_posture: posture.max,
            opponent_posture,
            dead: world.get::<Dead>(actor).is_some(),
        })
    }

    pub fn health(&self, actor: Entity) -> Option<Health> {
        self.app.world().get::<Health>(actor).copied()
    }

    pub fn posture(&self, actor: Entity) -> Option<Posture> {
        self.app.world().get::<Posture>(actor).copied()
    }

    pub fn transform(&self, actor: Entity) -> Option<Transform> {
        self.app.world().get::<Transform>(actor).copied()
    }

    pub fn is_dead(&self, actor: Entity) -> bool {
        self.app.world().get::<Dead>(actor).is_some()
    }

    pub fn player_state(&self, actor: Entity) -> Option<PlayerState> {
        self.app
            .world()
            .get::<PlayerCombat>(actor)
            .map(|combat| combat.state)
    }

    pub fn enemy_state(&self, actor: Entity) -> Option<EnemyState> {
        self.app.world().get::<EnemyBrain>(actor).map(|brain| brain.state)
    }

    /// Last perception result (refreshed on the perception cadence).
    pub fn can_see_target(&self, actor: Entity) -> Option<bool> {
        self.app
            .world()
            .get::<Perception>(actor)
            .map(|perception| perception.can_see_target)
    }

    /// Hits resolved during the last tick.
    pub fn damage_events(&self) -> Vec<DamageDealt> {
        self.current_events()
    }

    /// Deaths during the last tick.
    pub fn death_events(&self) -> Vec<EntityDied> {
        self.current_events()
    }

    /// Stuns entered through hits during the last tick.
    pub fn stun_events(&self) -> Vec<ActorStunned> {
        self.current_events()
    }

    pub fn clock(&self) -> &SimClock {
        self.app.world().resource::<SimClock>()
    }

    fn current_events<T: Event + Copy>(&self) -> Vec<T> {
        self.app
            .world()
            .get_resource::<Events<T>>()
            .map(|events| events.iter_current_update_events().copied().collect())
            .unwrap_or_default()
    }
}

fn rotate_events<T: Event>(world: &mut World) {
    if let Some(mut events) = world.get_resource_mut::<Events<T>>() {
        events.update();
    }
}

fn register_body(world: &mut World, entity: Entity, body: BodyShape, position: Vec3) {
    let mut spatial = world.resource_mut::<SpatialQueries>();
    spatial.0.register_body(entity, body);
    spatial.0.sync_body(entity, position);
    log(&format!(
        "📦 Body registered for {:?} (layers {:#b})",
        entity, body.layers
    ));
}

fn rejected(err: SetupError) -> SetupError {
    log_error(&format!("❌ Spawn rejected: {}", err));
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{KinematicNavigator, RecordingAnimator, ScriptedInput};

    fn full_player() -> PlayerSpawn {
        PlayerSpawn::default()
            .navigation(KinematicNavigator::new(0.0))
            .animator(RecordingAnimator::new())
            .input(ScriptedInput::new())
            .weapon(WeaponHitbox::sword(LAYER_ENEMY))
    }

    fn full_enemy() -> EnemySpawn {
        EnemySpawn::at(Transform::from_xyz(0.0, 0.0, -5.0))
            .navigation(KinematicNavigator::new(1.0))
            .animator(RecordingAnimator::new())
            .weapon(WeaponHitbox::sword(LAYER_PLAYER))
    }

    fn actor_count(simulation: &mut CombatSimulation) -> usize {
        let world = simulation.world_mut();
        world.query::<&Actor>().iter(world).count()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CombatConfig::default();
        config.player.max_health = 0;
        let result = CombatSimulation::headless(config);
        assert!(matches!(result, Err(SetupError::Config(_))));
    }

    #[test]
    fn test_spawn_duel_links_opponents() {
        let mut simulation = CombatSimulation::headless(CombatConfig::default()).unwrap();
        let (player, enemy) = simulation.spawn_duel(full_player(), full_enemy()).unwrap();

        assert_eq!(simulation.player(), Some(player));
        assert_eq!(simulation.world().get::<Opponent>(player), Some(&Opponent(enemy)));
        assert_eq!(simulation.world().get::<Opponent>(enemy), Some(&Opponent(player)));

        let hud = simulation.hud(player).unwrap();
        assert_eq!(hud.health, 100);
        assert_eq!(hud.opponent_posture, Some(100.0));
        assert!(!hud.dead);
    }

    #[test]
    fn test_missing_capability_spawns_nothing() {
        let mut simulation = CombatSimulation::headless(CombatConfig::default()).unwrap();

        let no_input = PlayerSpawn::default()
            .navigation(KinematicNavigator::new(0.0))
            .animator(RecordingAnimator::new())
            .weapon(WeaponHitbox::sword(LAYER_ENEMY));
        let err = simulation.spawn_duel(no_input, full_enemy()).unwrap_err();
        assert!(matches!(err, SetupError::MissingInput));

        let no_weapon = EnemySpawn::default()
            .navigation(KinematicNavigator::new(1.0))
            .animator(RecordingAnimator::new());
        let err = simulation.spawn_duel(full_player(), no_weapon).unwrap_err();
        assert!(matches!(err, SetupError::MissingWeapon { actor: "enemy" }));

        assert_eq!(actor_count(&mut simulation), 0);
        assert_eq!(simulation.player(), None);
    }

    #[test]
    fn test_extra_enemy_needs_known_target() {
        let mut simulation = CombatSimulation::headless(CombatConfig::default()).unwrap();
        let (player, _) = simulation.spawn_duel(full_player(), full_enemy()).unwrap();

        let err = simulation.spawn_enemy(full_enemy()).unwrap_err();
        assert!(matches!(err, SetupError::MissingTarget { .. }));

        let stranger = simulation.world_mut().spawn_empty().id();
        let err = simulation.spawn_enemy(full_enemy().target(stranger)).unwrap_err();
        assert!(matches!(err, SetupError::UnknownTarget(e) if e == stranger));

        let second = simulation.spawn_enemy(full_enemy().target(player)).unwrap();
        assert_eq!(simulation.enemy_state(second), Some(EnemyState::Idle));
        assert_eq!(actor_count(&mut simulation), 3);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let mut simulation = CombatSimulation::headless(CombatConfig::default()).unwrap();
        simulation.tick(f32::NAN);
        simulation.tick(-1.0);
        simulation.tick(f32::INFINITY);
        assert_eq!(simulation.clock().tick, 0);

        simulation.tick(1.0 / 64.0);
        assert_eq!(simulation.clock().tick, 1);
    }

    #[test]
    fn test_footstep_needs_weight_and_clips() {
        let mut config = CombatConfig::default();
        config.footsteps.clips = vec!["step_a".into(), "step_b".into()];
        let mut simulation = CombatSimulation::headless(config).unwrap();

        let animator = RecordingAnimator::new();
        let probe = animator.probe();
        let player = PlayerSpawn::default()
            .navigation(KinematicNavigator::new(0.0))
            .animator(animator)
            .input(ScriptedInput::new())
            .weapon(WeaponHitbox::sword(LAYER_ENEMY));
        let (player, _) = simulation.spawn_duel(player, full_enemy()).unwrap();

        let quiet = simulation.on_animation_event(player, AnimationEvent::Footstep { weight: 0.5 });
        assert_eq!(quiet, None);

        let played = simulation.on_animation_event(player, AnimationEvent::Footstep { weight: 0.9 });
        let played = played.unwrap();
        assert!(played == "step_a" || played == "step_b");
        assert_eq!(probe.clips(), vec![played]);
    }
}
