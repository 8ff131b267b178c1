//! RIPOSTE Simulation Core
//!
//! Melee combat core на Bevy 0.16 ECS: perception, health/posture, hit resolution,
//! player / enemy state machines.
//!
//! HYBRID ARCHITECTURE:
//! - ECS = strategic layer (combat state, AI decisions, damage rules)
//! - Host engine = tactical layer (physics queries, navigation, animation, input)
//!   через traits из `bridge`
//!
//! Хост управляет временем сам: `CombatSimulation::tick(dt)`.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod bridge;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod player;
pub mod schedules;
pub mod simulation;

// Re-export базовых типов для удобства
pub use ai::{AiPlugin, EnemyBrain, EnemyState, Perception};
pub use bridge::{
    AnimationEvent, AnimationSink, Button, InputSource, Navigation, SpatialQuery, LAYER_ENEMY,
    LAYER_ENVIRONMENT, LAYER_PLAYER,
};
pub use combat::{
    ActorStunned, CombatPlugin, DamageDealt, EntityDied, HitOutcome, HitOutcomeKind, MeleeHit,
    WeaponHitbox,
};
pub use components::*;
pub use config::CombatConfig;
pub use error::{ConfigError, SetupError};
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel,
    LogPrinter,
};
pub use player::{PlayerCombat, PlayerPlugin, PlayerState};
pub use schedules::{CombatSet, CombatTick, PerceptionTick, SimClock};
pub use simulation::{CombatSimulation, EnemySpawn, HudSnapshot, PlayerSpawn};

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin {
    pub config: CombatConfig,
}

impl SimulationPlugin {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }
}

impl Default for SimulationPlugin {
    fn default() -> Self {
        Self::new(CombatConfig::default())
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let simulation = &self.config.simulation;

        app
            // Часы tick'а (двигает хост через CombatSimulation::tick)
            .insert_resource(SimClock::default())
            .insert_resource(schedules::PerceptionClock::new(simulation.perception_interval))
            // Детерминистичный RNG (seed из конфига)
            .insert_resource(DeterministicRng::new(simulation.seed))
            .insert_resource(self.config.clone())
            // Подсистемы (ECS strategic layer)
            .add_plugins((CombatPlugin, PlayerPlugin, AiPlugin))
            // Таблица урона из конфига (поверх default из CombatPlugin)
            .insert_resource(combat::HitRules::from_config(&self.config));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Snapshot мира для сравнения детерминизма
///
/// Компоненты сериализуются через Debug в порядке Entity index.
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
