//! Combat system module
//!
//! ECS ответственность:
//! - Game state: Health, Posture, stance (через `CombatResourceModel`)
//! - Combat rules: damage table, stun, posture regen
//! - Hit detection: weapon capsule sweep через `SpatialQuery`
//! - Events: MeleeHit, DamageDealt, EntityDied, ActorStunned
//!
//! Engine ответственность (bridge):
//! - Collision queries, animation playback, navigation

use bevy::ecs::schedule::ExecutorKind;
use bevy::prelude::*;

use crate::bridge::{advance_navigation, sync_spatial_bodies};
use crate::schedules::{run_perception_timer, CombatSet, CombatTick, PerceptionTick};

pub mod damage;
pub mod hitbox;
pub mod posture;
pub mod resource_model;
pub mod scheduler;


// Re-export основных типов
pub use damage::{apply_melee_hits, ActorStunned, DamageDealt, EntityDied, MeleeHit};
pub use hitbox::{detect_player_hits, sweep_weapon, WeaponHitbox};
pub use posture::{regenerate_posture, tick_stun};
pub use resource_model::{
    receive_hit, CombatResourceModel, DefenseStance, HitOutcome, HitOutcomeKind, HitRules,
};
pub use scheduler::{TaskQueue, TaskToken};

/// Combat Plugin
///
/// Создаёт CombatTick / PerceptionTick (single-threaded executor для
/// детерминизма) и фиксирует порядок фаз `CombatSet`.
///
/// Системы этого плагина:
/// 1. sync_spatial_bodies: позиции акторов → spatial backend
/// 2. run_perception_timer: cadence 0.2s → PerceptionTick
/// 3. detect_player_hits: sweep оружия атакующего игрока
/// 4. apply_melee_hits: MeleeHit → receive_hit защищающегося
/// 5. regenerate_posture
/// 6. advance_navigation
///
/// Decision / enemy tasks / player FSM добавляют AiPlugin и PlayerPlugin.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        // Регистрация событий
        app.add_event::<MeleeHit>()
            .add_event::<DamageDealt>()
            .add_event::<EntityDied>()
            .add_event::<ActorStunned>();

        app.init_resource::<HitRules>();

        app.edit_schedule(CombatTick, |schedule| {
            schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        });
        app.edit_schedule(PerceptionTick, |schedule| {
            schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        });

        app.configure_sets(
            CombatTick,
            (
                CombatSet::SyncBodies,
                CombatSet::Perception,
                CombatSet::Decision,
                CombatSet::EnemyTasks,
                CombatSet::EnemyActions,
                CombatSet::Player,
                CombatSet::HitDetection,
                CombatSet::Resolution,
                CombatSet::Regeneration,
                CombatSet::Movement,
            )
                .chain(), // Последовательное выполнение
        );

        app.add_systems(
            CombatTick,
            (
                sync_spatial_bodies.in_set(CombatSet::SyncBodies),
                run_perception_timer.in_set(CombatSet::Perception),
                detect_player_hits.in_set(CombatSet::HitDetection),
                apply_melee_hits.in_set(CombatSet::Resolution),
                regenerate_posture.in_set(CombatSet::Regeneration),
                advance_navigation.in_set(CombatSet::Movement),
            ),
        );
    }
}
