//! AI decision-making module
//!
//! Perception (FOV, 0.2s cadence) + enemy FSM (Idle / MoveTowards / Attack / Dead).

use bevy::prelude::*;

use crate::schedules::{CombatSet, CombatTick, PerceptionTick};

pub mod fsm;
pub mod perception;


// Re-export основных типов
pub use fsm::{
    ai_actions, ai_decision, decide_state, run_enemy_tasks, EnemyBrain, EnemyState, EnemyTask,
    EnemyTuning,
};
pub use perception::{refresh_perception, Perception};

/// AI Plugin
///
/// PerceptionTick: refresh_perception.
/// CombatTick: ai_decision → run_enemy_tasks → ai_actions (по фазам `CombatSet`).
pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PerceptionTick, refresh_perception);

        app.add_systems(
            CombatTick,
            (
                ai_decision.in_set(CombatSet::Decision),
                run_enemy_tasks.in_set(CombatSet::EnemyTasks),
                ai_actions.in_set(CombatSet::EnemyActions),
            ),
        );
    }
}
