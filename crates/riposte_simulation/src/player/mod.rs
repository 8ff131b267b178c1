//! Player-controlled combatant.

use bevy::prelude::*;

use crate::schedules::{CombatSet, CombatTick};

pub mod fsm;


pub use fsm::{player_fsm, PlayerCombat, PlayerState, PlayerTask, PlayerTuning};

/// Player Plugin: state machine в фазе `CombatSet::Player`.
pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(CombatTick, player_fsm.in_set(CombatSet::Player));
    }
}
