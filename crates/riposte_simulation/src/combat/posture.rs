//! Posture regeneration and stun countdown.

use bevy::prelude::*;

use crate::components::{Dead, Posture};
use crate::schedules::SimClock;

/// Count a stun down by `delta_time`. Returns true on the tick it expires.
pub fn tick_stun(remaining: &mut f32, delta_time: f32) -> bool {
    if *remaining <= 0.0 {
        return false;
    }
    *remaining -= delta_time;
    if *remaining <= 0.0 {
        *remaining = 0.0;
        true
    } else {
        false
    }
}

/// System: regenerate posture of every living actor.
///
/// Stunned actors sit at zero posture, and `Posture::regenerate` leaves a broken
/// posture alone until stun recovery restores it.
pub fn regenerate_posture(
    clock: Res<SimClock>,
    mut actors: Query<&mut Posture, Without<Dead>>,
) {
    for mut posture in actors.iter_mut() {
        posture.regenerate(clock.delta);
    }
}
