//! Combat resource model: общий контракт игрока и врага для приёма удара.
//!
//! Health/Posture живут в компонентах актора, а state machine (PlayerCombat,
//! EnemyBrain) отвечает только за stance и stun. `receive_hit` связывает одно с
//! другим и является единственным местом, где считается урон от удара.

use bevy::prelude::Resource;

use crate::components::{Health, Posture};
use crate::config::CombatConfig;

/// How the defender meets an incoming hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseStance {
    /// Idle or attacking
    Open,
    Blocking,
    Parrying,
    Dodging,
    Stunned,
}

/// State-machine side of an actor that can be hit.
///
/// Implemented by both actor kinds so hit resolution never needs to know which
/// one it is talking to.
pub trait CombatResourceModel {
    fn stance(&self) -> DefenseStance;

    fn is_stunned(&self) -> bool;

    /// Force the stunned state for `duration` seconds.
    ///
    /// Returns false (and changes nothing) when already stunned: stun is never
    /// stacked or refreshed.
    fn enter_stun(&mut self, duration: f32) -> bool;
}

/// Damage table parameters.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct HitRules {
    pub block_health_divisor: u32,
    pub block_posture_factor: f32,
    pub open_posture_factor: f32,
    pub stun_duration: f32,
}

impl Default for HitRules {
    fn default() -> Self {
        Self::from_config(&CombatConfig::default())
    }
}

impl HitRules {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            block_health_divisor: config.resolution.block_health_divisor.max(1),
            block_posture_factor: config.resolution.block_posture_factor,
            open_posture_factor: config.resolution.open_posture_factor,
            stun_duration: config.resources.stun_duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcomeKind {
    Parried,
    Dodged,
    Blocked,
    Struck,
    /// Hit landed on a stunned defender (posture locked)
    StruckWhileStunned,
}

impl HitOutcomeKind {
    pub fn is_avoided(&self) -> bool {
        matches!(self, HitOutcomeKind::Parried | HitOutcomeKind::Dodged)
    }
}

/// What one hit did to its defender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub kind: HitOutcomeKind,
    pub health_lost: u32,
    pub posture_lost: f32,
    /// Defender should play the hit-reaction clip
    pub hit_reaction: bool,
    /// This hit broke posture and started a stun
    pub stunned: bool,
    /// This hit took the last health point
    pub killed: bool,
}

impl HitOutcome {
    fn avoided(kind: HitOutcomeKind) -> Self {
        Self {
            kind,
            health_lost: 0,
            posture_lost: 0.0,
            hit_reaction: false,
            stunned: false,
            killed: false,
        }
    }
}

/// Apply one incoming hit of `damage` to a defender.
///
/// | stance    | health            | posture           |
/// |-----------|-------------------|-------------------|
/// | parrying  | 0                 | 0                 |
/// | dodging   | 0                 | 0                 |
/// | blocking  | −⌊d / divisor⌋    | −d × block factor |
/// | open      | −d                | −d × open factor  |
/// | stunned   | −d                | 0                 |
///
/// Every non-avoided hit restarts the posture regen pause. Posture reaching zero
/// on a living, unstunned defender starts exactly one stun.
pub fn receive_hit<M>(
    model: &mut M,
    health: &mut Health,
    posture: &mut Posture,
    damage: u32,
    rules: &HitRules,
) -> HitOutcome
where
    M: CombatResourceModel + ?Sized,
{
    let stance = if model.is_stunned() {
        DefenseStance::Stunned
    } else {
        model.stance()
    };

    let (kind, health_damage, posture_damage, hit_reaction) = match stance {
        DefenseStance::Parrying => return HitOutcome::avoided(HitOutcomeKind::Parried),
        DefenseStance::Dodging => return HitOutcome::avoided(HitOutcomeKind::Dodged),
        DefenseStance::Blocking => (
            HitOutcomeKind::Blocked,
            damage / rules.block_health_divisor.max(1),
            damage as f32 * rules.block_posture_factor,
            false,
        ),
        DefenseStance::Open => (
            HitOutcomeKind::Struck,
            damage,
            damage as f32 * rules.open_posture_factor,
            true,
        ),
        DefenseStance::Stunned => (HitOutcomeKind::StruckWhileStunned, damage, 0.0, true),
    };

    let was_alive = health.is_alive();
    let health_lost = health.take_damage(health_damage);
    let posture_lost = posture.take_damage(posture_damage);
    posture.suppress_regen();

    let killed = was_alive && !health.is_alive();
    let stunned = !killed
        && health.is_alive()
        && posture.is_broken()
        && model.enter_stun(rules.stun_duration);

    HitOutcome {
        kind,
        health_lost,
        posture_lost,
        hit_reaction,
        stunned,
        killed,
    }
}
