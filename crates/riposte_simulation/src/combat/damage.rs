//! Hit application: MeleeHit → defender resource model → events.
//!
//! Все удары одного tick обрабатываются последовательно, по одному: каждый
//! видит результат предыдущего (single writer на защищающегося).

use bevy::prelude::*;

use crate::ai::EnemyBrain;
use crate::bridge::{anim, Animator, Navigator};
use crate::combat::resource_model::{receive_hit, CombatResourceModel, HitOutcome, HitRules};
use crate::components::{Dead, Health, Posture};
use crate::player::PlayerCombat;

/// Weapon contact reported by a hit check.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeleeHit {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
}

/// Result of an applied hit (including avoided ones).
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    /// Raw damage of the swing
    pub damage: u32,
    pub outcome: HitOutcome,
}

/// Actor reached zero health.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Actor's posture broke.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ActorStunned {
    pub entity: Entity,
    pub duration: f32,
}

type DefenderData = (
    &'static mut Health,
    &'static mut Posture,
    Option<&'static mut PlayerCombat>,
    Option<&'static mut EnemyBrain>,
    Option<&'static mut Animator>,
    Option<&'static mut Navigator>,
    Has<Dead>,
);

/// System: apply every MeleeHit of this tick to its defender.
///
/// Hits from or on dead actors are dropped. Mutations are visible to the
/// defender's own state machine on its next tick.
pub fn apply_melee_hits(
    mut commands: Commands,
    rules: Res<HitRules>,
    mut hits: EventReader<MeleeHit>,
    mut actors: Query<DefenderData>,
    mut dealt: EventWriter<DamageDealt>,
    mut died: EventWriter<EntityDied>,
    mut stunned: EventWriter<ActorStunned>,
) {
    for hit in hits.read() {
        if hit.attacker == hit.target {
            continue;
        }

        // Атакующий мог умереть раньше в этом же tick
        let attacker_alive = actors
            .get(hit.attacker)
            .map(|(health, .., dead)| health.is_alive() && !dead)
            .unwrap_or(false);
        if !attacker_alive {
            continue;
        }

        let Ok((mut health, mut posture, player, enemy, animator, navigator, dead)) =
            actors.get_mut(hit.target)
        else {
            continue;
        };
        if dead || !health.is_alive() {
            continue;
        }

        let model: &mut dyn CombatResourceModel = match (player, enemy) {
            (Some(player), _) => player.into_inner(),
            (None, Some(enemy)) => enemy.into_inner(),
            (None, None) => continue,
        };

        let outcome = receive_hit(model, &mut health, &mut posture, hit.damage, &rules);

        crate::logger::log(&format!(
            "🗡️ {:?} → {:?}: {:?} (health -{}, posture -{:.1}) → HP {}/{}, posture {:.1}",
            hit.attacker,
            hit.target,
            outcome.kind,
            outcome.health_lost,
            outcome.posture_lost,
            health.current,
            health.max,
            posture.current,
        ));

        if outcome.hit_reaction {
            if let Some(mut animator) = animator {
                animator.0.play_clip(anim::HIT_REACTION);
            }
        }

        dealt.write(DamageDealt {
            attacker: hit.attacker,
            target: hit.target,
            damage: hit.damage,
            outcome,
        });

        if outcome.stunned {
            crate::logger::log_info(&format!(
                "💫 {:?} posture broken, stunned for {:.1}s",
                hit.target, rules.stun_duration
            ));
            stunned.write(ActorStunned {
                entity: hit.target,
                duration: rules.stun_duration,
            });
        }

        if outcome.killed {
            crate::logger::log_info(&format!("💀 {:?} killed by {:?}", hit.target, hit.attacker));
            died.write(EntityDied {
                entity: hit.target,
                killer: Some(hit.attacker),
            });
            commands.entity(hit.target).insert(Dead);
        }

        if outcome.stunned || outcome.killed {
            if let Some(mut navigator) = navigator {
                navigator.0.stop();
            }
        }
    }
}
