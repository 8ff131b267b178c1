//! Weapon hitbox: capsule descriptor + overlap sweep.
//!
//! Капсула задана в локальных координатах оружия (center, axis, half_length),
//! оружие крепится к актору через `mount` (поза кисти, обновляется хостом через
//! `CombatSimulation::set_weapon_pose`). В world space: actor ∘ mount ∘ point.

use bevy::prelude::*;

use crate::bridge::{anim, Animator, SpatialQueries, SpatialQuery};
use crate::combat::damage::MeleeHit;
use crate::components::{Attacker, Dead};
use crate::player::PlayerCombat;

/// Capsule swept by a weapon during its attack window.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct WeaponHitbox {
    /// Weapon pose relative to the actor
    pub mount: Transform,
    /// Capsule center in weapon space
    pub center: Vec3,
    /// Capsule axis in weapon space (unit)
    pub axis: Vec3,
    /// Distance from center to each end sphere center
    pub half_length: f32,
    pub radius: f32,
    /// Layers this weapon can damage
    pub target_mask: u32,
}

impl WeaponHitbox {
    /// Build from engine capsule-collider parameters (`height` includes the end caps).
    pub fn from_collider(center: Vec3, axis: Vec3, height: f32, radius: f32, target_mask: u32) -> Self {
        Self {
            mount: Transform::IDENTITY,
            center,
            axis: axis.normalize_or_zero(),
            half_length: (height / 2.0 - radius).max(0.0),
            radius,
            target_mask,
        }
    }

    /// One-handed sword held forward at chest height: blade spans 0.4..1.4m in front.
    pub fn sword(target_mask: u32) -> Self {
        Self::from_collider(Vec3::new(0.0, 0.0, -0.9), Vec3::Z, 1.2, 0.1, target_mask)
            .with_mount(Transform::from_xyz(0.0, 1.2, 0.0))
    }

    pub fn with_mount(mut self, mount: Transform) -> Self {
        self.mount = mount;
        self
    }

    /// Capsule end points in world space for an actor at `actor`.
    pub fn world_segment(&self, actor: &Transform) -> (Vec3, Vec3) {
        let weapon = actor.mul_transform(self.mount);
        let offset = self.axis * self.half_length;
        (
            weapon.transform_point(self.center - offset),
            weapon.transform_point(self.center + offset),
        )
    }
}

/// Distinct damageable entities touched by the weapon right now.
///
/// Order follows the backend's result order; the attacker itself is never returned.
/// `damageable` отсекает тела, которые бить уже нельзя (трупы остаются в physics).
pub fn sweep_weapon(
    spatial: &dyn SpatialQuery,
    hitbox: &WeaponHitbox,
    actor: &Transform,
    attacker: Entity,
    damageable: impl Fn(Entity) -> bool,
) -> Vec<Entity> {
    let (start, end) = hitbox.world_segment(actor);
    let mut targets: Vec<Entity> = Vec::new();

    for hit in spatial.overlap_capsule(start, end, hitbox.radius) {
        if hit.entity == attacker || hit.layers & hitbox.target_mask == 0 {
            continue;
        }
        if !damageable(hit.entity) {
            continue;
        }
        if !targets.contains(&hit.entity) {
            targets.push(hit.entity);
        }
    }

    targets
}

/// System: hit check for attacking players.
///
/// Runs every tick of the attack window. The first contact with a living target
/// ends the swing: player → Idle, Attack flag lowered (cooldown keeps running).
pub fn detect_player_hits(
    spatial: Res<SpatialQueries>,
    mut players: Query<
        (
            Entity,
            &Transform,
            &WeaponHitbox,
            &Attacker,
            &mut PlayerCombat,
            &mut Animator,
        ),
        Without<Dead>,
    >,
    corpses: Query<(), With<Dead>>,
    mut hits: EventWriter<MeleeHit>,
) {
    for (entity, transform, hitbox, attacker, mut combat, mut animator) in players.iter_mut() {
        if !combat.is_attacking() {
            continue;
        }

        let targets = sweep_weapon(spatial.0.as_ref(), hitbox, transform, entity, |target| {
            !corpses.contains(target)
        });
        if targets.is_empty() {
            continue;
        }

        for target in targets {
            crate::logger::log(&format!("⚔️ Player {:?} hit {:?}", entity, target));
            hits.write(MeleeHit {
                attacker: entity,
                target,
                damage: attacker.base_damage,
            });
        }

        combat.finish_swing();
        animator.0.set_bool(anim::ATTACK, false);
    }
}
