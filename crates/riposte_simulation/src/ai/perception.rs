//! Field-of-view check для AI (radius → angle → occlusion probe).
//!
//! Обновляется в PerceptionTick (0.2s), между обновлениями `can_see_target`
//! может устареть максимум на один период.

use bevy::prelude::*;

use crate::bridge::{SpatialQueries, SpatialQuery};
use crate::components::Dead;
use crate::config::PerceptionConfig;

/// Perception record of an AI actor.
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Perception {
    pub can_see_target: bool,
    pub view_radius: f32,
    /// Degrees either side of facing
    pub view_half_angle: f32,
    pub occlusion_probe_distance: f32,
    pub target_mask: u32,
    pub obstruction_mask: u32,
}

impl Default for Perception {
    fn default() -> Self {
        Self::from_config(&PerceptionConfig::default())
    }
}

impl Perception {
    pub fn from_config(config: &PerceptionConfig) -> Self {
        Self {
            can_see_target: false,
            view_radius: config.view_radius,
            view_half_angle: config.view_half_angle,
            occlusion_probe_distance: config.occlusion_probe_distance,
            target_mask: config.target_mask,
            obstruction_mask: config.obstruction_mask,
        }
    }

    /// Sample the surroundings of `actor` and update `can_see_target`.
    ///
    /// First matching collider (other than the actor itself) is the candidate.
    /// Returns the new value.
    pub fn refresh(&mut self, spatial: &dyn SpatialQuery, actor: Entity, transform: &Transform) -> bool {
        let origin = transform.translation;

        let candidate = spatial
            .overlap_sphere(origin, self.view_radius, self.target_mask)
            .into_iter()
            .find(|hit| hit.entity != actor);

        self.can_see_target = match candidate {
            Some(hit) => {
                let offset = hit.position - origin;
                let distance = offset.length();
                let direction = offset.normalize_or_zero();
                let facing = *transform.forward();

                // Вплотную: направление не определено, цель считается видимой
                let within_angle = direction == Vec3::ZERO
                    || facing.angle_between(direction).to_degrees() < self.view_half_angle;

                within_angle
                    && !spatial.raycast(
                        origin,
                        direction,
                        self.occlusion_probe_distance.min(distance),
                        self.obstruction_mask,
                    )
            }
            None => false,
        };

        self.can_see_target
    }
}

/// System (PerceptionTick): refresh every living AI actor.
pub fn refresh_perception(
    spatial: Res<SpatialQueries>,
    mut actors: Query<(Entity, &Transform, &mut Perception), Without<Dead>>,
) {
    for (entity, transform, mut perception) in actors.iter_mut() {
        let before = perception.can_see_target;
        let now = perception.refresh(spatial.0.as_ref(), entity, transform);

        if before != now {
            crate::logger::log(&format!(
                "👁️ Enemy {:?}: target {}",
                entity,
                if now { "spotted" } else { "lost" }
            ));
        }
    }
}
