//! Engine bridge: capabilities the combat core consumes from its host
//!
//! Core не знает про физику, навигацию, анимации и устройства ввода.
//! Хост (engine shell) реализует эти traits и передаёт их при создании актора.
//!
//! - `SpatialQuery`: overlap sphere / capsule, raycast (один на симуляцию)
//! - `Navigation`: движение конкретного актора
//! - `AnimationSink`: fire-and-forget параметры аниматора
//! - `InputSource`: кнопки игрока, опрашиваются раз в tick
//!
//! `headless` содержит in-process реализации для тестов и headless binary.

use bevy::prelude::*;

pub mod headless;

pub use headless::{
    AnimatorProbe, HeadlessSpace, InputScript, KinematicNavigator, NavigationProbe, Obstacle,
    RecordingAnimator, ScriptedInput,
};

// ============================================================================
// Collision layers
// ============================================================================

/// Player bodies (enemy weapons and enemy perception look for this layer)
pub const LAYER_PLAYER: u32 = 0b10;

/// Enemy bodies (player weapon looks for this layer)
pub const LAYER_ENEMY: u32 = 0b100;

/// Walls and props: anything that blocks line of sight
pub const LAYER_ENVIRONMENT: u32 = 0b1000;

/// Animator parameter and clip names written by the core.
pub mod anim {
    pub const ATTACK: &str = "Attack";
    pub const PARRY: &str = "Parry";
    pub const DODGE: &str = "Dodge";
    pub const SPEED: &str = "Speed";
    pub const HIT_REACTION: &str = "HitReaction";
}

// ============================================================================
// Spatial queries
// ============================================================================

/// One collider returned by an overlap query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderHit {
    /// Combat entity owning the collider (actors can own several colliders)
    pub entity: Entity,
    pub position: Vec3,
    pub layers: u32,
}

/// Body shape an actor registers with the spatial backend.
///
/// Upright capsule: from `position` up to `position + Y * height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyShape {
    pub radius: f32,
    pub height: f32,
    pub layers: u32,
}

impl BodyShape {
    pub fn humanoid(layers: u32) -> Self {
        Self {
            radius: 0.4,
            height: 1.8,
            layers,
        }
    }
}

/// Collision queries against the host's physics world.
///
/// Results are in no guaranteed order; callers pick deterministically from what
/// they get. Empty results are normal.
pub trait SpatialQuery: Send + Sync + 'static {
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: u32) -> Vec<ColliderHit>;

    fn overlap_capsule(&self, start: Vec3, end: Vec3, radius: f32) -> Vec<ColliderHit>;

    /// `direction` is normalized by the caller.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: u32) -> bool;

    /// Actor spawned. Engine backends that own their colliders ignore this.
    fn register_body(&mut self, _entity: Entity, _shape: BodyShape) {}

    /// Actor position as seen by the core this tick.
    fn sync_body(&mut self, _entity: Entity, _position: Vec3) {}
}

/// Spatial backend of the running simulation.
#[derive(Resource)]
pub struct SpatialQueries(pub Box<dyn SpatialQuery>);

// ============================================================================
// Per-actor capabilities
// ============================================================================

/// Movement capability bound to one actor (nav agent, character controller).
pub trait Navigation: Send + Sync + 'static {
    fn set_destination(&mut self, point: Vec3);

    fn set_speed(&mut self, speed: f32);

    /// Halt immediately; the next `set_destination` resumes.
    fn stop(&mut self);

    /// In-process backends move the actor themselves and return the new position.
    /// Engine-driven agents return `None` and push transforms back via the host.
    fn advance(&mut self, _from: Vec3, _dt: f32) -> Option<Vec3> {
        None
    }
}

/// Fire-and-forget animator parameters.
pub trait AnimationSink: Send + Sync + 'static {
    fn set_bool(&mut self, name: &str, value: bool);

    fn set_float(&mut self, name: &str, value: f32);

    fn play_clip(&mut self, name: &str);
}

/// Logical buttons the player state machine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Attack,
    /// Parry on press, block while held
    Parry,
    Dodge,
}

/// Player input device, polled once per tick.
pub trait InputSource: Send + Sync + 'static {
    /// Pressed during this tick.
    fn is_button_down(&self, button: Button) -> bool;

    /// Currently held (true on the press tick as well).
    fn is_button_held(&self, button: Button) -> bool;

    /// Called after the player tick has sampled the device.
    fn end_tick(&mut self) {}
}

#[derive(Component)]
pub struct Navigator(pub Box<dyn Navigation>);

#[derive(Component)]
pub struct Animator(pub Box<dyn AnimationSink>);

#[derive(Component)]
pub struct InputDevice(pub Box<dyn InputSource>);

/// Animation-event callbacks forwarded by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent {
    /// Foot hit the ground in a locomotion clip blended at `weight`.
    Footstep { weight: f32 },
}

// ============================================================================
// Systems
// ============================================================================

/// System: push actor positions into the spatial backend.
pub fn sync_spatial_bodies(
    mut spatial: ResMut<SpatialQueries>,
    actors: Query<(Entity, &Transform), With<crate::components::Actor>>,
) {
    for (entity, transform) in actors.iter() {
        spatial.0.sync_body(entity, transform.translation);
    }
}

/// System: in-process navigation backends move their actors.
///
/// Actors turn (yaw only) toward where they walk, like a nav agent would.
pub fn advance_navigation(
    clock: Res<crate::schedules::SimClock>,
    mut actors: Query<(&mut Transform, &mut Navigator), Without<crate::components::Dead>>,
) {
    for (mut transform, mut navigator) in actors.iter_mut() {
        let Some(position) = navigator.0.advance(transform.translation, clock.delta) else {
            continue;
        };

        let mut heading = position - transform.translation;
        heading.y = 0.0;
        transform.translation = position;
        if heading.length_squared() > f32::EPSILON {
            transform.look_to(heading.normalize(), Vec3::Y);
        }
    }
}
