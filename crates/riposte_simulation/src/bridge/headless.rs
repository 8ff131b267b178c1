//! Headless bridge: in-process реализации для тестов и headless binary
//!
//! Заменяет engine physics/navmesh/animator простыми геометрическими моделями:
//! - `HeadlessSpace`: акторы как вертикальные капсулы, препятствия как сферы/AABB
//! - `KinematicNavigator`: прямолинейное движение к destination (XZ plane)
//! - `RecordingAnimator`: запоминает параметры, тест читает через `AnimatorProbe`
//! - `ScriptedInput`: кнопки нажимаются из теста через `InputScript`

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use super::{AnimationSink, BodyShape, Button, ColliderHit, InputSource, Navigation, SpatialQuery};

const EPSILON: f32 = 1e-6;

// ============================================================================
// Spatial
// ============================================================================

/// Static obstacle (only blocks raycasts; does not damage or get damaged).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obstacle {
    Sphere { center: Vec3, radius: f32, layers: u32 },
    Aabb { min: Vec3, max: Vec3, layers: u32 },
}

impl Obstacle {
    fn layers(&self) -> u32 {
        match self {
            Obstacle::Sphere { layers, .. } | Obstacle::Aabb { layers, .. } => *layers,
        }
    }

    fn ray_hit(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        match *self {
            Obstacle::Sphere { center, radius, .. } => {
                ray_sphere(origin, direction, center, radius)
                    .is_some_and(|t| t <= max_distance)
            }
            Obstacle::Aabb { min, max, .. } => ray_aabb(origin, direction, min, max, max_distance),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeadlessBody {
    entity: Entity,
    position: Vec3,
    shape: BodyShape,
}

impl HeadlessBody {
    fn segment(&self) -> (Vec3, Vec3) {
        let base = self.position + Vec3::Y * self.shape.radius;
        let top = self.position + Vec3::Y * (self.shape.height - self.shape.radius).max(self.shape.radius);
        (base, top)
    }

    fn hit(&self) -> ColliderHit {
        ColliderHit {
            entity: self.entity,
            position: self.position,
            layers: self.shape.layers,
        }
    }
}

/// In-process spatial backend.
///
/// Bodies keep registration order, so query results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSpace {
    bodies: Vec<HeadlessBody>,
    obstacles: Vec<Obstacle>,
}

impl HeadlessSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }
}

impl SpatialQuery for HeadlessSpace {
    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: u32) -> Vec<ColliderHit> {
        self.bodies
            .iter()
            .filter(|body| body.shape.layers & mask != 0)
            .filter(|body| {
                let (a, b) = body.segment();
                let reach = radius + body.shape.radius;
                point_segment_distance_sq(center, a, b) <= reach * reach
            })
            .map(HeadlessBody::hit)
            .collect()
    }

    fn overlap_capsule(&self, start: Vec3, end: Vec3, radius: f32) -> Vec<ColliderHit> {
        self.bodies
            .iter()
            .filter(|body| {
                let (a, b) = body.segment();
                let reach = radius + body.shape.radius;
                segment_distance_sq(start, end, a, b) <= reach * reach
            })
            .map(HeadlessBody::hit)
            .collect()
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: u32) -> bool {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return false;
        }
        self.obstacles
            .iter()
            .filter(|obstacle| obstacle.layers() & mask != 0)
            .any(|obstacle| obstacle.ray_hit(origin, direction, max_distance))
    }

    fn register_body(&mut self, entity: Entity, shape: BodyShape) {
        if let Some(body) = self.bodies.iter_mut().find(|b| b.entity == entity) {
            body.shape = shape;
            return;
        }
        self.bodies.push(HeadlessBody {
            entity,
            position: Vec3::ZERO,
            shape,
        });
    }

    fn sync_body(&mut self, entity: Entity, position: Vec3) {
        if let Some(body) = self.bodies.iter_mut().find(|b| b.entity == entity) {
            body.position = position;
        }
    }
}

/// Squared distance from `p` to segment `a..b`.
fn point_segment_distance_sq(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

/// Squared distance between segments `p1..q1` and `p2..q2` (closest points).
fn segment_distance_sq(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> f32 {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPSILON && e <= EPSILON {
        return r.length_squared();
    }

    let (s, t) = if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            // Параллельные отрезки: берём любую точку на первом
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let closest1 = p1 + d1 * s;
    let closest2 = p2 + d2 * t;
    closest1.distance_squared(closest2)
}

/// Distance along the ray to the sphere surface (0 if origin is inside).
fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(direction);
    let c = m.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some((-b - discriminant.sqrt()).max(0.0))
}

/// Slab test clipped to `[0, max_distance]`.
fn ray_aabb(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3, max_distance: f32) -> bool {
    let mut t_min = 0.0_f32;
    let mut t_max = max_distance;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() <= EPSILON {
            if o < min[axis] || o > max[axis] {
                return false;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (min[axis] - o) * inv;
        let mut t2 = (max[axis] - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return false;
        }
    }
    true
}

// ============================================================================
// Navigation
// ============================================================================

/// Snapshot of what the core asked a navigator to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationState {
    pub destination: Option<Vec3>,
    pub speed: f32,
    pub stopped: bool,
}

/// Shared read handle for a `KinematicNavigator`.
#[derive(Debug, Clone, Default)]
pub struct NavigationProbe(Arc<Mutex<NavigationState>>);

impl NavigationProbe {
    pub fn state(&self) -> NavigationState {
        self.0.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Straight-line mover on the XZ plane, stops `arrive_distance` short of the goal.
#[derive(Debug, Clone, Default)]
pub struct KinematicNavigator {
    state: NavigationProbe,
    arrive_distance: f32,
}

impl KinematicNavigator {
    pub fn new(arrive_distance: f32) -> Self {
        Self {
            state: NavigationProbe::default(),
            arrive_distance,
        }
    }

    pub fn probe(&self) -> NavigationProbe {
        self.state.clone()
    }
}

impl Navigation for KinematicNavigator {
    fn set_destination(&mut self, point: Vec3) {
        if let Ok(mut state) = self.state.0.lock() {
            state.destination = Some(point);
            state.stopped = false;
        }
    }

    fn set_speed(&mut self, speed: f32) {
        if let Ok(mut state) = self.state.0.lock() {
            state.speed = speed.max(0.0);
        }
    }

    fn stop(&mut self) {
        if let Ok(mut state) = self.state.0.lock() {
            state.stopped = true;
            state.speed = 0.0;
        }
    }

    fn advance(&mut self, from: Vec3, dt: f32) -> Option<Vec3> {
        let state = self.state.state();
        if state.stopped || state.speed <= 0.0 {
            return None;
        }
        let destination = state.destination?;

        let mut to_goal = destination - from;
        to_goal.y = 0.0;
        let distance = to_goal.length();
        if distance <= self.arrive_distance {
            return None;
        }

        let step = (state.speed * dt).min(distance - self.arrive_distance);
        Some(from + to_goal / distance * step)
    }
}

// ============================================================================
// Animation
// ============================================================================

#[derive(Debug, Clone, Default)]
struct AnimatorState {
    bools: HashMap<String, bool>,
    floats: HashMap<String, f32>,
    clips: Vec<String>,
}

/// Shared read handle for a `RecordingAnimator`.
#[derive(Debug, Clone, Default)]
pub struct AnimatorProbe(Arc<Mutex<AnimatorState>>);

impl AnimatorProbe {
    /// Last value written to a bool parameter (false if never written).
    pub fn flag(&self, name: &str) -> bool {
        self.0
            .lock()
            .ok()
            .and_then(|s| s.bools.get(name).copied())
            .unwrap_or(false)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.0.lock().ok().and_then(|s| s.floats.get(name).copied())
    }

    /// Clips played so far, in order.
    pub fn clips(&self) -> Vec<String> {
        self.0.lock().map(|s| s.clips.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingAnimator {
    state: AnimatorProbe,
}

impl RecordingAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> AnimatorProbe {
        self.state.clone()
    }
}

impl AnimationSink for RecordingAnimator {
    fn set_bool(&mut self, name: &str, value: bool) {
        if let Ok(mut state) = self.state.0.lock() {
            state.bools.insert(name.to_string(), value);
        }
    }

    fn set_float(&mut self, name: &str, value: f32) {
        if let Ok(mut state) = self.state.0.lock() {
            state.floats.insert(name.to_string(), value);
        }
    }

    fn play_clip(&mut self, name: &str) {
        if let Ok(mut state) = self.state.0.lock() {
            state.clips.push(name.to_string());
        }
    }
}

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, Clone, Default)]
struct InputState {
    pressed: HashSet<Button>,
    held: HashSet<Button>,
}

/// Test/demo handle that drives a `ScriptedInput`.
#[derive(Debug, Clone, Default)]
pub struct InputScript(Arc<Mutex<InputState>>);

impl InputScript {
    /// Press for exactly one tick.
    pub fn tap(&self, button: Button) {
        if let Ok(mut state) = self.0.lock() {
            state.pressed.insert(button);
        }
    }

    /// Press and keep holding until `release`.
    pub fn hold(&self, button: Button) {
        if let Ok(mut state) = self.0.lock() {
            state.pressed.insert(button);
            state.held.insert(button);
        }
    }

    pub fn release(&self, button: Button) {
        if let Ok(mut state) = self.0.lock() {
            state.held.remove(&button);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: InputScript,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> InputScript {
        self.script.clone()
    }
}

impl InputSource for ScriptedInput {
    fn is_button_down(&self, button: Button) -> bool {
        self.script
            .0
            .lock()
            .map(|s| s.pressed.contains(&button))
            .unwrap_or(false)
    }

    fn is_button_held(&self, button: Button) -> bool {
        self.script
            .0
            .lock()
            .map(|s| s.held.contains(&button) || s.pressed.contains(&button))
            .unwrap_or(false)
    }

    fn end_tick(&mut self) {
        if let Ok(mut state) = self.script.0.lock() {
            state.pressed.clear();
        }
    }
}
