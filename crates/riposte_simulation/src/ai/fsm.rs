//! Enemy brain: decision loop + state actions.
//!
//! Каждый tick:
//! 1. `ai_decision`: смерть, stun, выбор state (perception + дистанция)
//! 2. `run_enemy_tasks`: отложенные hit-check / attack reset
//! 3. `ai_actions`: движение, поворот, анимации, старт атаки

use bevy::prelude::*;

use crate::ai::perception::Perception;
use crate::bridge::{anim, Animator, Navigator, SpatialQueries};
use crate::combat::damage::MeleeHit;
use crate::combat::hitbox::{sweep_weapon, WeaponHitbox};
use crate::combat::posture::tick_stun;
use crate::combat::resource_model::{CombatResourceModel, DefenseStance};
use crate::combat::scheduler::{TaskQueue, TaskToken};
use crate::components::{Attacker, Dead, Health, Opponent, Posture};
use crate::config::CombatConfig;
use crate::schedules::SimClock;

/// AI FSM состояния
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum EnemyState {
    #[default]
    Idle,
    MoveTowards,
    /// Reserved: backs off to make space (never chosen by the decision loop)
    MoveAway,
    Attack,
    /// Reserved: enemy-side parry (never chosen by the decision loop)
    Parry,
    /// Terminal
    Dead,
}

/// Pure transition rule, evaluated every tick.
///
/// Dead wins over everything and never ends. Otherwise visibility picks
/// Idle/MoveTowards and being within `stopping_distance` overrides it with Attack.
pub fn decide_state(
    alive: bool,
    can_see_target: bool,
    distance: f32,
    stopping_distance: f32,
    current: EnemyState,
) -> EnemyState {
    if current == EnemyState::Dead || !alive {
        return EnemyState::Dead;
    }

    let mut next = if can_see_target {
        EnemyState::MoveTowards
    } else {
        EnemyState::Idle
    };

    if distance <= stopping_distance {
        next = EnemyState::Attack;
    }

    next
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyTuning {
    pub cruise_speed: f32,
    pub stopping_distance: f32,
    pub attack_reset: f32,
    pub hit_check_delay: f32,
    pub hit_check_interval: f32,
    pub stun_recovery_fraction: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self::from_config(&CombatConfig::default())
    }
}

impl EnemyTuning {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            cruise_speed: config.enemy.cruise_speed,
            stopping_distance: config.enemy.stopping_distance,
            attack_reset: config.enemy.attack_reset,
            hit_check_delay: config.enemy.hit_check_delay,
            hit_check_interval: config.enemy.hit_check_interval,
            stun_recovery_fraction: config.resources.stun_recovery_fraction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyTask {
    /// Repeating weapon sweep during the attack window
    CheckHit,
    /// Swing over: attack may start again
    ResetAttack,
}

/// Enemy state machine + its pending tasks.
#[derive(Component, Debug, Clone)]
pub struct EnemyBrain {
    pub state: EnemyState,
    pub already_attacked: bool,
    pub stun_remaining: f32,
    /// Target position seen by the last decision
    pub target_position: Option<Vec3>,
    pub tuning: EnemyTuning,
    tasks: TaskQueue<EnemyTask>,
    hit_check: Option<TaskToken>,
    /// Stun entered from outside; Attack flag is lowered by the next action pass
    stun_flags_pending: bool,
}

impl Default for EnemyBrain {
    fn default() -> Self {
        Self::new(EnemyTuning::default())
    }
}

impl EnemyBrain {
    pub fn new(tuning: EnemyTuning) -> Self {
        Self {
            state: EnemyState::Idle,
            already_attacked: false,
            stun_remaining: 0.0,
            target_position: None,
            tuning,
            tasks: TaskQueue::new(),
            hit_check: None,
            stun_flags_pending: false,
        }
    }

    /// Apply the decision rule. Returns `(from, to)` on change.
    pub fn decide(
        &mut self,
        alive: bool,
        can_see_target: bool,
        distance: f32,
    ) -> Option<(EnemyState, EnemyState)> {
        let from = self.state;
        let next = decide_state(
            alive,
            can_see_target,
            distance,
            self.tuning.stopping_distance,
            from,
        );

        if next == EnemyState::Dead && from != EnemyState::Dead {
            self.die();
        }
        self.state = next;

        (from != next).then_some((from, next))
    }

    /// Start a swing unless one is already running. Returns true if started.
    ///
    /// Hit check begins after the windup and repeats until the attack reset.
    pub fn begin_attack(&mut self) -> bool {
        if self.already_attacked {
            return false;
        }
        self.hit_check = Some(self.tasks.schedule_repeating(
            self.tuning.hit_check_delay,
            self.tuning.hit_check_interval,
            EnemyTask::CheckHit,
        ));
        self.already_attacked = true;
        self.tasks
            .schedule_once(self.tuning.attack_reset, EnemyTask::ResetAttack);
        true
    }

    /// Count pending tasks down. ResetAttack is applied here, fired tasks returned.
    pub fn advance_tasks(&mut self, delta_time: f32) -> Vec<EnemyTask> {
        let fired: Vec<EnemyTask> = self
            .tasks
            .advance(delta_time)
            .into_iter()
            .map(|(_, task)| task)
            .collect();

        if fired.contains(&EnemyTask::ResetAttack) {
            self.already_attacked = false;
            self.cancel_hit_check();
        }

        fired
    }

    /// Weapon connected: no more hit checks this swing.
    pub fn confirm_hit(&mut self) {
        self.cancel_hit_check();
    }

    pub fn hit_check_pending(&self) -> bool {
        self.hit_check
            .is_some_and(|token| self.tasks.is_pending(token))
    }

    #[cfg(test)]
    pub(crate) fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn cancel_hit_check(&mut self) {
        if let Some(token) = self.hit_check.take() {
            self.tasks.cancel(token);
        }
    }

    fn die(&mut self) {
        self.tasks.cancel_all();
        self.hit_check = None;
        self.already_attacked = false;
        self.stun_remaining = 0.0;
    }
}

impl CombatResourceModel for EnemyBrain {
    fn stance(&self) -> DefenseStance {
        if self.is_stunned() {
            return DefenseStance::Stunned;
        }
        match self.state {
            EnemyState::Parry => DefenseStance::Parrying,
            _ => DefenseStance::Open,
        }
    }

    fn is_stunned(&self) -> bool {
        self.stun_remaining > 0.0
    }

    /// Stun drops the running swing entirely.
    fn enter_stun(&mut self, duration: f32) -> bool {
        if self.is_stunned() || self.state == EnemyState::Dead {
            return false;
        }
        self.stun_remaining = duration;
        self.tasks.cancel_all();
        self.hit_check = None;
        self.already_attacked = false;
        self.stun_flags_pending = true;
        true
    }
}

// ============================================================================
// Systems
// ============================================================================

/// System: death, stun countdown, state selection.
pub fn ai_decision(
    clock: Res<SimClock>,
    mut enemies: Query<(
        Entity,
        &Health,
        &Transform,
        &Perception,
        &Opponent,
        &mut EnemyBrain,
        &mut Posture,
    )>,
    targets: Query<&Transform>,
) {
    for (entity, health, transform, perception, opponent, mut brain, mut posture) in
        enemies.iter_mut()
    {
        if brain.state == EnemyState::Dead {
            continue;
        }

        if health.is_alive() && brain.is_stunned() {
            if tick_stun(&mut brain.stun_remaining, clock.delta) {
                posture.restore_fraction(brain.tuning.stun_recovery_fraction);
                let from = brain.state;
                brain.state = EnemyState::Idle;
                crate::logger::log(&format!(
                    "🤖 Enemy {:?}: stun over ({:?} → Idle), posture {:.1}",
                    entity, from, posture.current
                ));
            }
            continue;
        }

        brain.target_position = targets.get(opponent.0).ok().map(|t| t.translation);
        let distance = brain
            .target_position
            .map(|target| transform.translation.distance(target))
            .unwrap_or(f32::INFINITY);

        if let Some((from, to)) = brain.decide(health.is_alive(), perception.can_see_target, distance) {
            if to == EnemyState::Dead {
                crate::logger::log_info(&format!("💀 Enemy {:?}: {:?} → Dead", entity, from));
            } else {
                crate::logger::log(&format!(
                    "🤖 Enemy {:?}: {:?} → {:?} (distance {:.2})",
                    entity, from, to, distance
                ));
            }
        }
    }
}

/// System: fire pending enemy tasks (hit check sweep, attack reset).
pub fn run_enemy_tasks(
    clock: Res<SimClock>,
    spatial: Res<SpatialQueries>,
    mut enemies: Query<(
        Entity,
        &Transform,
        &WeaponHitbox,
        &Attacker,
        &mut EnemyBrain,
        &mut Animator,
    )>,
    corpses: Query<(), With<Dead>>,
    mut hits: EventWriter<MeleeHit>,
) {
    for (entity, transform, hitbox, attacker, mut brain, mut animator) in enemies.iter_mut() {
        if brain.state == EnemyState::Dead || brain.is_stunned() {
            continue;
        }

        for task in brain.advance_tasks(clock.delta) {
            match task {
                EnemyTask::CheckHit => {
                    if !brain.hit_check_pending() {
                        // Отменён reset'ом в этом же tick
                        continue;
                    }
                    let targets =
                        sweep_weapon(spatial.0.as_ref(), hitbox, transform, entity, |target| {
                            !corpses.contains(target)
                        });
                    if targets.is_empty() {
                        continue;
                    }
                    for target in targets {
                        crate::logger::log(&format!("⚔️ Enemy {:?} hit {:?}", entity, target));
                        hits.write(MeleeHit {
                            attacker: entity,
                            target,
                            damage: attacker.base_damage,
                        });
                    }
                    brain.confirm_hit();
                }
                EnemyTask::ResetAttack => {
                    animator.0.set_bool(anim::ATTACK, false);
                }
            }
        }
    }
}

/// System: per-state movement and animation.
pub fn ai_actions(
    mut enemies: Query<(
        Entity,
        &mut Transform,
        &mut EnemyBrain,
        &mut Navigator,
        &mut Animator,
    )>,
) {
    for (entity, mut transform, mut brain, mut navigator, mut animator) in enemies.iter_mut() {
        if brain.stun_flags_pending {
            brain.stun_flags_pending = false;
            animator.0.set_bool(anim::ATTACK, false);
        }

        if brain.is_stunned() {
            stop(&mut navigator, &mut animator);
            continue;
        }

        let cruise_speed = brain.tuning.cruise_speed;
        match brain.state {
            EnemyState::Idle | EnemyState::Dead => stop(&mut navigator, &mut animator),
            EnemyState::MoveTowards => {
                start(&mut navigator, &mut animator, cruise_speed);
                if let Some(target) = brain.target_position {
                    navigator.0.set_destination(target);
                }
            }
            EnemyState::MoveAway => start(&mut navigator, &mut animator, cruise_speed),
            EnemyState::Attack => {
                navigator.0.set_destination(transform.translation);
                navigator.0.set_speed(0.0);
                animator.0.set_float(anim::SPEED, 0.0);

                if let Some(target) = brain.target_position {
                    face_yaw_only(&mut transform, target);
                }

                if brain.begin_attack() {
                    animator.0.set_bool(anim::ATTACK, true);
                    crate::logger::log(&format!("🤖 Enemy {:?}: swing started", entity));
                }
            }
            EnemyState::Parry => {}
        }
    }
}

/// Halt + speed 0.
fn stop(navigator: &mut Navigator, animator: &mut Animator) {
    navigator.0.stop();
    animator.0.set_float(anim::SPEED, 0.0);
}

/// Resume at `speed`.
fn start(navigator: &mut Navigator, animator: &mut Animator, speed: f32) {
    navigator.0.set_speed(speed);
    animator.0.set_float(anim::SPEED, speed);
}

/// Turn toward `target` around Y only (pitch/roll stay zero).
fn face_yaw_only(transform: &mut Transform, target: Vec3) {
    let mut direction = target - transform.translation;
    direction.y = 0.0;
    if direction.length_squared() <= f32::EPSILON {
        return;
    }
    transform.look_to(direction.normalize(), Vec3::Y);
}
