//! Player combat state machine.
//!
//! Idle ⇄ Attacking / Parrying → Blocking / Dodging, Stunned поверх всего.
//! Переходы только по кнопкам и по истечению таймеров, один активный state.

use bevy::prelude::*;

use crate::bridge::{anim, AnimationSink, Animator, Button, InputDevice, InputSource, Navigator};
use crate::combat::posture::tick_stun;
use crate::combat::resource_model::{CombatResourceModel, DefenseStance};
use crate::combat::scheduler::{TaskQueue, TaskToken};
use crate::components::{Dead, Health, Posture};
use crate::config::CombatConfig;
use crate::schedules::SimClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum PlayerState {
    #[default]
    Idle,
    Attacking,
    Parrying,
    Blocking,
    Dodging,
    Stunned,
}

/// Timings of the player's moves (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    pub attack_cooldown: f32,
    pub parry_cooldown: f32,
    pub dodge_cooldown: f32,
    pub dodge_duration: f32,
    pub stun_duration: f32,
    pub stun_recovery_fraction: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self::from_config(&CombatConfig::default())
    }
}

impl PlayerTuning {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            attack_cooldown: config.player.attack_cooldown,
            parry_cooldown: config.player.parry_cooldown,
            dodge_cooldown: config.player.dodge_cooldown,
            dodge_duration: config.player.dodge_duration,
            stun_duration: config.resources.stun_duration,
            stun_recovery_fraction: config.resources.stun_recovery_fraction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTask {
    EndDodge,
}

/// Player combat state + its timers.
#[derive(Component, Debug, Clone)]
pub struct PlayerCombat {
    pub state: PlayerState,
    pub attack_cooldown: f32,
    pub parry_cooldown: f32,
    pub dodge_cooldown: f32,
    pub stun_remaining: f32,
    pub tuning: PlayerTuning,
    tasks: TaskQueue<PlayerTask>,
    dodge_end: Option<TaskToken>,
    /// Stun was entered from outside (hit); flags are lowered on the next update
    stun_flags_pending: bool,
}

impl Default for PlayerCombat {
    fn default() -> Self {
        Self::new(PlayerTuning::default())
    }
}

impl PlayerCombat {
    pub fn new(tuning: PlayerTuning) -> Self {
        Self {
            state: PlayerState::Idle,
            attack_cooldown: 0.0,
            parry_cooldown: 0.0,
            dodge_cooldown: 0.0,
            stun_remaining: 0.0,
            tuning,
            tasks: TaskQueue::new(),
            dodge_end: None,
            stun_flags_pending: false,
        }
    }

    pub fn is_attacking(&self) -> bool {
        self.state == PlayerState::Attacking
    }

    /// Weapon connected: the swing ends, attack cooldown keeps running.
    pub fn finish_swing(&mut self) {
        if self.state == PlayerState::Attacking {
            self.state = PlayerState::Idle;
        }
    }

    /// Advance one tick. Returns `(from, to)` when the state changed.
    ///
    /// Порядок: stun → таймеры → input → переходы по таймерам.
    pub fn update(
        &mut self,
        delta_time: f32,
        input: &dyn InputSource,
        posture: &mut Posture,
        animator: &mut dyn AnimationSink,
    ) -> Option<(PlayerState, PlayerState)> {
        let from = self.state;

        if self.state == PlayerState::Stunned {
            self.update_stunned(delta_time, posture, animator);
            return self.changed(from);
        }

        if posture.is_broken() {
            self.enter_stun(self.tuning.stun_duration);
            self.update_stunned(0.0, posture, animator);
            return self.changed(from);
        }

        for (_, task) in self.tasks.advance(delta_time) {
            match task {
                PlayerTask::EndDodge => {
                    self.dodge_end = None;
                    if self.state == PlayerState::Dodging {
                        self.state = PlayerState::Idle;
                        animator.set_bool(anim::DODGE, false);
                    }
                }
            }
        }
        self.attack_cooldown = (self.attack_cooldown - delta_time).max(0.0);
        self.parry_cooldown = (self.parry_cooldown - delta_time).max(0.0);
        self.dodge_cooldown = (self.dodge_cooldown - delta_time).max(0.0);

        self.handle_input(input, posture, animator);

        match self.state {
            PlayerState::Attacking if self.attack_cooldown <= 0.0 => {
                self.state = PlayerState::Idle;
                animator.set_bool(anim::ATTACK, false);
            }
            PlayerState::Parrying if self.parry_cooldown <= 0.0 => {
                if input.is_button_held(Button::Parry) {
                    self.state = PlayerState::Blocking;
                } else {
                    self.state = PlayerState::Idle;
                    animator.set_bool(anim::PARRY, false);
                }
            }
            PlayerState::Blocking if !input.is_button_held(Button::Parry) => {
                self.state = PlayerState::Idle;
                animator.set_bool(anim::PARRY, false);
            }
            _ => {}
        }

        self.changed(from)
    }

    fn handle_input(
        &mut self,
        input: &dyn InputSource,
        posture: &mut Posture,
        animator: &mut dyn AnimationSink,
    ) {
        let next = if self.attack_cooldown <= 0.0 && input.is_button_down(Button::Attack) {
            PlayerState::Attacking
        } else if input.is_button_down(Button::Parry) {
            PlayerState::Parrying
        } else if self.dodge_cooldown <= 0.0 && input.is_button_down(Button::Dodge) {
            PlayerState::Dodging
        } else {
            return;
        };

        self.interrupt(next, animator);

        match next {
            PlayerState::Attacking => {
                self.attack_cooldown = self.tuning.attack_cooldown;
                animator.set_bool(anim::ATTACK, true);
            }
            PlayerState::Parrying => {
                self.parry_cooldown = self.tuning.parry_cooldown;
                animator.set_bool(anim::PARRY, true);
            }
            PlayerState::Dodging => {
                self.dodge_cooldown = self.tuning.dodge_cooldown;
                self.dodge_end = Some(
                    self.tasks
                        .schedule_once(self.tuning.dodge_duration, PlayerTask::EndDodge),
                );
                posture.suppress_regen();
                animator.set_bool(anim::DODGE, true);
            }
            _ => {}
        }
        self.state = next;
    }

    /// Новое действие прерывает текущее: гасим его флаги и таймеры.
    fn interrupt(&mut self, next: PlayerState, animator: &mut dyn AnimationSink) {
        match self.state {
            PlayerState::Attacking if next != PlayerState::Attacking => {
                animator.set_bool(anim::ATTACK, false);
            }
            PlayerState::Parrying | PlayerState::Blocking if next != PlayerState::Parrying => {
                animator.set_bool(anim::PARRY, false);
            }
            PlayerState::Dodging => {
                if let Some(token) = self.dodge_end.take() {
                    self.tasks.cancel(token);
                }
                if next != PlayerState::Dodging {
                    animator.set_bool(anim::DODGE, false);
                }
            }
            _ => {}
        }
    }

    fn update_stunned(
        &mut self,
        delta_time: f32,
        posture: &mut Posture,
        animator: &mut dyn AnimationSink,
    ) {
        if self.stun_flags_pending {
            self.stun_flags_pending = false;
            animator.set_bool(anim::ATTACK, false);
            animator.set_bool(anim::PARRY, false);
        }

        if tick_stun(&mut self.stun_remaining, delta_time) {
            self.state = PlayerState::Idle;
            posture.restore_fraction(self.tuning.stun_recovery_fraction);
            animator.set_bool(anim::DODGE, false);
        }
    }

    fn changed(&self, from: PlayerState) -> Option<(PlayerState, PlayerState)> {
        (from != self.state).then_some((from, self.state))
    }
}

impl CombatResourceModel for PlayerCombat {
    fn stance(&self) -> DefenseStance {
        match self.state {
            PlayerState::Idle | PlayerState::Attacking => DefenseStance::Open,
            PlayerState::Parrying => DefenseStance::Parrying,
            PlayerState::Blocking => DefenseStance::Blocking,
            PlayerState::Dodging => DefenseStance::Dodging,
            PlayerState::Stunned => DefenseStance::Stunned,
        }
    }

    fn is_stunned(&self) -> bool {
        self.state == PlayerState::Stunned
    }

    fn enter_stun(&mut self, duration: f32) -> bool {
        if self.is_stunned() {
            return false;
        }
        self.state = PlayerState::Stunned;
        self.stun_remaining = duration;
        self.stun_flags_pending = true;
        if let Some(token) = self.dodge_end.take() {
            self.tasks.cancel(token);
        }
        true
    }
}

/// System: player state machine tick.
///
/// Input sampled once per tick, then `end_tick` on the device.
pub fn player_fsm(
    clock: Res<SimClock>,
    mut players: Query<
        (
            Entity,
            &Health,
            &mut PlayerCombat,
            &mut Posture,
            &mut InputDevice,
            &mut Animator,
            Option<&mut Navigator>,
        ),
        Without<Dead>,
    >,
) {
    for (entity, health, mut combat, mut posture, mut input, mut animator, navigator) in
        players.iter_mut()
    {
        if health.is_alive() {
            let transition =
                combat.update(clock.delta, input.0.as_ref(), &mut posture, animator.0.as_mut());

            if let Some((from, to)) = transition {
                crate::logger::log(&format!("🎮 Player {:?}: {:?} → {:?}", entity, from, to));
                if to == PlayerState::Stunned {
                    if let Some(mut navigator) = navigator {
                        navigator.0.stop();
                    }
                }
            }
        }

        input.0.end_tick();
    }
}
