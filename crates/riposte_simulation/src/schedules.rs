//! Custom schedules и simulation clock
//!
//! # Архитектура
//!
//! **CombatTick** (caller-driven, `CombatSimulation::tick(dt)`)
//!   └─ run_perception_timer → накопили ≥ interval → **PerceptionTick**
//!
//! Порядок фаз внутри tick задаёт `CombatSet`.
//!
//! Хост сам решает, с какой частотой вызывать tick (обычно физический fixed step).
//! Perception работает на своём медленном cadence (0.2s), устаревание
//! результата максимум на один период.

use bevy::ecs::schedule::ScheduleLabel;
use bevy::prelude::*;

/// Main fixed-step schedule: state machines, timers, hit resolution.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombatTick;

/// Low-frequency schedule: AI field-of-view refresh.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptionTick;

/// Фазы CombatTick, выполняются строго по порядку (chain).
///
/// Input и переходы состояний разрешаются до hit resolution, а результат удара
/// виден state machine защищающегося только в следующем tick.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombatSet {
    /// Actor positions → spatial backend
    SyncBodies,
    /// Perception cadence (runs PerceptionTick when due)
    Perception,
    /// Enemy death / stun / state selection
    Decision,
    /// Enemy delayed tasks (hit check, attack reset)
    EnemyTasks,
    /// Enemy per-state movement and animation
    EnemyActions,
    /// Player state machine
    Player,
    /// Player weapon sweep
    HitDetection,
    /// MeleeHit → defender
    Resolution,
    Regeneration,
    /// In-process navigation moves actors
    Movement,
}

/// Simulation clock, advanced by the caller once per tick.
#[derive(Resource, Debug, Default, Clone)]
pub struct SimClock {
    /// Seconds covered by the current tick
    pub delta: f32,
    /// Total simulated seconds
    pub elapsed: f64,
    pub tick: u64,
}

impl SimClock {
    pub fn advance(&mut self, dt: f32) {
        self.delta = dt;
        self.elapsed += dt as f64;
        self.tick = self.tick.wrapping_add(1);
    }
}

/// Accumulator for the perception cadence.
#[derive(Resource, Debug, Clone)]
pub struct PerceptionClock {
    pub interval: f32,
    pub accumulated: f32,
    /// How many times PerceptionTick has run
    pub refreshes: u64,
}

impl PerceptionClock {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulated: 0.0,
            refreshes: 0,
        }
    }

    /// Adds `dt`; returns true when a refresh is due.
    ///
    /// At most one refresh per tick: a long tick does not trigger a burst.
    pub fn accumulate(&mut self, dt: f32) -> bool {
        self.accumulated += dt;
        if self.accumulated >= self.interval {
            self.accumulated = (self.accumulated - self.interval).min(self.interval);
            self.refreshes += 1;
            true
        } else {
            false
        }
    }
}

/// System: run PerceptionTick when the cadence is due.
///
/// Exclusive system (требует &mut World для run_schedule).
pub fn run_perception_timer(world: &mut World) {
    let delta = world.resource::<SimClock>().delta;
    let due = world.resource_mut::<PerceptionClock>().accumulate(delta);

    if due {
        world.run_schedule(PerceptionTick);
    }
}
