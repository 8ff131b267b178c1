//! Delayed / repeating actions keyed by token.
//!
//! Every wait in the simulation is a countdown sampled once per tick. A task is
//! scheduled with a delay (and optionally a repeat interval) and identified by the
//! `TaskToken` returned at scheduling time; cancellation takes that token, so two
//! tasks carrying the same action never get confused.

use bevy::prelude::Reflect;

/// Handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct TaskToken(u64);

#[derive(Debug, Clone)]
struct ScheduledTask<T> {
    token: TaskToken,
    action: T,
    remaining: f32,
    repeat: Option<f32>,
}

/// Per-actor queue of pending actions.
#[derive(Debug, Clone)]
pub struct TaskQueue<T> {
    tasks: Vec<ScheduledTask<T>>,
    next_token: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_token: 0,
        }
    }
}

impl<T: Clone> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `action` once after `delay` seconds.
    pub fn schedule_once(&mut self, delay: f32, action: T) -> TaskToken {
        self.push(delay, None, action)
    }

    /// Fire `action` after `delay`, then every `interval` until cancelled.
    pub fn schedule_repeating(&mut self, delay: f32, interval: f32, action: T) -> TaskToken {
        self.push(delay, Some(interval), action)
    }

    /// Remove a pending task. Idempotent: unknown or already-fired tokens return false.
    pub fn cancel(&mut self, token: TaskToken) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.token != token);
        self.tasks.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.tasks.iter().any(|task| task.token == token)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Count every task down by `dt` and return the ones that fired, in scheduling order.
    ///
    /// A repeating task fires at most once per tick; it is re-armed with its interval
    /// on top of whatever overshoot is left.
    pub fn advance(&mut self, dt: f32) -> Vec<(TaskToken, T)> {
        let mut fired = Vec::new();

        self.tasks.retain_mut(|task| {
            task.remaining -= dt;
            if task.remaining > 0.0 {
                return true;
            }
            fired.push((task.token, task.action.clone()));
            match task.repeat {
                Some(interval) => {
                    task.remaining = (task.remaining + interval).max(f32::MIN_POSITIVE);
                    true
                }
                None => false,
            }
        });

        fired
    }

    fn push(&mut self, delay: f32, repeat: Option<f32>, action: T) -> TaskToken {
        let token = TaskToken(self.next_token);
        self.next_token += 1;
        self.tasks.push(ScheduledTask {
            token,
            action,
            remaining: delay,
            repeat,
        });
        token
    }
}
