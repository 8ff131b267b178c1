//! Базовые компоненты акторов: Actor, Health, Posture, Opponent

use bevy::prelude::*;

/// Kind of combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum ActorKind {
    #[default]
    Player,
    Enemy,
}

/// Актор (игрок или враг): базовый компонент для бойцов
///
/// Автоматически добавляет Health и Posture через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health, Posture)]
pub struct Actor {
    pub kind: ActorKind,
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Returns the health actually lost (never more than what was left).
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let before = self.current;
        self.current = self.current.saturating_sub(amount);
        before - self.current
    }
}

/// Posture: вторичный ресурс (guard/stability)
///
/// Инвариант: 0.0 ≤ current ≤ max.
/// Падение до 0 → stun. Регенерация только вне `regen_cooldown`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Posture {
    pub current: f32,
    pub max: f32,
    /// Units per second
    pub regen_rate: f32,
    /// Regen pause applied after a hit or a dodge (seconds)
    pub regen_delay: f32,
    /// Remaining regen pause
    pub regen_cooldown: f32,
    /// Pause/recovery set this tick: the next regen step is skipped
    pub regen_hold: bool,
}

impl Default for Posture {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Posture {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            regen_rate: 2.0,
            regen_delay: 2.0,
            regen_cooldown: 0.0,
            regen_hold: false,
        }
    }

    pub fn with_regen(mut self, rate: f32, delay: f32) -> Self {
        self.regen_rate = rate;
        self.regen_delay = delay;
        self
    }

    pub fn is_broken(&self) -> bool {
        self.current <= 0.0
    }

    /// Returns the posture actually lost. Negative/NaN amounts are ignored.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        if !(amount > 0.0) {
            return 0.0;
        }
        let before = self.current;
        self.current = (self.current - amount).clamp(0.0, self.max);
        before - self.current
    }

    /// Restart the post-damage regen pause.
    ///
    /// Пауза начинает отсчёт со следующего tick'а: полные `regen_delay` секунд.
    pub fn suppress_regen(&mut self) {
        self.regen_cooldown = self.regen_delay;
        self.regen_hold = true;
    }

    /// Set to a fraction of max (stun recovery).
    ///
    /// В tick восстановления posture ровно `max * fraction`, регенерация со следующего.
    pub fn restore_fraction(&mut self, fraction: f32) {
        self.current = (self.max * fraction).clamp(0.0, self.max);
        self.regen_cooldown = 0.0;
        self.regen_hold = true;
    }

    /// Advance regen by `delta_time`.
    ///
    /// While the pause runs nothing regenerates. Afterwards posture grows linearly,
    /// but only while `0 < current < max` (a broken posture waits for stun recovery).
    pub fn regenerate(&mut self, delta_time: f32) {
        if self.regen_hold {
            self.regen_hold = false;
            return;
        }
        if self.regen_cooldown > 0.0 {
            self.regen_cooldown = (self.regen_cooldown - delta_time).max(0.0);
            return;
        }
        if self.current > 0.0 && self.current < self.max {
            self.current = (self.current + self.regen_rate * delta_time).min(self.max);
        }
    }
}

/// Противник актора (single-opponent model)
///
/// Назначается один раз при спавне, не переназначается.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opponent(pub Entity);

/// Параметры удара актора
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Attacker {
    pub base_damage: u32,
}

impl Default for Attacker {
    fn default() -> Self {
        Self { base_damage: 10 }
    }
}

/// Компонент-маркер: entity мертв (Health == 0)
///
/// Трупы остаются на месте, деспавн делает хост.
#[derive(Component, Debug)]
pub struct Dead;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage() {
        let mut health = Health::new(100);
        assert_eq!(health.current, 100);

        assert_eq!(health.take_damage(30), 30);
        assert_eq!(health.current, 70);
        assert!(health.is_alive());

        assert_eq!(health.take_damage(100), 70); // Saturating sub
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_posture_damage_clamps_at_zero() {
        let mut posture = Posture::new(100.0);

        assert_eq!(posture.take_damage(60.0), 60.0);
        assert_eq!(posture.current, 40.0);

        assert_eq!(posture.take_damage(60.0), 40.0);
        assert_eq!(posture.current, 0.0);
        assert!(posture.is_broken());
    }

    #[test]
    fn test_posture_ignores_negative_and_nan() {
        let mut posture = Posture::new(100.0);
        posture.take_damage(20.0);

        assert_eq!(posture.take_damage(-50.0), 0.0);
        assert_eq!(posture.take_damage(f32::NAN), 0.0);
        assert_eq!(posture.current, 80.0);
    }

    #[test]
    fn test_posture_regen_waits_for_delay() {
        let mut posture = Posture::new(100.0).with_regen(2.0, 1.0);
        posture.take_damage(50.0);
        posture.suppress_regen();

        // Tick самого удара не считается
        posture.regenerate(0.5);
        assert_eq!(posture.regen_cooldown, 1.0);
        posture.regenerate(0.5);
        assert_eq!(posture.current, 50.0);
        posture.regenerate(0.5);
        assert_eq!(posture.current, 50.0);
        assert_eq!(posture.regen_cooldown, 0.0);

        posture.regenerate(1.0);
        assert_eq!(posture.current, 52.0);

        posture.regenerate(100.0); // Clamp to max
        assert_eq!(posture.current, 100.0);
    }

    #[test]
    fn test_broken_posture_does_not_regen() {
        let mut posture = Posture::new(100.0);
        posture.take_damage(200.0);
        posture.regenerate(10.0);
        assert_eq!(posture.current, 0.0);

        posture.restore_fraction(2.0 / 3.0);
        assert_eq!(posture.current, 100.0 * (2.0 / 3.0));
    }

    #[test]
    fn test_recovery_tick_keeps_exact_fraction() {
        let mut posture = Posture::new(90.0);
        posture.take_damage(90.0);
        posture.restore_fraction(2.0 / 3.0);

        posture.regenerate(0.25);
        assert!((posture.current - 60.0).abs() < 1e-4);

        posture.regenerate(0.25);
        assert!((posture.current - 60.5).abs() < 1e-4);
    }
}
