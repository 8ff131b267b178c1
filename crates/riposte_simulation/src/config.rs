//! Tunable combat parameters.
//!
//! Every section has `Default` matching the shipped balance, so a TOML file only
//! needs to list what it overrides:
//!
//! ```toml
//! [player]
//! max_health = 1000
//!
//! [perception]
//! view_half_angle = 60.0
//! ```

use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::bridge::{LAYER_ENVIRONMENT, LAYER_PLAYER};
use crate::error::ConfigError;

/// Полная конфигурация боя (все секции).
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub simulation: SimulationConfig,
    pub resources: ResourceConfig,
    pub resolution: ResolutionConfig,
    pub player: PlayerConfig,
    pub enemy: EnemyConfig,
    pub perception: PerceptionConfig,
    pub footsteps: FootstepConfig,
}

/// Tick clock and RNG seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed tick rate used by the headless runner (Hz)
    pub tick_hz: f32,
    pub seed: u64,
    /// Perception refresh cadence (seconds)
    pub perception_interval: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: 64.0,
            seed: 42,
            perception_interval: 0.2,
        }
    }
}

/// Posture / stun rules shared by every actor kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub stun_duration: f32,
    /// Posture after stun expiry, as a fraction of max
    pub stun_recovery_fraction: f32,
    /// Posture units per second
    pub posture_regen_rate: f32,
    /// Seconds without regeneration after taking a hit or dodging
    pub posture_regen_delay: f32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            stun_duration: 3.0,
            stun_recovery_fraction: 2.0 / 3.0,
            posture_regen_rate: 2.0,
            posture_regen_delay: 2.0,
        }
    }
}

/// Multipliers for the defender-state damage table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Blocking: health loss = damage / divisor (integer floor)
    pub block_health_divisor: u32,
    /// Blocking: posture loss = damage × factor
    pub block_posture_factor: f32,
    /// Idle/attacking: posture loss = damage × factor
    pub open_posture_factor: f32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            block_health_divisor: 2,
            block_posture_factor: 1.0,
            open_posture_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_health: u32,
    pub max_posture: f32,
    pub damage: u32,
    pub attack_cooldown: f32,
    pub parry_cooldown: f32,
    pub dodge_cooldown: f32,
    pub dodge_duration: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            max_posture: 100.0,
            damage: 25,
            attack_cooldown: 1.0,
            parry_cooldown: 1.0,
            dodge_cooldown: 1.0,
            dodge_duration: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    pub max_health: u32,
    pub max_posture: f32,
    pub damage: u32,
    /// Time from swing start until the attack may be started again
    pub attack_reset: f32,
    /// Windup before the blade becomes dangerous
    pub hit_check_delay: f32,
    pub hit_check_interval: f32,
    pub cruise_speed: f32,
    pub stopping_distance: f32,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            max_posture: 100.0,
            damage: 10,
            attack_reset: 2.0,
            hit_check_delay: 1.5,
            hit_check_interval: 0.1,
            cruise_speed: 2.0,
            stopping_distance: 1.5,
        }
    }
}

/// Field-of-view parameters for AI actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub view_radius: f32,
    /// Degrees either side of facing
    pub view_half_angle: f32,
    pub occlusion_probe_distance: f32,
    pub target_mask: u32,
    pub obstruction_mask: u32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            view_radius: 10.0,
            view_half_angle: 45.0,
            occlusion_probe_distance: 1.0,
            target_mask: LAYER_PLAYER,
            obstruction_mask: LAYER_ENVIRONMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootstepConfig {
    pub clips: Vec<String>,
    /// Footstep events from clips blended below this weight are ignored
    pub min_weight: f32,
}

impl Default for FootstepConfig {
    fn default() -> Self {
        Self {
            clips: Vec::new(),
            min_weight: 0.5,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CombatConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Fixed timestep matching `simulation.tick_hz`.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.simulation.tick_hz
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("simulation.tick_hz", self.simulation.tick_hz)?;
        positive("simulation.perception_interval", self.simulation.perception_interval)?;

        positive("resources.stun_duration", self.resources.stun_duration)?;
        let fraction = self.resources.stun_recovery_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(
                "resources.stun_recovery_fraction",
                format!("must be in (0, 1], got {}", fraction),
            ));
        }
        non_negative("resources.posture_regen_rate", self.resources.posture_regen_rate)?;
        non_negative("resources.posture_regen_delay", self.resources.posture_regen_delay)?;

        if self.resolution.block_health_divisor == 0 {
            return Err(invalid("resolution.block_health_divisor", "must be at least 1".into()));
        }
        non_negative("resolution.block_posture_factor", self.resolution.block_posture_factor)?;
        non_negative("resolution.open_posture_factor", self.resolution.open_posture_factor)?;

        if self.player.max_health == 0 {
            return Err(invalid("player.max_health", "must be at least 1".into()));
        }
        positive("player.max_posture", self.player.max_posture)?;
        non_negative("player.attack_cooldown", self.player.attack_cooldown)?;
        non_negative("player.parry_cooldown", self.player.parry_cooldown)?;
        non_negative("player.dodge_cooldown", self.player.dodge_cooldown)?;
        positive("player.dodge_duration", self.player.dodge_duration)?;

        if self.enemy.max_health == 0 {
            return Err(invalid("enemy.max_health", "must be at least 1".into()));
        }
        positive("enemy.max_posture", self.enemy.max_posture)?;
        positive("enemy.attack_reset", self.enemy.attack_reset)?;
        non_negative("enemy.hit_check_delay", self.enemy.hit_check_delay)?;
        positive("enemy.hit_check_interval", self.enemy.hit_check_interval)?;
        non_negative("enemy.cruise_speed", self.enemy.cruise_speed)?;
        non_negative("enemy.stopping_distance", self.enemy.stopping_distance)?;

        non_negative("perception.view_radius", self.perception.view_radius)?;
        non_negative("perception.view_half_angle", self.perception.view_half_angle)?;
        non_negative(
            "perception.occlusion_probe_distance",
            self.perception.occlusion_probe_distance,
        )?;

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    // NaN тоже отсекается (сравнение false)
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be > 0, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be >= 0, got {}", value)))
    }
}
