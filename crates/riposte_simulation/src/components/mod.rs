//! ECS Components для бойцов
//!
//! - actor: базовые характеристики (kind, health, posture, opponent, attacker)
//!
//! Компоненты state machines живут рядом с их системами:
//! `player::PlayerCombat`, `ai::EnemyBrain`, `ai::Perception`, `combat::WeaponHitbox`.

pub mod actor;

pub use actor::*;
