//! Setup-time errors.
//!
//! Runtime combat never fails: damage clamps, empty queries are no-ops.
//! Only configuration loading and actor construction can be rejected.

use std::path::PathBuf;

use bevy::prelude::Entity;
use thiserror::Error;

/// Config could not be read, parsed or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Actor construction rejected (missing collaborator or bad wiring).
///
/// Nothing is spawned when one of these is returned.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{actor} has no target assigned")]
    MissingTarget { actor: &'static str },

    #[error("{actor} has no navigation capability")]
    MissingNavigation { actor: &'static str },

    #[error("{actor} has no animation sink")]
    MissingAnimator { actor: &'static str },

    #[error("{actor} has no weapon hitbox")]
    MissingWeapon { actor: &'static str },

    #[error("player has no input source")]
    MissingInput,

    #[error("target {0:?} is not a combat actor")]
    UnknownTarget(Entity),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
