//! Error types for combat configuration gaps and config loading.
//!
//! None of these are fatal: systems log them and skip the attack attempt.

use thiserror::Error;

use crate::orchestrator::AttackKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CombatError {
    #[error("weapon has no muzzle point")]
    MissingMuzzle,

    #[error("no weapon mount configured for {kind:?} attack")]
    MissingWeapon { kind: AttackKind },

    #[error("melee sweep requested on a non-melee weapon")]
    NotMelee,

    #[error("spawn attack has no spawn points")]
    NoSpawnPoints,

    #[error("spawn attack has no entity templates")]
    NoSpawnTemplates,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
