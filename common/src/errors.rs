//! Error types for Starhold
//!
//! The taxonomy is closed: every failure the combat core can surface is one
//! of these kinds, each with an HTTP-equivalent status. Validation and
//! authorization errors short-circuit before any state mutation; once a
//! resolution has mutated rows, subsidiary failures are logged and swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CharacterId, ShipId};

/// Errors surfaced by shard operations
#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
pub enum GameError {
    /// Malformed or invalid request from the caller
    #[error("invalid request: {0}")]
    Caller(String),

    /// The actor does not control the target ship
    #[error("character {actor} may not act on ship {ship}")]
    ActorAuthorization { actor: CharacterId, ship: ShipId },

    /// Too many calls to one method inside the current window
    #[error("rate limit exceeded for {method}")]
    RateLimit { method: String },

    /// The request does not fit the current state (wrong round, no combat)
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A persisted reference no longer resolves (missing template, orphan row)
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// Storage-layer failure; the chain runtime retries at block level
    #[error("transient storage failure: {0}")]
    TransientStorage(String),

    /// A subordinate event could not be recorded
    #[error("event emission failed: {0}")]
    Emission(String),
}

impl GameError {
    /// HTTP-equivalent status carried in error event payloads
    pub fn status(&self) -> u16 {
        match self {
            GameError::Caller(_) => 400,
            GameError::ActorAuthorization { .. } => 403,
            GameError::RateLimit { .. } => 429,
            GameError::StateConflict(_) => 409,
            GameError::DataIntegrity(_) => 500,
            GameError::TransientStorage(_) => 409,
            GameError::Emission(_) => 500,
        }
    }

    /// Whether this kind is reported back to the caller as a direct
    /// `error` event. State conflicts and storage blips are not; emission
    /// failures are swallowed at the site that observed them.
    pub fn emits_error_event(&self) -> bool {
        matches!(
            self,
            GameError::Caller(_)
                | GameError::ActorAuthorization { .. }
                | GameError::RateLimit { .. }
                | GameError::DataIntegrity(_)
        )
    }
}
