//! # Starhold Common
//!
//! Shared types, constants, and utilities for the Starhold
//! space-trading/combat shard. This crate defines the data model used across
//! the pure combat resolver and the sector application:
//! - combatants, round actions, encounters, and outcomes
//! - the ship template catalog and commodity manifests
//! - the event model and error taxonomy
//! - deterministic per-round randomness

pub mod cargo;
pub mod constants;
pub mod errors;
pub mod events;
pub mod rng;
pub mod templates;
pub mod types;

pub use cargo::*;
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use rng::*;
pub use templates::*;
pub use types::*;
