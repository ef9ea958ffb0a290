//! # Starhold - Sector Application
//!
//! The on-chain shard carrying Starhold's sector state: ships, characters,
//! corporations, garrisons, salvage, encounters, and the event log. The
//! contract executes the game operations; the service answers GraphQL reads.

pub mod emitter;
pub mod finalize;
pub mod guard;
pub mod lifecycle;
pub mod loader;
pub mod map;
pub mod operations;
pub mod payloads;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod visibility;

use async_graphql::{InputObject, Request, Response, SimpleObject};
use linera_sdk::graphql::GraphQLMutationRoot;
use serde::{Deserialize, Serialize};

use starhold_common::constants::*;
use starhold_common::errors::GameError;
use starhold_common::types::{ActionKind, GarrisonMode, SectorId};

// Re-export state types
pub use state::{
    CharacterData, CorpMemberData, CorporationData, GarrisonData, RateWindowData, ShardConfig,
    ShardState, ShipData,
};

// ==================== INPUT TYPES ====================

/// A combat action submission
#[derive(Debug, Clone, Serialize, Deserialize, InputObject)]
pub struct ActionInput {
    pub kind: ActionKind,
    /// Fighters committed; only meaningful (and required non-zero) for attack
    pub commit: u32,
    /// Attack target combatant id, or the garrison owner when paying
    pub target: Option<String>,
    /// Preferred destination sector when fleeing
    pub destination: Option<SectorId>,
}

// ==================== OPERATIONS ====================

/// Operations on the shard chain
#[derive(Debug, Serialize, Deserialize, GraphQLMutationRoot)]
pub enum Operation {
    /// Create a character with a starter ship
    Register {
        character_id: String,
        name: String,
    },

    /// Session join; returns the caller's status snapshot as an event
    Join {
        character_id: String,
    },

    /// Warp the character's ship to an adjacent sector
    Move {
        character_id: String,
        to_sector: SectorId,
    },

    /// Submit (or replace) the character's action for the current round;
    /// an attack with no active encounter starts one
    SubmitAction {
        character_id: String,
        action: ActionInput,
    },

    /// Deadline sweeper entry: resolve a round whose timer elapsed
    SweepDeadline {
        sector: SectorId,
        round: u32,
    },

    /// Station fighters from the ship as a garrison
    DeployGarrison {
        character_id: String,
        fighters: u32,
        mode: GarrisonMode,
        toll_amount: Option<u64>,
    },

    /// Pull the character's garrison back aboard
    WithdrawGarrison {
        character_id: String,
    },

    /// Pay the named owner's toll garrison in the current encounter
    PayToll {
        character_id: String,
        garrison_owner: String,
    },

    /// Claim an unexpired wreck in the current sector
    ClaimSalvage {
        character_id: String,
        salvage_id: String,
    },

    /// Found a corporation
    FormCorporation {
        character_id: String,
        name: String,
    },

    /// Join an existing corporation
    JoinCorporation {
        character_id: String,
        corporation: u64,
    },

    /// Leave the current corporation (membership keeps a tombstone)
    LeaveCorporation {
        character_id: String,
    },

    /// Commission a corporation ship with an autonomous pilot
    CommissionShip {
        character_id: String,
        ship_type: String,
        name: String,
    },
}

impl Operation {
    /// Wire method name, used for rate limiting and source stamps
    pub fn method(&self) -> &'static str {
        match self {
            Operation::Register { .. } => "character.register",
            Operation::Join { .. } => "session.join",
            Operation::Move { .. } => "ship.move",
            Operation::SubmitAction { .. } => "combat.action",
            Operation::SweepDeadline { .. } => "combat.sweep",
            Operation::DeployGarrison { .. } => "garrison.deploy",
            Operation::WithdrawGarrison { .. } => "garrison.withdraw",
            Operation::PayToll { .. } => "garrison.pay_toll",
            Operation::ClaimSalvage { .. } => "salvage.claim",
            Operation::FormCorporation { .. } => "corporation.form",
            Operation::JoinCorporation { .. } => "corporation.join",
            Operation::LeaveCorporation { .. } => "corporation.leave",
            Operation::CommissionShip { .. } => "corporation.commission_ship",
        }
    }

    /// The acting character, when the operation has one
    pub fn actor(&self) -> Option<&str> {
        match self {
            Operation::Register { character_id, .. }
            | Operation::Join { character_id }
            | Operation::Move { character_id, .. }
            | Operation::SubmitAction { character_id, .. }
            | Operation::DeployGarrison { character_id, .. }
            | Operation::WithdrawGarrison { character_id }
            | Operation::PayToll { character_id, .. }
            | Operation::ClaimSalvage { character_id, .. }
            | Operation::FormCorporation { character_id, .. }
            | Operation::JoinCorporation { character_id, .. }
            | Operation::LeaveCorporation { character_id }
            | Operation::CommissionShip { character_id, .. } => Some(character_id),
            Operation::SweepDeadline { .. } => None,
        }
    }
}

// ==================== PARAMETERS ====================

/// Shard parameters, the deploy-time home of the timing knobs
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct ShardParameters {
    /// Universe seed for procedural topology
    pub universe_seed: u64,
    /// Number of sectors in the shard
    pub sector_count: u32,
    /// Seconds a round waits for submissions
    pub round_timeout_secs: u64,
    /// Shield points regenerated between rounds
    pub shield_regen_per_round: u32,
    /// Seconds before a salvage wreck expires
    pub salvage_ttl_secs: u64,
}

impl Default for ShardParameters {
    fn default() -> Self {
        Self {
            universe_seed: DEFAULT_UNIVERSE_SEED,
            sector_count: DEFAULT_SECTOR_COUNT,
            round_timeout_secs: ROUND_TIMEOUT_SECS,
            shield_regen_per_round: SHIELD_REGEN_PER_ROUND,
            salvage_ttl_secs: SALVAGE_TTL_SECS,
        }
    }
}

impl ShardParameters {
    pub fn as_config(&self) -> ShardConfig {
        ShardConfig {
            universe_seed: self.universe_seed,
            sector_count: self.sector_count,
            round_timeout_secs: self.round_timeout_secs,
            shield_regen_per_round: self.shield_regen_per_round,
            salvage_ttl_secs: self.salvage_ttl_secs,
        }
    }
}

// ==================== ABI ====================

/// Application ABI
pub struct ShardAbi;

impl linera_sdk::abi::ContractAbi for ShardAbi {
    type Operation = Operation;
    type Response = Result<(), GameError>;
}

impl linera_sdk::abi::ServiceAbi for ShardAbi {
    type Query = Request;
    type QueryResponse = Response;
}
