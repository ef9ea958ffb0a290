//! Game constants for Starhold
//!
//! Base parameters for the combat core and sector coordination. The timing
//! knobs can be overridden per deployment through the shard parameters.

// ========== Combat Timing ==========

/// Seconds a round waits for action submissions before the sweeper resolves it
pub const ROUND_TIMEOUT_SECS: u64 = 30;

/// Shield points regenerated between rounds for each live, non-pod combatant
pub const SHIELD_REGEN_PER_ROUND: u32 = 10;

/// Seconds a salvage wreck stays claimable before it is pruned
pub const SALVAGE_TTL_SECS: u64 = 900;

// ========== Shield Mitigation ==========

/// Mitigation contributed by one shield point
pub const SHIELD_MITIGATION_PER_POINT: f64 = 0.0005;

/// Upper bound on shield mitigation
pub const MITIGATION_CAP: f64 = 0.5;

/// Mitigation multiplier while bracing
pub const BRACE_MITIGATION_BONUS: f64 = 1.2;

// ========== Attack Resolution ==========

/// Base probability that one committed fighter lands its hit
pub const HIT_BASE_CHANCE: f64 = 0.5;

/// Hit chance lost per point of target mitigation
pub const HIT_TARGET_MITIGATION_FACTOR: f64 = 0.6;

/// Hit chance gained per point of attacker mitigation
pub const HIT_ATTACKER_MITIGATION_FACTOR: f64 = 0.1;

/// Floor on the per-fighter hit probability
pub const HIT_MIN_CHANCE: f64 = 0.15;

/// Ceiling on the per-fighter hit probability
pub const HIT_MAX_CHANCE: f64 = 0.85;

/// Shield points ablated per defensive fighter loss (before rounding)
pub const SHIELD_ABLATION_PER_LOSS: f64 = 0.5;

/// Ablation multiplier applied while bracing
pub const BRACE_SHIELD_ABLATION_FACTOR: f64 = 0.8;

// ========== Flee Resolution ==========

/// Base probability of a successful flee
pub const FLEE_BASE_CHANCE: f64 = 0.5;

/// Flee chance shift per point of turns-per-warp difference
pub const FLEE_WARP_FACTOR: f64 = 0.1;

/// Floor on the flee probability
pub const FLEE_MIN_CHANCE: f64 = 0.2;

/// Ceiling on the flee probability
pub const FLEE_MAX_CHANCE: f64 = 0.9;

// ========== Salvage ==========

/// Divisor applied to a template's purchase price for its scrap yield
pub const SCRAP_PRICE_DIVISOR: u64 = 1000;

/// Minimum scrap units yielded by any destroyed ship
pub const SCRAP_MINIMUM: u32 = 5;

// ========== Universe ==========

/// Sectors 1..=FEDERATION_SECTOR_MAX are federation space (no garrisons)
pub const FEDERATION_SECTOR_MAX: u32 = 10;

/// Default number of sectors in a shard
pub const DEFAULT_SECTOR_COUNT: u32 = 1000;

/// Seeded warp chords added to the ring topology per sector
pub const WARP_CHORDS_PER_SECTOR: u32 = 2;

/// Sector where newly registered characters start
pub const STARTER_SECTOR: u32 = 1;

/// Default universe seed for procedural topology
pub const DEFAULT_UNIVERSE_SEED: u64 = 0x5354_4152_484f_4c44; // "STARHOLD"

// ========== Rate Limiting ==========

/// Length of one rate-limit window
pub const RATE_LIMIT_WINDOW_SECS: u64 = 10;

/// Calls allowed per character and method within one window
pub const RATE_LIMIT_MAX_CALLS: u32 = 20;

// ========== Economy ==========

/// Credits granted to a newly registered character's starter ship
pub const STARTING_CREDITS: u64 = 2000;

// ========== Time ==========

/// Microseconds per second, for deadline arithmetic on `*_micros` fields
pub const MICROS_PER_SEC: u64 = 1_000_000;
